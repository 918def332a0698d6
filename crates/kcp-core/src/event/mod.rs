//! Bus de eventos en proceso y eventos emitidos por el motor.

mod bus;
mod types;

pub use bus::{EventBus, EventContext, HandlerError};
pub use types::{Event, StepOutcome, StepProcessed};
