//! kcp-core: motor de pasos para operaciones de ciclo de vida de clusters.
//!
//! Una operación (provision, upgrade, deprovision) se persiste en un
//! `OperationStore` y avanza un paso durable a la vez mediante el
//! `StepManager`. El motor no guarda estado entre invocaciones: todo lo que
//! cruza reintentos vive en la `Operation` persistida.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod model;
pub mod step;
pub mod store;

pub use engine::{OperationManager, StepManager};
pub use errors::{EngineError, StepError, StoreError};
pub use event::{Event, EventBus, EventContext, HandlerError, StepOutcome, StepProcessed};
pub use model::{Instance, InstanceDetails, KymaParameters, NotificationState, Operation, OperationState, OperationType,
                Orchestration, OrchestrationParameters, Runtime, RuntimeOperation, RuntimeVersion, VersionOrigin};
pub use step::{Predicate, Step, StepLogger, StepRunResult};
pub use store::{InMemoryOperationStore, OperationFilter, OperationPage, OperationStore};
