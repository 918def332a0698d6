//! Motor de ejecución de steps.
//!
//! - `StepManager`: registro ordenado de steps y `execute(operation_id)`.
//! - `OperationManager`: utilidades para que los steps persistan su estado y
//!   decidan reintentos.

pub mod manager;
pub mod operation_manager;

pub use manager::StepManager;
pub use operation_manager::OperationManager;
