//! Almacenamiento de operaciones con concurrencia optimista.

mod memory;
mod types;

pub use memory::InMemoryOperationStore;
pub use types::{OperationFilter, OperationPage, OperationStore};
