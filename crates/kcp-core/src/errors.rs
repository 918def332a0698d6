//! Errores del core: almacenamiento, steps y motor.

use thiserror::Error;
use uuid::Uuid;

/// Errores del contrato `OperationStore`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("operation {0} not found")] NotFound(Uuid),
    #[error("operation {0} already exists")] AlreadyExists(Uuid),
    #[error("operation {id} version conflict: expected {expected}, stored {actual}")]
    Conflict { id: Uuid, expected: i64, actual: i64 },
    #[error("storage backend: {0}")] Backend(String),
}

impl StoreError {
    /// `true` si el error es un conflicto de concurrencia optimista.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Error devuelto por un step. El motor lo propaga sin reinterpretarlo.
#[derive(Debug, Error, Clone)]
pub enum StepError {
    #[error("{0}")] Failed(String),
    #[error("storage: {0}")] Storage(#[from] StoreError),
}

impl StepError {
    pub fn failed(msg: impl Into<String>) -> Self {
        StepError::Failed(msg.into())
    }
}

/// Errores fatales de una invocación de `StepManager::execute`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("operation {0} not found")] OperationNotFound(Uuid),
    #[error("storage error: {0}")] Storage(StoreError),
    #[error("init step not registered")] InitStepMissing,
    #[error("step {step} failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },
    #[error("step {step} panicked: {message}")] StepPanicked { step: String, message: String },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::OperationNotFound(id),
            other => EngineError::Storage(other),
        }
    }
}
