use kcp_core::EngineError;
use kcp_orchestration::error::OrchestrationError;
use kcp_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error del motor: {0}")]
    Engine(#[from] EngineError),
    #[error("Error de orquestación: {0}")]
    Orchestration(#[from] OrchestrationError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error del dispatcher: {0}")]
    Dispatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_config_variant_format() {
        let err = AppError::Config("mala configuración".into());
        assert_eq!(err.to_string(), "Error de configuración: mala configuración");
    }

    #[test]
    fn test_io_variant_from() {
        let io_err = std::io::Error::other("falló IO");
        let err: AppError = io_err.into();
        assert_eq!(err.to_string(), "Error en IO: falló IO");
    }

    #[test]
    fn test_dispatch_variant_format() {
        let err = AppError::Dispatch("task 7 cancelled".into());
        assert_eq!(err.to_string(), "Error del dispatcher: task 7 cancelled");
    }

    #[test]
    fn test_engine_variant_from() {
        let id = Uuid::nil();
        let err: AppError = EngineError::OperationNotFound(id).into();
        assert!(matches!(err, AppError::Engine(EngineError::OperationNotFound(x)) if x == id));
    }
}
