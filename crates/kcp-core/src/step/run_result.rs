use std::time::Duration;

use crate::errors::StepError;
use crate::model::Operation;

/// Resultado abstracto de ejecutar un step.
///
/// El primer step que devuelve `Repeat` o `Failure` detiene el pipeline.
#[derive(Debug)]
pub enum StepRunResult {
    /// Continuar con el siguiente step.
    Continue { operation: Operation },
    /// Volver a ejecutar la operación tras `after` (siempre > 0).
    Repeat { operation: Operation, after: Duration },
    /// Error fatal para esta invocación.
    Failure { operation: Operation, error: StepError },
}

impl StepRunResult {
    pub fn next(operation: Operation) -> Self {
        StepRunResult::Continue { operation }
    }

    /// `Repeat` con `after`; un intervalo cero equivale a continuar.
    pub fn repeat(operation: Operation, after: Duration) -> Self {
        if after.is_zero() {
            StepRunResult::Continue { operation }
        } else {
            StepRunResult::Repeat { operation, after }
        }
    }

    pub fn fail(operation: Operation, error: impl Into<StepError>) -> Self {
        StepRunResult::Failure { operation,
                                 error: error.into() }
    }

    /// Construye el resultado a partir de la terna (operación, repeat, error).
    /// Un error tiene prioridad sobre el intervalo.
    pub fn from_parts(operation: Operation, repeat: Duration, error: Option<StepError>) -> Self {
        match error {
            Some(error) => StepRunResult::Failure { operation, error },
            None => Self::repeat(operation, repeat),
        }
    }

    pub fn operation(&self) -> &Operation {
        match self {
            StepRunResult::Continue { operation }
            | StepRunResult::Repeat { operation, .. }
            | StepRunResult::Failure { operation, .. } => operation,
        }
    }

    /// Intervalo de repetición; cero si no aplica.
    pub fn repeat_after(&self) -> Duration {
        match self {
            StepRunResult::Repeat { after, .. } => *after,
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OperationState, OperationType};

    fn op() -> Operation {
        Operation::new(OperationType::UpgradeKyma, "i", OperationState::InProgress)
    }

    #[test]
    fn zero_repeat_is_continue() {
        assert!(matches!(StepRunResult::repeat(op(), Duration::ZERO), StepRunResult::Continue { .. }));
        let r = StepRunResult::repeat(op(), Duration::from_secs(5));
        assert_eq!(r.repeat_after(), Duration::from_secs(5));
    }

    #[test]
    fn error_wins_over_repeat() {
        let r = StepRunResult::from_parts(op(), Duration::from_secs(1), Some(StepError::failed("x")));
        assert!(matches!(r, StepRunResult::Failure { .. }));
        assert_eq!(r.repeat_after(), Duration::ZERO);
    }
}
