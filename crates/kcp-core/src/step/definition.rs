use crate::model::Operation;

use super::{StepLogger, StepRunResult};

/// Condición evaluada contra la operación en memoria justo antes del step.
/// `false` salta el step sin invocarlo ni tocar el store.
pub type Predicate = Box<dyn Fn(&Operation) -> bool + Send + Sync>;

/// Trait que define un Step.
///
/// Contrato:
/// - Debe ser idempotente: el motor puede re-ejecutarlo tras un reinicio.
/// - Debe persistir sus mutaciones antes de devolver `Repeat`, porque lo
///   único que cruza invocaciones es la operación almacenada.
/// - El motor no persiste nada por el step, ni siquiera en caso de error.
pub trait Step: Send + Sync {
    /// Nombre estable, usado en logs y eventos.
    fn name(&self) -> &str;

    /// Ejecuta el step sobre la operación.
    fn run(&self, operation: Operation, log: &StepLogger) -> StepRunResult;
}
