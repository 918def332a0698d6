//! Utilidades para steps: persistir mutaciones y decidir reintentos.
//!
//! El motor nunca persiste por los steps; cada step usa este helper para
//! guardar su estado antes de devolver `Repeat` o `Failure`.
use std::time::Duration;

use chrono::Utc;

use crate::constants::MAX_CONFLICT_ATTEMPTS;
use crate::errors::{StepError, StoreError};
use crate::model::{Operation, OperationState};
use crate::step::{StepLogger, StepRunResult};
use crate::store::OperationStore;

pub struct OperationManager<S: OperationStore> {
    store: S,
}

impl<S: OperationStore> OperationManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Aplica `modify` y persiste. Ante un conflicto de versión recarga la
    /// operación almacenada y re-aplica `modify` sobre ella.
    pub fn update_operation<F>(&self, mut operation: Operation, modify: F) -> Result<Operation, StoreError>
        where F: Fn(&mut Operation)
    {
        let id = operation.id;
        let mut attempts = 0;
        loop {
            modify(&mut operation);
            operation.touch();
            match self.store.update(operation) {
                Err(e) if e.is_conflict() && attempts + 1 < MAX_CONFLICT_ATTEMPTS => {
                    attempts += 1;
                    log::debug!("update_operation: {e}, reloading (attempt {attempts})");
                    operation = self.store.get(id)?;
                }
                other => return other,
            }
        }
    }

    /// Agrega `text` al rastro de progreso y persiste.
    pub fn append_description(&self, operation: Operation, text: &str) -> Result<Operation, StoreError> {
        self.update_operation(operation, |op| op.append_description(text))
    }

    /// Marca la operación como exitosa; el pipeline continúa.
    pub fn operation_succeeded(&self, operation: Operation, description: &str, log: &StepLogger) -> StepRunResult {
        match self.update_operation(operation.clone(), |op| {
                      op.state = OperationState::Succeeded;
                      op.description = description.to_string();
                  }) {
            Ok(updated) => StepRunResult::next(updated),
            Err(e) => {
                log.error(format!("unable to mark operation as succeeded: {e}"));
                StepRunResult::fail(operation, e)
            }
        }
    }

    /// Marca la operación como fallida y devuelve `Failure` con `error`.
    pub fn operation_failed(&self, operation: Operation, description: &str, error: StepError, log: &StepLogger)
                            -> StepRunResult {
        let failed_description = format!("{description}: {error}");
        log.error(format!("operation failed: {failed_description}"));
        match self.update_operation(operation.clone(), |op| {
                      op.state = OperationState::Failed;
                      op.description = failed_description.clone();
                  }) {
            Ok(updated) => StepRunResult::fail(updated, error),
            Err(e) => {
                log.error(format!("unable to mark operation as failed: {e}"));
                StepRunResult::fail(operation, error)
            }
        }
    }

    /// Pide repetir tras `retry_interval` mientras no haya pasado `max_time`
    /// desde la última modificación; luego marca la operación como fallida.
    ///
    /// No persiste al pedir repetición: `updated_at` sigue marcando el último
    /// cambio real y acota la ventana de reintentos.
    pub fn retry_operation(&self,
                           operation: Operation,
                           description: &str,
                           error: StepError,
                           retry_interval: Duration,
                           max_time: Duration,
                           log: &StepLogger)
                           -> StepRunResult {
        let since = (Utc::now() - operation.updated_at).to_std().unwrap_or(Duration::ZERO);
        if since < max_time {
            log.warn(format!("{description}: {error}; retrying in {retry_interval:?} (elapsed {since:?})"));
            return StepRunResult::repeat(operation, retry_interval);
        }
        log.error(format!("{description}: retry window of {max_time:?} exhausted"));
        self.operation_failed(operation, description, error, log)
    }
}
