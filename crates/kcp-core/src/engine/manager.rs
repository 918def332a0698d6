//! `StepManager`: ejecuta el pipeline de steps de una operación.
//!
//! Precondición: el dispatcher externo garantiza como máximo una invocación
//! activa de `execute` por id de operación. El manager no toma locks por
//! operación; invocaciones concurrentes con ids distintos son seguras.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::event::{EventBus, StepOutcome, StepProcessed};
use crate::model::Operation;
use crate::step::{Predicate, Step, StepLogger, StepRunResult};
use crate::store::OperationStore;

/// Entrada del registro: peso, step y predicado opcional.
struct StepEntry {
    weight: i32,
    step: Box<dyn Step>,
    predicate: Option<Predicate>,
}

pub struct StepManager<S: OperationStore> {
    store: S,
    bus: Arc<EventBus>,
    init_step: Option<Box<dyn Step>>,
    /// Siempre ordenado por peso ascendente, estable dentro del mismo peso.
    steps: Vec<StepEntry>,
}

impl<S: OperationStore> StepManager<S> {
    pub fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self { store,
               bus,
               init_step: None,
               steps: Vec::new() }
    }

    /// Instala el step inicial obligatorio; reemplaza uno previo.
    pub fn init_step(&mut self, step: impl Step + 'static) -> &mut Self {
        self.init_step = Some(Box::new(step));
        self
    }

    /// Inserta un step en su posición definitiva: después de todos los de
    /// peso menor o igual, así el orden de registro desempata. El registro
    /// queda ordenado y `execute` no vuelve a ordenar.
    pub fn add_step(&mut self, weight: i32, step: impl Step + 'static, predicate: Option<Predicate>) -> &mut Self {
        let at = self.steps.partition_point(|e| e.weight <= weight);
        self.steps.insert(at,
                          StepEntry { weight,
                                      step: Box::new(step),
                                      predicate });
        self
    }

    /// Nombres en orden de ejecución (init primero).
    pub fn step_names(&self) -> Vec<&str> {
        self.init_step
            .iter()
            .map(|s| s.name())
            .chain(self.steps.iter().map(|e| e.step.name()))
            .collect()
    }

    /// Ejecuta el pipeline sobre la operación `operation_id`.
    ///
    /// Devuelve `Ok(Duration::ZERO)` si todos los steps continuaron, o el
    /// intervalo del primer step que pidió repetición. El primer error o
    /// pánico aborta la invocación.
    pub fn execute(&self, operation_id: Uuid) -> Result<Duration, EngineError> {
        let init = self.init_step.as_deref().ok_or(EngineError::InitStepMissing)?;
        let mut operation = self.store.get(operation_id)?;
        debug!("execute:start operation={operation_id} state={}", operation.state);

        let pipeline = std::iter::once((init, None)).chain(self.steps.iter().map(|e| (e.step.as_ref(), e.predicate.as_ref())));
        for (step, predicate) in pipeline {
            if let Some(pred) = predicate {
                if !pred(&operation) {
                    debug!("operation={operation_id} step={} skipped by predicate", step.name());
                    continue;
                }
            }

            match self.run_step(step, operation)? {
                StepRunResult::Continue { operation: updated } => operation = updated,
                StepRunResult::Repeat { after, .. } => {
                    info!("operation={operation_id} step={} requested repeat in {:?}", step.name(), after);
                    return Ok(after);
                }
                StepRunResult::Failure { error, .. } => {
                    warn!("operation={operation_id} step={} failed: {error}", step.name());
                    return Err(EngineError::StepFailed { step: step.name().to_string(),
                                                         source: error });
                }
            }
        }

        debug!("execute:done operation={operation_id}");
        Ok(Duration::ZERO)
    }

    /// Ejecuta un único step con contención de pánicos y publica el evento.
    fn run_step(&self, step: &dyn Step, operation: Operation) -> Result<StepRunResult, EngineError> {
        let operation_id = operation.id;
        let logger = StepLogger::new(operation_id, step.name());
        let result = panic::catch_unwind(AssertUnwindSafe(|| step.run(operation, &logger)))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                warn!("operation={operation_id} step={} panicked: {message}", step.name());
                EngineError::StepPanicked { step: step.name().to_string(),
                                            message }
            })?;

        let outcome = match &result {
            StepRunResult::Continue { .. } => StepOutcome::Completed,
            StepRunResult::Repeat { after, .. } => StepOutcome::Repeat { after: *after },
            StepRunResult::Failure { error, .. } => StepOutcome::Failed { error: error.to_string() },
        };
        self.bus.publish(StepProcessed { operation_id,
                                         step_name: step.name().to_string(),
                                         outcome,
                                         operation: result.operation().clone(),
                                         processed_at: Utc::now() });
        Ok(result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OperationState, OperationType};
    use crate::store::InMemoryOperationStore;

    struct Named(&'static str);
    impl Step for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, operation: Operation, _log: &StepLogger) -> StepRunResult {
            StepRunResult::next(operation)
        }
    }

    #[test]
    fn registry_orders_by_weight_then_registration() {
        let mut m = StepManager::new(InMemoryOperationStore::new(), Arc::new(EventBus::new()));
        m.init_step(Named("init"));
        m.add_step(3, Named("c"), None)
         .add_step(1, Named("a1"), None)
         .add_step(2, Named("b"), None)
         .add_step(1, Named("a2"), None)
         .add_step(-1, Named("neg"), None);
        assert_eq!(m.step_names(), vec!["init", "neg", "a1", "a2", "b", "c"]);
    }

    #[test]
    fn execute_without_init_step_fails() {
        let store = InMemoryOperationStore::new();
        let op = store.insert(Operation::new(OperationType::UpgradeKyma, "i", OperationState::InProgress))
                      .unwrap();
        let m = StepManager::new(store, Arc::new(EventBus::new()));
        assert!(matches!(m.execute(op.id), Err(EngineError::InitStepMissing)));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
