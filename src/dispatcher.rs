//! Dispatcher asíncrono que conduce operaciones a través del `StepManager`.
//!
//! Cada id de operación se ejecuta en su propia tarea tokio, de modo que
//! nunca hay dos invocaciones simultáneas de `execute` para la misma
//! operación. `execute` es bloqueante (steps y store son síncronos) y corre
//! en `spawn_blocking`; los intervalos de repetición se esperan con
//! `tokio::time::sleep`.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kcp_core::{OperationStore, StepManager};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::errors::AppError;

/// Resultado de conducir una operación hasta que el motor deja de pedir
/// repeticiones.
#[derive(Debug)]
pub struct DriveReport {
    pub operation_id: Uuid,
    /// Invocaciones de `execute` realizadas.
    pub invocations: usize,
    pub result: Result<(), AppError>,
}

pub struct Dispatcher<S: OperationStore + 'static> {
    manager: Arc<StepManager<S>>,
    polling_interval: Duration,
    max_parallel: usize,
}

impl<S: OperationStore + 'static> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self { manager: Arc::clone(&self.manager),
               polling_interval: self.polling_interval,
               max_parallel: self.max_parallel }
    }
}

impl<S: OperationStore + 'static> Dispatcher<S> {
    pub fn new(manager: Arc<StepManager<S>>, polling_interval: Duration, max_parallel: usize) -> Self {
        Self { manager,
               polling_interval,
               max_parallel: max_parallel.max(1) }
    }

    /// Ejecuta la operación hasta que el motor devuelve intervalo cero o un
    /// error. Entre repeticiones espera el mayor entre el intervalo pedido
    /// y el intervalo de polling.
    pub async fn drive(&self, operation_id: Uuid) -> DriveReport {
        let mut invocations = 0;
        loop {
            let manager = Arc::clone(&self.manager);
            invocations += 1;
            let joined = tokio::task::spawn_blocking(move || manager.execute(operation_id)).await;
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!("operation {operation_id}: execute task aborted: {join_err}");
                    let err = AppError::Dispatch(format!("execute task aborted: {join_err}"));
                    return DriveReport { operation_id,
                                         invocations,
                                         result: Err(err) };
                }
            };
            match outcome {
                Ok(after) if after.is_zero() => {
                    debug!("operation {operation_id}: pipeline finished after {invocations} invocation(s)");
                    return DriveReport { operation_id,
                                         invocations,
                                         result: Ok(()) };
                }
                Ok(after) => {
                    let wait = after.max(self.polling_interval);
                    debug!("operation {operation_id}: repeat requested, sleeping {wait:?}");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!("operation {operation_id}: {e}");
                    return DriveReport { operation_id,
                                         invocations,
                                         result: Err(e.into()) };
                }
            }
        }
    }

    /// Conduce todas las operaciones, como mucho `max_parallel` a la vez.
    /// Ids repetidos se ejecutan una sola vez.
    pub async fn drive_all(&self, operation_ids: &[Uuid]) -> Vec<DriveReport> {
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        for &id in operation_ids {
            if !seen.insert(id) {
                continue;
            }
            let this = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                this.drive(id).await
            });
        }
        info!("dispatching {} operation(s), max_parallel={}", seen.len(), self.max_parallel);

        let mut reports = Vec::with_capacity(seen.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("dispatcher task failed: {e}"),
            }
        }
        reports
    }
}
