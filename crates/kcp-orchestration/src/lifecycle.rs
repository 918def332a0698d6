//! Gestor de ciclo de vida de las operaciones de una orquestación.
//!
//! Sólo escribe los estados `Pending` y `Canceled` y el estado de
//! notificación; `InProgress` y `Retrying` los escriben los steps a través del
//! motor. Las escrituras fuera del pipeline recargan y re-aplican ante un
//! conflicto de versión, y descartan el cambio si el registro ya no está en el
//! estado esperado.
use kcp_core::constants::{DESCRIPTION_CANCELED, DESCRIPTION_CREATED, DESCRIPTION_RETRY_TRIGGERED,
                          MAX_CONFLICT_ATTEMPTS};
use kcp_core::{Instance, NotificationState, Operation, OperationFilter, OperationState, OperationStore, OperationType,
               Orchestration, Runtime, RuntimeOperation, RuntimeVersion, StoreError};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::OrchestrationError;
use crate::version::determine_major_version;

/// Estados que se reanudan tras un reinicio.
const RESUMABLE_STATES: [OperationState; 3] =
    [OperationState::InProgress, OperationState::Retrying, OperationState::Pending];

/// Contrato expuesto a la capa de API de orquestación.
pub trait OperationFactory {
    /// Crea e inserta la operación de `runtime` dentro de `orchestration`.
    fn new_operation(&self,
                     orchestration: &Orchestration,
                     runtime: &Runtime,
                     instance: &Instance,
                     state: OperationState)
                     -> Result<RuntimeOperation, OrchestrationError>;

    /// Operaciones a reanudar: `InProgress`, luego las `Retrying` (re-armadas
    /// a `Pending`), luego las `Pending`.
    fn resume_operations(&self, orchestration_id: &str) -> Result<Vec<RuntimeOperation>, OrchestrationError>;

    /// Cancela la operación pendiente del runtime indicado.
    fn cancel_operation(&self, orchestration_id: &str, runtime_id: &str) -> Result<(), OrchestrationError>;

    /// Cancela todas las operaciones pendientes de la orquestación.
    fn cancel_operations(&self, orchestration_id: &str) -> Result<(), OrchestrationError>;

    /// Busca cada id; una búsqueda fallida no aborta el resto del lote.
    fn retry_operations(&self, operation_ids: &[Uuid]) -> RetryOutcome;

    /// Operación pendiente del runtime, si existe.
    fn query_operation(&self, orchestration_id: &str, runtime: &Runtime)
                       -> Result<Option<RuntimeOperation>, OrchestrationError>;

    /// Todas las operaciones pendientes de la orquestación.
    fn query_operations(&self, orchestration_id: &str) -> Result<Vec<RuntimeOperation>, OrchestrationError>;

    /// Fija el estado de notificación de la operación de `runtime_id` que
    /// está en `current_state`.
    fn notify_operation(&self,
                        orchestration_id: &str,
                        runtime_id: &str,
                        current_state: OperationState,
                        notify_state: NotificationState)
                        -> Result<(), OrchestrationError>;
}

/// Id que no pudo resolverse en `retry_operations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub operation_id: Uuid,
    pub error: StoreError,
}

/// Resultado parcial de `retry_operations`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    pub operations: Vec<RuntimeOperation>,
    pub failures: Vec<RetryFailure>,
}

impl RetryOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct LifecycleManager<S: OperationStore> {
    store: S,
    operation_type: OperationType,
    default_kyma_version: String,
}

impl<S: OperationStore> LifecycleManager<S> {
    pub fn new(store: S, operation_type: OperationType, default_kyma_version: impl Into<String>) -> Self {
        Self { store,
               operation_type,
               default_kyma_version: default_kyma_version.into() }
    }

    /// Gestor para orquestaciones de upgrade de Kyma.
    pub fn upgrade_kyma(store: S, default_kyma_version: impl Into<String>) -> Self {
        Self::new(store, OperationType::UpgradeKyma, default_kyma_version)
    }

    /// Gestor para orquestaciones de upgrade de cluster.
    pub fn upgrade_cluster(store: S, default_kyma_version: impl Into<String>) -> Self {
        Self::new(store, OperationType::UpgradeCluster, default_kyma_version)
    }

    fn list(&self, orchestration_id: &str, states: &[OperationState]) -> Result<Vec<Operation>, StoreError> {
        let filter = OperationFilter::with_states(states).of_type(self.operation_type);
        Ok(self.store.list_by_orchestration(orchestration_id, &filter)?.operations)
    }

    /// Aplica `modify` si `precondition` se cumple. Ante un conflicto recarga
    /// y vuelve a evaluar. Devuelve la última operación conocida y si el
    /// cambio se persistió.
    fn modify_guarded<P, F>(&self,
                            mut operation: Operation,
                            precondition: P,
                            modify: F)
                            -> Result<(Operation, bool), StoreError>
        where P: Fn(&Operation) -> bool,
              F: Fn(&mut Operation)
    {
        let id = operation.id;
        let mut attempts = 0;
        loop {
            if !precondition(&operation) {
                debug!("operation {id} no longer in expected state ({}), skipping", operation.state);
                return Ok((operation, false));
            }
            modify(&mut operation);
            match self.store.update(operation) {
                Ok(updated) => return Ok((updated, true)),
                Err(e) if e.is_conflict() && attempts + 1 < MAX_CONFLICT_ATTEMPTS => {
                    attempts += 1;
                    debug!("operation {id}: {e}, reloading (attempt {attempts})");
                    operation = self.store.get(id)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn rearm_retrying(&self, operation: Operation) -> Result<(Operation, bool), StoreError> {
        self.modify_guarded(operation,
                            |op| op.state == OperationState::Retrying,
                            |op| {
                                op.state = OperationState::Pending;
                                op.description = DESCRIPTION_RETRY_TRIGGERED.to_string();
                                op.provisioner_operation_id.clear();
                                op.touch();
                            })
    }

    fn cancel_pending(&self, operation: Operation) -> Result<bool, StoreError> {
        let (op, applied) = self.modify_guarded(operation,
                                                |op| op.state == OperationState::Pending,
                                                |op| {
                                                    op.state = OperationState::Canceled;
                                                    op.description = DESCRIPTION_CANCELED.to_string();
                                                    op.touch();
                                                })?;
        if applied {
            info!("operation {} for runtime {} canceled", op.id, op.runtime_id);
        }
        Ok(applied)
    }
}

impl<S: OperationStore> OperationFactory for LifecycleManager<S> {
    fn new_operation(&self,
                     orchestration: &Orchestration,
                     runtime: &Runtime,
                     instance: &Instance,
                     state: OperationState)
                     -> Result<RuntimeOperation, OrchestrationError> {
        let details = instance.instance_details()
                              .map_err(|e| OrchestrationError::InstanceDetails(e.to_string()))?;

        let mut op = Operation::new(self.operation_type, runtime.instance_id.clone(), state);
        op.description = DESCRIPTION_CREATED.to_string();
        op.orchestration_id = Some(orchestration.orchestration_id.clone());
        op.runtime_id = if details.runtime_id.is_empty() {
            runtime.runtime_id.clone()
        } else {
            details.runtime_id.clone()
        };
        op.provisioning_parameters = instance.parameters.clone();
        op.instance_details = details;
        op.runtime = runtime.clone();
        op.dry_run = orchestration.parameters.dry_run;
        op.notification = orchestration.parameters.notification;

        let requested = &orchestration.parameters.kyma.version;
        if !requested.is_empty() {
            let major = determine_major_version(requested, &self.default_kyma_version)?;
            op.runtime_version = Some(RuntimeVersion::from_parameters(requested.clone(), major));
        }

        let inserted = self.store.insert(op)?;
        debug!("operation {} created for runtime {} in orchestration {}",
               inserted.id, inserted.runtime_id, orchestration.orchestration_id);
        Ok(inserted.runtime_operation())
    }

    fn resume_operations(&self, orchestration_id: &str) -> Result<Vec<RuntimeOperation>, OrchestrationError> {
        let ops = self.list(orchestration_id, &RESUMABLE_STATES)?;

        let mut in_progress = Vec::new();
        let mut retrying = Vec::new();
        let mut pending = Vec::new();
        for op in ops {
            match op.state {
                OperationState::InProgress => in_progress.push(op.runtime_operation()),
                OperationState::Pending => pending.push(op.runtime_operation()),
                OperationState::Retrying => {
                    let (latest, rearmed) = self.rearm_retrying(op)?;
                    match latest.state {
                        _ if rearmed => retrying.push(latest.runtime_operation()),
                        OperationState::InProgress => in_progress.push(latest.runtime_operation()),
                        OperationState::Pending => pending.push(latest.runtime_operation()),
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        info!("orchestration {orchestration_id}: resuming {} in progress, {} retrying, {} pending",
              in_progress.len(),
              retrying.len(),
              pending.len());

        in_progress.extend(retrying);
        in_progress.extend(pending);
        Ok(in_progress)
    }

    fn cancel_operation(&self, orchestration_id: &str, runtime_id: &str) -> Result<(), OrchestrationError> {
        for op in self.list(orchestration_id, &[OperationState::Pending])? {
            if op.runtime_id == runtime_id {
                self.cancel_pending(op)?;
            }
        }
        Ok(())
    }

    fn cancel_operations(&self, orchestration_id: &str) -> Result<(), OrchestrationError> {
        let mut canceled = 0usize;
        for op in self.list(orchestration_id, &[OperationState::Pending])? {
            if self.cancel_pending(op)? {
                canceled += 1;
            }
        }
        info!("orchestration {orchestration_id}: {canceled} pending operations canceled");
        Ok(())
    }

    fn retry_operations(&self, operation_ids: &[Uuid]) -> RetryOutcome {
        let mut outcome = RetryOutcome::default();
        for id in operation_ids {
            match self.store.get(*id) {
                Ok(op) => outcome.operations.push(op.runtime_operation()),
                Err(error) => {
                    warn!("while getting (retrying) operation {id}: {error}");
                    outcome.failures.push(RetryFailure { operation_id: *id,
                                                         error });
                }
            }
        }
        outcome
    }

    fn query_operation(&self, orchestration_id: &str, runtime: &Runtime)
                       -> Result<Option<RuntimeOperation>, OrchestrationError> {
        let found = self.list(orchestration_id, &[OperationState::Pending])?
                        .into_iter()
                        .find(|op| op.runtime_id == runtime.runtime_id)
                        .map(|op| op.runtime_operation());
        Ok(found)
    }

    fn query_operations(&self, orchestration_id: &str) -> Result<Vec<RuntimeOperation>, OrchestrationError> {
        Ok(self.list(orchestration_id, &[OperationState::Pending])?
               .iter()
               .map(Operation::runtime_operation)
               .collect())
    }

    fn notify_operation(&self,
                        orchestration_id: &str,
                        runtime_id: &str,
                        current_state: OperationState,
                        notify_state: NotificationState)
                        -> Result<(), OrchestrationError> {
        for op in self.list(orchestration_id, &[current_state])? {
            if op.runtime_id != runtime_id {
                continue;
            }
            let (op, applied) = self.modify_guarded(op,
                                                    |op| op.state == current_state,
                                                    |op| op.notification_state = notify_state)?;
            if applied {
                debug!("operation {} notification state set to {}", op.id, notify_state.as_str());
            }
        }
        Ok(())
    }
}
