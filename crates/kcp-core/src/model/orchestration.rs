//! Orquestación y runtimes objetivo.
//!
//! Una `Orchestration` agrupa una operación por runtime objetivo ("actualizar
//! todos los clusters a Kyma 2.x"). El motor sólo la lee para copiar sus
//! parámetros al crear operaciones.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NotificationState;

/// Runtime (cluster) objetivo de una orquestación.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub instance_id: String,
    pub runtime_id: String,
    pub global_account_id: String,
    pub subaccount_id: String,
    pub shoot_name: String,
}

/// Handle externo de una operación por runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOperation {
    pub id: Uuid,
    pub runtime: Runtime,
    pub dry_run: bool,
    pub notification: bool,
    pub notification_state: NotificationState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KymaParameters {
    /// Versión solicitada; vacía significa "no cambiar la versión".
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationParameters {
    pub dry_run: bool,
    pub notification: bool,
    pub kyma: KymaParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orchestration {
    pub orchestration_id: String,
    pub parameters: OrchestrationParameters,
}

impl Orchestration {
    pub fn new(orchestration_id: impl Into<String>, parameters: OrchestrationParameters) -> Self {
        Self { orchestration_id: orchestration_id.into(),
               parameters }
    }
}
