//! `Operation`: registro persistido que el motor hace avanzar paso a paso.
//!
//! Invariantes:
//! - `version` es el token de concurrencia optimista; el store lo incrementa
//!   en cada `update` exitoso y rechaza escrituras con una versión vieja.
//! - `description` acumula un rastro legible del progreso (los steps agregan
//!   su nombre), de modo que tras un aborto se vea hasta dónde llegó.
//! - `orchestration_id` sólo existe en operaciones creadas por una
//!   orquestación.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{InstanceDetails, Runtime, RuntimeOperation, RuntimeVersion};

/// Estado de la última operación sobre un runtime.
///
/// Transiciones (vista de orquestación):
/// - `Pending` -> `InProgress` -> {`Succeeded`, `Failed`, `Retrying`}
/// - `Retrying` -> `Pending` (sólo al reanudar)
/// - `Pending` -> `Canceled` (sólo al cancelar)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "retrying")]
    Retrying,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "canceled")]
    Canceled,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::InProgress => "in progress",
            OperationState::Retrying => "retrying",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationState::Pending),
            "in progress" => Ok(OperationState::InProgress),
            "retrying" => Ok(OperationState::Retrying),
            "succeeded" => Ok(OperationState::Succeeded),
            "failed" => Ok(OperationState::Failed),
            "canceled" => Ok(OperationState::Canceled),
            other => Err(format!("unknown operation state: {other}")),
        }
    }
}

/// Estado de la notificación al usuario final dentro de una orquestación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationState {
    #[default]
    Pending,
    Created,
    Cancelled,
    Failed,
}

impl NotificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationState::Pending => "pending",
            NotificationState::Created => "created",
            NotificationState::Cancelled => "cancelled",
            NotificationState::Failed => "failed",
        }
    }
}

/// Tipo de cambio de ciclo de vida que modela la operación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Provision,
    UpgradeKyma,
    UpgradeCluster,
    Update,
    Deprovision,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Provision => "provision",
            OperationType::UpgradeKyma => "upgrade_kyma",
            OperationType::UpgradeCluster => "upgrade_cluster",
            OperationType::Update => "update",
            OperationType::Deprovision => "deprovision",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision" => Ok(OperationType::Provision),
            "upgrade_kyma" => Ok(OperationType::UpgradeKyma),
            "upgrade_cluster" => Ok(OperationType::UpgradeCluster),
            "update" => Ok(OperationType::Update),
            "deprovision" => Ok(OperationType::Deprovision),
            other => Err(format!("unknown operation type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub operation_type: OperationType,
    pub state: OperationState,
    pub description: String,
    pub orchestration_id: Option<String>,
    pub instance_id: String,
    pub runtime_id: String,
    /// Handle de la operación asíncrona en el provisioner; vacío hasta asignarse.
    pub provisioner_operation_id: String,
    pub provisioning_parameters: serde_json::Value,
    pub instance_details: InstanceDetails,
    pub runtime_version: Option<RuntimeVersion>,
    pub runtime: Runtime,
    pub dry_run: bool,
    pub notification: bool,
    pub notification_state: NotificationState,
}

impl Operation {
    /// Operación mínima en estado `state`, sin orquestación asociada.
    pub fn new(operation_type: OperationType, instance_id: impl Into<String>, state: OperationState) -> Self {
        let now = Utc::now();
        let instance_id = instance_id.into();
        Self { id: Uuid::new_v4(),
               version: 0,
               created_at: now,
               updated_at: now,
               operation_type,
               state,
               description: String::new(),
               orchestration_id: None,
               instance_id: instance_id.clone(),
               runtime_id: String::new(),
               provisioner_operation_id: String::new(),
               provisioning_parameters: serde_json::Value::Null,
               instance_details: InstanceDetails::default(),
               runtime_version: None,
               runtime: Runtime { instance_id,
                                  ..Runtime::default() },
               dry_run: false,
               notification: false,
               notification_state: NotificationState::default() }
    }

    /// Handle externo visible de la operación (API de orquestación).
    pub fn runtime_operation(&self) -> RuntimeOperation {
        RuntimeOperation { id: self.id,
                           runtime: self.runtime.clone(),
                           dry_run: self.dry_run,
                           notification: self.notification,
                           notification_state: self.notification_state }
    }

    /// Agrega `text` al rastro de progreso separado por un espacio.
    pub fn append_description(&mut self, text: &str) {
        if self.description.is_empty() {
            self.description = text.to_string();
        } else {
            self.description.push(' ');
            self.description.push_str(text);
        }
    }

    /// Marca la operación como modificada ahora.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
