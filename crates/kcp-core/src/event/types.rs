//! Tipos de evento.
//!
//! Los eventos son inmutables una vez publicados: los handlers reciben una
//! referencia compartida.
use std::any::Any;
use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Operation;

/// Payload publicable en el `EventBus`. La suscripción es por tipo concreto.
pub trait Event: Any + Debug + Send + Sync {
    /// Nombre estable del evento, para logs.
    fn name(&self) -> &'static str;
}

/// Resultado de un step, tal como lo ven los observadores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Completed,
    Repeat { after: Duration },
    Failed { error: String },
}

/// Emitido tras cada step ejecutado (no se emite para steps saltados por
/// predicado ni para steps que entraron en pánico).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepProcessed {
    pub operation_id: Uuid,
    pub step_name: String,
    pub outcome: StepOutcome,
    /// Operación tal como la devolvió el step.
    pub operation: Operation,
    pub processed_at: DateTime<Utc>,
}

impl Event for StepProcessed {
    fn name(&self) -> &'static str {
        "step_processed"
    }
}
