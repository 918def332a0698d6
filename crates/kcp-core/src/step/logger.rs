use std::fmt::Display;

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants::STEP_LOG_TARGET;

/// Logger entregado a cada step: antepone operación y step a cada línea.
#[derive(Debug, Clone)]
pub struct StepLogger {
    operation_id: Uuid,
    step: String,
}

impl StepLogger {
    pub fn new(operation_id: Uuid, step: impl Into<String>) -> Self {
        Self { operation_id,
               step: step.into() }
    }

    pub fn debug(&self, msg: impl Display) {
        debug!(target: STEP_LOG_TARGET, "operation={} step={} {}", self.operation_id, self.step, msg);
    }

    pub fn info(&self, msg: impl Display) {
        info!(target: STEP_LOG_TARGET, "operation={} step={} {}", self.operation_id, self.step, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        warn!(target: STEP_LOG_TARGET, "operation={} step={} {}", self.operation_id, self.step, msg);
    }

    pub fn error(&self, msg: impl Display) {
        error!(target: STEP_LOG_TARGET, "operation={} step={} {}", self.operation_id, self.step, msg);
    }
}
