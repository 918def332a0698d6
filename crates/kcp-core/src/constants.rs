//! Constantes compartidas por el motor y el gestor de ciclo de vida.
//!
//! Las descripciones forman parte del rastro visible para operadores, por lo
//! que se mantienen estables entre versiones.

/// Descripción con la que nace toda operación creada por una orquestación.
pub const DESCRIPTION_CREATED: &str = "Operation created";

/// Descripción fijada al cancelar una operación pendiente.
pub const DESCRIPTION_CANCELED: &str = "Operation was canceled";

/// Descripción fijada al re-armar una operación en `Retrying`.
pub const DESCRIPTION_RETRY_TRIGGERED: &str = "Operation retry triggered";

/// Intentos máximos de recarga + reescritura ante un conflicto de versión.
pub const MAX_CONFLICT_ATTEMPTS: usize = 3;

/// Target de log usado por `StepLogger`.
pub const STEP_LOG_TARGET: &str = "kcp::step";
