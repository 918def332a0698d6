//! kcp-orchestration – gestor de ciclo de vida de operaciones por runtime
//!
//! Una orquestación ("actualizar todos los clusters a Kyma 2.x") tiene una
//! operación por runtime objetivo. Este crate crea esas operaciones, las
//! reanuda tras un reinicio, las cancela y registra el estado de
//! notificación. No ejecuta steps: eso lo hace `kcp_core::StepManager`.

pub mod error;
pub mod lifecycle;
pub mod version;

pub use error::{OrchestrationError, VersionError};
pub use lifecycle::{LifecycleManager, OperationFactory, RetryFailure, RetryOutcome};
pub use version::{determine_major_version, is_custom_version, parse_major_version};
