//! Modelos neutrales (Operation, Orchestration, Instance, RuntimeVersion,...)

pub mod instance;
pub mod operation;
pub mod orchestration;
pub mod runtime_version;

pub use instance::{Instance, InstanceDetails};
pub use operation::{NotificationState, Operation, OperationState, OperationType};
pub use orchestration::{KymaParameters, Orchestration, OrchestrationParameters, Runtime, RuntimeOperation};
pub use runtime_version::{RuntimeVersion, VersionOrigin};
