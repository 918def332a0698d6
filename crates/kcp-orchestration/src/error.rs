use kcp_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum VersionError {
    #[error("cannot convert major version of {0:?} to int")] InvalidMajor(String),
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("storage: {0}")] Store(#[from] StoreError),
    #[error("while reading instance details: {0}")] InstanceDetails(String),
    #[error("while determining Kyma's major version: {0}")] Version(#[from] VersionError),
}
