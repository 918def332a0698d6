use serde::{Deserialize, Serialize};

/// Origen de la versión objetivo de Kyma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    Parameters,
}

/// Versión objetivo resuelta para una operación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    pub version: String,
    pub major_version: u32,
    pub origin: VersionOrigin,
}

impl RuntimeVersion {
    pub fn from_parameters(version: impl Into<String>, major_version: u32) -> Self {
        Self { version: version.into(),
               major_version,
               origin: VersionOrigin::Parameters }
    }
}
