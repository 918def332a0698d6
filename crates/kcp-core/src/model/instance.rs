//! Instancia de servicio detrás de un runtime.
use serde::{Deserialize, Serialize};

/// Detalles de la instancia copiados a la operación al crearla.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDetails {
    #[serde(default)]
    pub runtime_id: String,
    #[serde(default)]
    pub shoot_name: String,
    #[serde(default)]
    pub shoot_domain: String,
    #[serde(default)]
    pub subaccount_id: String,
}

/// Instancia tal como la guarda el broker: los detalles viajan serializados
/// y se decodifican bajo demanda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub runtime_id: String,
    pub global_account_id: String,
    pub parameters: serde_json::Value,
    pub details: serde_json::Value,
}

impl Instance {
    /// Decodifica los detalles de la instancia.
    pub fn instance_details(&self) -> Result<InstanceDetails, serde_json::Error> {
        if self.details.is_null() {
            return Ok(InstanceDetails { runtime_id: self.runtime_id.clone(),
                                        ..InstanceDetails::default() });
        }
        serde_json::from_value(self.details.clone())
    }
}
