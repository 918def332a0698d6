//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y las expone como un
//! `AppConfig` inmutable. La conexión a base de datos es opcional: sin
//! `DATABASE_URL` la demo usa el store en memoria.
use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::errors::AppError;

/// Versión de Kyma por defecto para resolver versiones custom.
pub const DEFAULT_KYMA_VERSION: &str = "2.0.0";

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Versión usada cuando la orquestación pide una versión custom
    /// (`PR-*`, `main-*`).
    pub kyma_version: String,
    /// Intervalo mínimo entre invocaciones del motor para una misma
    /// operación.
    pub polling_interval: Duration,
    /// Operaciones ejecutadas en paralelo por el dispatcher.
    pub max_parallel: usize,
    pub database: Option<DatabaseConfig>,
}

/// Parámetros de conexión a la base de datos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// URL completa de conexión (postgres://...).
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { kyma_version: DEFAULT_KYMA_VERSION.to_string(),
               polling_interval: Duration::from_millis(500),
               max_parallel: 4,
               database: None }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno (cargando `.env` si existe).
    pub fn from_env() -> Result<Self, AppError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let kyma_version = lookup("KCP_KYMA_VERSION").filter(|v| !v.trim().is_empty())
                                                     .unwrap_or(defaults.kyma_version);
        let polling_ms = parse_or(&lookup, "KCP_POLLING_INTERVAL_MS", defaults.polling_interval.as_millis() as u64)?;
        let max_parallel = parse_or(&lookup, "KCP_MAX_PARALLEL", defaults.max_parallel)?;
        if max_parallel == 0 {
            return Err(AppError::Config("KCP_MAX_PARALLEL must be at least 1".into()));
        }
        let database = match lookup("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig { url,
                                               min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
                                               max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 16)? }),
            None => None,
        };
        Ok(Self { kyma_version,
                  polling_interval: Duration::from_millis(polling_ms),
                  max_parallel,
                  database })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
    where F: Fn(&str) -> Option<String>,
          T: std::str::FromStr
{
    match lookup(key) {
        Some(raw) => raw.trim()
                        .parse()
                        .map_err(|_| AppError::Config(format!("{key}={raw:?} is not a valid number"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.kyma_version, "2.0.0");
        assert_eq!(cfg.polling_interval, Duration::from_millis(500));
    }

    #[test]
    fn reads_every_variable() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("KCP_KYMA_VERSION", "2.4.1"),
                                                       ("KCP_POLLING_INTERVAL_MS", "50"),
                                                       ("KCP_MAX_PARALLEL", "8"),
                                                       ("DATABASE_URL", "postgres://kcp@localhost/kcp"),
                                                       ("DATABASE_MAX_CONNECTIONS", "4")])).unwrap();
        assert_eq!(cfg.kyma_version, "2.4.1");
        assert_eq!(cfg.polling_interval, Duration::from_millis(50));
        assert_eq!(cfg.max_parallel, 8);
        let db = cfg.database.unwrap();
        assert_eq!(db.min_connections, 2);
        assert_eq!(db.max_connections, 4);
    }

    #[test]
    fn invalid_number_is_a_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("KCP_POLLING_INTERVAL_MS", "soon")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("KCP_POLLING_INTERVAL_MS")));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("KCP_MAX_PARALLEL", "0")])).is_err());
    }
}
