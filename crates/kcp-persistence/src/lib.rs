//! kcp-persistence
//!
//! Implementación Postgres (Diesel) de `OperationStore`, con paridad de
//! contrato respecto al store en memoria del core: compare-and-swap sobre
//! `version`, listado ordenado por `created_at` y paginación 1-based.
//!
//! Módulos:
//! - `pg`: store sobre Postgres y construcción del pool.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use error::PersistenceError;
pub use pg::{build_pool, ConnectionProvider, PgOperationStore, PgPool, PoolProvider};
