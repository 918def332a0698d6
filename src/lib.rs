//! kcp-lifecycle
//!
//! Fachada del plano de control de operaciones:
//! - Re-exporta el motor (`kcp_core`), el gestor de orquestaciones
//!   (`kcp_orchestration`) y el store Postgres (`kcp_persistence`).
//! - `config`: configuración desde entorno / `.env`.
//! - `dispatcher`: conduce operaciones en tareas tokio.
//! - `errors`: error de aplicación que agrega los de cada capa.

pub mod config;
pub mod dispatcher;
pub mod errors;

pub use config::AppConfig;
pub use dispatcher::{Dispatcher, DriveReport};
pub use errors::AppError;

pub use kcp_core;
pub use kcp_orchestration;
pub use kcp_persistence;
