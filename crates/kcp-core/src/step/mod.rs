//! Definiciones relacionadas a Steps.
//!
//! Un Step es una unidad de trabajo idempotente sobre una operación. Este
//! módulo define:
//! - `Step`: interfaz usada por el motor.
//! - `StepRunResult`: continuar, repetir tras un intervalo o fallar.
//! - `StepLogger`: logger con el contexto de operación y step.
//! - `Predicate`: condición opcional evaluada antes de ejecutar un step.

pub mod definition;
mod logger;
mod run_result;

pub use definition::{Predicate, Step};
pub use logger::StepLogger;
pub use run_result::StepRunResult;
