//! Contrato del store de operaciones.
//!
//! El motor sólo necesita CRUD por id con compare-and-swap sobre `version` y
//! un listado filtrado por orquestación. El motor de almacenamiento concreto
//! (memoria, Postgres) es externo al core.
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::StoreError;
use crate::model::{Operation, OperationState, OperationType};

/// Filtro para listar operaciones de una orquestación.
///
/// - `states` vacío significa "cualquier estado".
/// - `page` es 1-based; `page_size == None` devuelve todo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationFilter {
    pub states: Vec<OperationState>,
    pub operation_type: Option<OperationType>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl OperationFilter {
    pub fn with_states(states: &[OperationState]) -> Self {
        Self { states: states.to_vec(),
               ..Self::default() }
    }

    pub fn of_type(mut self, operation_type: OperationType) -> Self {
        self.operation_type = Some(operation_type);
        self
    }

    pub fn paged(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Evalúa el filtro (sin paginación) contra una operación.
    pub fn matches(&self, op: &Operation) -> bool {
        let state_ok = self.states.is_empty() || self.states.contains(&op.state);
        let type_ok = self.operation_type.map_or(true, |t| t == op.operation_type);
        state_ok && type_ok
    }

    /// Offset y límite efectivos, si hay paginación.
    pub fn window(&self) -> Option<(usize, usize)> {
        let size = self.page_size?;
        let page = self.page.unwrap_or(1).max(1);
        Some(((page - 1) * size, size))
    }
}

/// Resultado de un listado: la página, su tamaño y el total sin paginar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationPage {
    pub operations: Vec<Operation>,
    pub count: usize,
    pub total_count: usize,
}

/// Store durable de operaciones.
///
/// Contrato:
/// - `insert` falla con `AlreadyExists` si el id ya existe.
/// - `get` falla con `NotFound` si el id no existe.
/// - `update` compara `operation.version` con la versión almacenada; si no
///   coinciden devuelve `Conflict` sin escribir. Si coinciden persiste y
///   devuelve la operación con `version + 1`.
/// - `list_by_orchestration` ordena por `created_at` y luego por `id`.
pub trait OperationStore: Send + Sync {
    fn insert(&self, operation: Operation) -> Result<Operation, StoreError>;
    fn get(&self, id: Uuid) -> Result<Operation, StoreError>;
    fn update(&self, operation: Operation) -> Result<Operation, StoreError>;
    fn list_by_orchestration(&self, orchestration_id: &str, filter: &OperationFilter)
                             -> Result<OperationPage, StoreError>;
}

impl<S: OperationStore + ?Sized> OperationStore for Arc<S> {
    fn insert(&self, operation: Operation) -> Result<Operation, StoreError> {
        (**self).insert(operation)
    }
    fn get(&self, id: Uuid) -> Result<Operation, StoreError> {
        (**self).get(id)
    }
    fn update(&self, operation: Operation) -> Result<Operation, StoreError> {
        (**self).update(operation)
    }
    fn list_by_orchestration(&self, orchestration_id: &str, filter: &OperationFilter)
                             -> Result<OperationPage, StoreError> {
        (**self).list_by_orchestration(orchestration_id, filter)
    }
}
