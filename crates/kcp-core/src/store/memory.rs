use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{OperationFilter, OperationPage, OperationStore};
use crate::errors::StoreError;
use crate::model::Operation;

/// Store en memoria. El compare-and-swap de `update` se hace bajo el lock del
/// shard de `DashMap`, por lo que es atómico por registro.
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    inner: DashMap<Uuid, Operation>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl OperationStore for InMemoryOperationStore {
    fn insert(&self, operation: Operation) -> Result<Operation, StoreError> {
        match self.inner.entry(operation.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(operation.id)),
            Entry::Vacant(slot) => {
                slot.insert(operation.clone());
                Ok(operation)
            }
        }
    }

    fn get(&self, id: Uuid) -> Result<Operation, StoreError> {
        self.inner
            .get(&id)
            .map(|op| op.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn update(&self, mut operation: Operation) -> Result<Operation, StoreError> {
        let mut stored = self.inner
                             .get_mut(&operation.id)
                             .ok_or(StoreError::NotFound(operation.id))?;
        if stored.version != operation.version {
            return Err(StoreError::Conflict { id: operation.id,
                                              expected: operation.version,
                                              actual: stored.version });
        }
        operation.version += 1;
        *stored = operation.clone();
        Ok(operation)
    }

    fn list_by_orchestration(&self, orchestration_id: &str, filter: &OperationFilter)
                             -> Result<OperationPage, StoreError> {
        let mut matching: Vec<Operation> =
            self.inner
                .iter()
                .filter(|e| e.orchestration_id.as_deref() == Some(orchestration_id) && filter.matches(e.value()))
                .map(|e| e.value().clone())
                .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let total_count = matching.len();
        let operations: Vec<Operation> = match filter.window() {
            Some((offset, limit)) => matching.into_iter().skip(offset).take(limit).collect(),
            None => matching,
        };
        Ok(OperationPage { count: operations.len(),
                           total_count,
                           operations })
    }
}
