//! Implementación Postgres (Diesel) de `OperationStore`.
//!
//! - Una fila por operación en la tabla `operations`. Las columnas
//!   consultables (estado, tipo, orquestación) se guardan planas; el resto del
//!   registro viaja en `data` (JSONB).
//! - `update` es un compare-and-swap: `UPDATE ... WHERE id = $1 AND version =
//!   $2`. Si no se afecta ninguna fila se distingue entre operación inexistente
//!   y conflicto de versión.
//! - Errores transitorios (pool, serialización) se reintentan con un backoff
//!   corto antes de propagarse como `StoreError::Backend`.

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use kcp_core::{InstanceDetails,
               NotificationState,
               Operation,
               OperationFilter,
               OperationPage,
               OperationStore,
               Runtime,
               RuntimeVersion,
               StoreError};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::operations;

/// Pool r2d2 de conexiones Postgres. Se migra al construirse.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

type PooledConn = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones (pool real en producción, sustituible en
/// tests).
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PooledConn, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PooledConn, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila de `operations`. El orden de campos sigue el de las columnas.
#[derive(Queryable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = operations)]
#[diesel(treat_none_as_null = true)]
pub struct OperationRow {
    pub id: Uuid,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub instance_id: String,
    pub orchestration_id: Option<String>,
    pub target_operation_id: String,
    pub operation_type: String,
    pub state: String,
    pub description: String,
    pub data: Value,
}

/// Parte no indexada de la operación, serializada en la columna `data`.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct OperationData {
    runtime_id: String,
    provisioning_parameters: Value,
    instance_details: InstanceDetails,
    runtime_version: Option<RuntimeVersion>,
    runtime: Runtime,
    dry_run: bool,
    notification: bool,
    notification_state: NotificationState,
}

impl OperationRow {
    fn from_operation(op: &Operation) -> Result<Self, PersistenceError> {
        let data = OperationData { runtime_id: op.runtime_id.clone(),
                                   provisioning_parameters: op.provisioning_parameters.clone(),
                                   instance_details: op.instance_details.clone(),
                                   runtime_version: op.runtime_version.clone(),
                                   runtime: op.runtime.clone(),
                                   dry_run: op.dry_run,
                                   notification: op.notification,
                                   notification_state: op.notification_state };
        let data = serde_json::to_value(&data).map_err(|e| PersistenceError::Decode(format!("encode data: {e}")))?;
        Ok(Self { id: op.id,
                  version: op.version,
                  created_at: op.created_at,
                  updated_at: op.updated_at,
                  instance_id: op.instance_id.clone(),
                  orchestration_id: op.orchestration_id.clone(),
                  target_operation_id: op.provisioner_operation_id.clone(),
                  operation_type: op.operation_type.as_str().to_string(),
                  state: op.state.as_str().to_string(),
                  description: op.description.clone(),
                  data })
    }

    fn into_operation(self) -> Result<Operation, PersistenceError> {
        let state = self.state
                        .parse()
                        .map_err(|_| PersistenceError::Decode(format!("unknown state '{}'", self.state)))?;
        let operation_type = self.operation_type
                                 .parse()
                                 .map_err(|_| PersistenceError::Decode(format!("unknown operation type '{}'", self.operation_type)))?;
        let data: OperationData =
            serde_json::from_value(self.data).map_err(|e| PersistenceError::Decode(format!("operation {}: {e}", self.id)))?;
        Ok(Operation { id: self.id,
                       version: self.version,
                       created_at: self.created_at,
                       updated_at: self.updated_at,
                       operation_type,
                       state,
                       description: self.description,
                       orchestration_id: self.orchestration_id,
                       instance_id: self.instance_id,
                       runtime_id: data.runtime_id,
                       provisioner_operation_id: self.target_operation_id,
                       provisioning_parameters: data.provisioning_parameters,
                       instance_details: data.instance_details,
                       runtime_version: data.runtime_version,
                       runtime: data.runtime,
                       dry_run: data.dry_run,
                       notification: data.notification,
                       notification_state: data.notification_state })
    }
}

/// Errores transitorios que vale la pena reintentar.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
        // Algunos drivers sólo exponen el texto.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected") || m.contains("connection closed") || m.contains("timeout")
        }
        _ => false,
    }
}

/// Hasta 3 reintentos con backoff lineal de 15ms.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Resultado interno del compare-and-swap, antes de mapearlo a `StoreError`.
enum CasResult {
    Updated,
    Missing,
    Stale(i64),
}

fn filtered_query<'a>(orchestration_id: &'a str, filter: &OperationFilter) -> operations::BoxedQuery<'a, Pg> {
    let mut query = operations::table.filter(operations::orchestration_id.eq(orchestration_id))
                                     .into_boxed();
    if !filter.states.is_empty() {
        let states: Vec<String> = filter.states.iter().map(|s| s.as_str().to_string()).collect();
        query = query.filter(operations::state.eq_any(states));
    }
    if let Some(operation_type) = filter.operation_type {
        query = query.filter(operations::operation_type.eq(operation_type.as_str().to_string()));
    }
    query
}

/// Store durable de operaciones sobre Postgres.
pub struct PgOperationStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgOperationStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl PgOperationStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> OperationStore for PgOperationStore<P> {
    fn insert(&self, operation: Operation) -> Result<Operation, StoreError> {
        debug!("insert:start id={} type={}", operation.id, operation.operation_type);
        let row = OperationRow::from_operation(&operation)?;
        let result = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(operations::table).values(&row)
                                                  .execute(&mut conn)
                                                  .map_err(PersistenceError::from)
        });
        match result {
            Ok(_) => Ok(operation),
            Err(PersistenceError::UniqueViolation(_)) => Err(StoreError::AlreadyExists(operation.id)),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, id: Uuid) -> Result<Operation, StoreError> {
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            operations::table.find(id)
                             .first::<OperationRow>(&mut conn)
                             .map_err(PersistenceError::from)
        });
        match row {
            Ok(row) => Ok(row.into_operation()?),
            Err(PersistenceError::NotFound) => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, operation: Operation) -> Result<Operation, StoreError> {
        let expected = operation.version;
        let mut next = operation;
        next.version = expected + 1;
        let row = OperationRow::from_operation(&next)?;
        let outcome = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run::<_, diesel::result::Error, _>(|tx| {
                    let affected = diesel::update(operations::table.filter(operations::id.eq(row.id))
                                                                   .filter(operations::version.eq(expected)))
                                   .set(&row)
                                   .execute(tx)?;
                    if affected > 0 {
                        return Ok(CasResult::Updated);
                    }
                    let current = operations::table.find(row.id)
                                                   .select(operations::version)
                                                   .first::<i64>(tx)
                                                   .optional()?;
                    Ok(match current {
                        Some(actual) => CasResult::Stale(actual),
                        None => CasResult::Missing,
                    })
                })
                .map_err(PersistenceError::from)
        })?;
        match outcome {
            CasResult::Updated => {
                debug!("update:ok id={} version={}", next.id, next.version);
                Ok(next)
            }
            CasResult::Missing => Err(StoreError::NotFound(next.id)),
            CasResult::Stale(actual) => Err(StoreError::Conflict { id: next.id, expected, actual }),
        }
    }

    fn list_by_orchestration(&self, orchestration_id: &str, filter: &OperationFilter) -> Result<OperationPage, StoreError> {
        let (rows, total_count) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let total: i64 = filtered_query(orchestration_id, filter).count()
                                                                     .get_result(&mut conn)?;
            let mut query = filtered_query(orchestration_id, filter).order((operations::created_at.asc(),
                                                                            operations::id.asc()));
            if let Some((offset, limit)) = filter.window() {
                query = query.offset(offset as i64).limit(limit as i64);
            }
            let rows = query.load::<OperationRow>(&mut conn)?;
            Ok::<_, PersistenceError>((rows, total))
        })?;
        let operations = rows.into_iter()
                             .map(OperationRow::into_operation)
                             .collect::<Result<Vec<_>, _>>()?;
        Ok(OperationPage { count: operations.len(),
                           total_count: total_count as usize,
                           operations })
    }
}

/// Construye un pool r2d2 y corre las migraciones pendientes.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max_size = max_size.max(1);
    let min_size = min_size.max(1);
    if min_size > max_size {
        warn!("min_size > max_size ({min_size} > {max_size}), using min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(min_size.min(max_size)))
                                    .max_size(max_size)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}
