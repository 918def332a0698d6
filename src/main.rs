//! Demo del plano de control: crea una orquestación de upgrade de Kyma con
//! tres runtimes, reanuda sus operaciones y las conduce por un pipeline de
//! steps desde el dispatcher asíncrono.
//!
//! Por defecto usa el store en memoria; con la feature `pg_demo` y
//! `DATABASE_URL` usa Postgres.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kcp_core::{EventBus, Instance, Operation, OperationManager, OperationState, OperationStore, Orchestration,
               OrchestrationParameters, KymaParameters, Runtime, Step, StepLogger, StepOutcome, StepProcessed,
               StepManager, StepRunResult};
use kcp_lifecycle::{AppConfig, AppError, Dispatcher};
use kcp_orchestration::{LifecycleManager, OperationFactory};
use log::{error, info};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Pasa la operación a `InProgress`.
struct StartUpgrade<S: OperationStore> {
    manager: OperationManager<S>,
}

impl<S: OperationStore> Step for StartUpgrade<S> {
    fn name(&self) -> &str {
        "start_upgrade"
    }

    fn run(&self, operation: Operation, log: &StepLogger) -> StepRunResult {
        if operation.state != OperationState::Pending {
            return StepRunResult::next(operation);
        }
        match self.manager.update_operation(operation.clone(), |op| {
                              op.state = OperationState::InProgress;
                              op.append_description("upgrade started");
                          }) {
            Ok(updated) => {
                log.info("operation in progress");
                StepRunResult::next(updated)
            }
            Err(e) => StepRunResult::fail(operation, e),
        }
    }
}

/// Espera una vez a que el runtime esté listo.
struct AwaitRuntime {
    checked: Mutex<HashSet<Uuid>>,
    interval: Duration,
}

impl Step for AwaitRuntime {
    fn name(&self) -> &str {
        "await_runtime"
    }

    fn run(&self, operation: Operation, log: &StepLogger) -> StepRunResult {
        let first_check = match self.checked.lock() {
            Ok(mut checked) => checked.insert(operation.id),
            Err(_) => return StepRunResult::fail(operation, kcp_core::StepError::failed("runtime check state poisoned")),
        };
        if first_check {
            log.info(format!("runtime {} not ready yet", operation.runtime_id));
            return StepRunResult::repeat(operation, self.interval);
        }
        StepRunResult::next(operation)
    }
}

/// Aplica la versión resuelta de Kyma. No corre en dry-run.
struct ApplyKymaVersion<S: OperationStore> {
    manager: OperationManager<S>,
}

impl<S: OperationStore> Step for ApplyKymaVersion<S> {
    fn name(&self) -> &str {
        "apply_kyma_version"
    }

    fn run(&self, operation: Operation, log: &StepLogger) -> StepRunResult {
        let version = operation.runtime_version
                               .as_ref()
                               .map(|v| v.version.clone())
                               .unwrap_or_else(|| "current".to_string());
        match self.manager.append_description(operation.clone(), &format!("kyma {version} applied")) {
            Ok(updated) => {
                log.info(format!("applied kyma {version}"));
                StepRunResult::next(updated)
            }
            Err(e) => self.manager.operation_failed(operation, "unable to record kyma version", e.into(), log),
        }
    }
}

struct FinishUpgrade<S: OperationStore> {
    manager: OperationManager<S>,
}

impl<S: OperationStore> Step for FinishUpgrade<S> {
    fn name(&self) -> &str {
        "finish_upgrade"
    }

    fn run(&self, operation: Operation, log: &StepLogger) -> StepRunResult {
        let description = format!("{} done", operation.description);
        self.manager.operation_succeeded(operation, &description, log)
    }
}

fn build_pipeline<S>(store: Arc<S>, bus: Arc<EventBus>, repeat_interval: Duration) -> StepManager<Arc<S>>
    where S: OperationStore + 'static
{
    let mut manager = StepManager::new(Arc::clone(&store), bus);
    manager.init_step(StartUpgrade { manager: OperationManager::new(Arc::clone(&store)) })
           .add_step(10, AwaitRuntime { checked: Mutex::new(HashSet::new()),
                                        interval: repeat_interval },
                     None)
           .add_step(20,
                     ApplyKymaVersion { manager: OperationManager::new(Arc::clone(&store)) },
                     Some(Box::new(|op: &Operation| !op.dry_run)))
           .add_step(30, FinishUpgrade { manager: OperationManager::new(store) }, None);
    manager
}

fn demo_instance(n: usize) -> (Runtime, Instance) {
    let runtime = Runtime { instance_id: format!("instance-{n}"),
                            runtime_id: format!("runtime-{n}"),
                            global_account_id: "ga-demo".into(),
                            subaccount_id: format!("sa-{n}"),
                            shoot_name: format!("c-{n:04}") };
    let instance = Instance { instance_id: runtime.instance_id.clone(),
                              runtime_id: runtime.runtime_id.clone(),
                              global_account_id: runtime.global_account_id.clone(),
                              parameters: json!({ "plan": "azure", "region": "westeurope" }),
                              details: json!({ "shoot_name": runtime.shoot_name, "subaccount_id": runtime.subaccount_id }) };
    (runtime, instance)
}

async fn run_demo<S>(store: Arc<S>, config: &AppConfig) -> Result<(), AppError>
    where S: OperationStore + 'static
{
    let bus = Arc::new(EventBus::new());
    bus.subscribe::<StepProcessed, _>(|_ctx, ev| {
           match &ev.outcome {
               StepOutcome::Failed { error } => error!("step {} failed for {}: {error}", ev.step_name, ev.operation_id),
               outcome => info!("step {} processed for {}: {outcome:?}", ev.step_name, ev.operation_id),
           }
           Ok(())
       });

    let lifecycle = LifecycleManager::upgrade_kyma(Arc::clone(&store), config.kyma_version.clone());
    let orchestration = Orchestration::new(format!("orchestration-{}", Uuid::new_v4()),
                                           OrchestrationParameters { dry_run: false,
                                                                     notification: true,
                                                                     kyma: KymaParameters { version: "PR-1234".into() } });
    for n in 0..3 {
        let (runtime, instance) = demo_instance(n);
        let created = lifecycle.new_operation(&orchestration, &runtime, &instance, OperationState::Pending)?;
        info!("created operation {} for {}", created.id, created.runtime.runtime_id);
    }

    let resumed = lifecycle.resume_operations(&orchestration.orchestration_id)?;
    let ids: Vec<Uuid> = resumed.iter().map(|op| op.id).collect();

    let pipeline = build_pipeline(Arc::clone(&store), bus, config.polling_interval);
    let dispatcher = Dispatcher::new(Arc::new(pipeline), config.polling_interval, config.max_parallel);
    for report in dispatcher.drive_all(&ids).await {
        match &report.result {
            Ok(()) => info!("operation {} finished after {} invocation(s)", report.operation_id, report.invocations),
            Err(e) => error!("operation {} stopped: {e}", report.operation_id),
        }
    }

    for id in ids {
        let op = store.get(id).map_err(kcp_orchestration::OrchestrationError::from)?;
        info!("{} [{}] {}", op.id, op.state, op.description);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry().with(fmt::layer())
                                  .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                                  .init();

    let config = AppConfig::from_env()?;
    info!("starting demo: kyma default {}, polling {:?}", config.kyma_version, config.polling_interval);

    run_with_configured_store(&config).await
}

#[cfg(feature = "pg_demo")]
async fn run_with_configured_store(config: &AppConfig) -> Result<(), AppError> {
    match &config.database {
        Some(db) => {
            let pool = kcp_persistence::build_pool(&db.url, db.min_connections, db.max_connections)?;
            run_demo(Arc::new(kcp_persistence::PgOperationStore::from_pool(pool)), config).await
        }
        None => run_demo(Arc::new(kcp_core::InMemoryOperationStore::new()), config).await,
    }
}

#[cfg(not(feature = "pg_demo"))]
async fn run_with_configured_store(config: &AppConfig) -> Result<(), AppError> {
    run_demo(Arc::new(kcp_core::InMemoryOperationStore::new()), config).await
}
