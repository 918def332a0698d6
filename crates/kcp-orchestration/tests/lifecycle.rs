use std::sync::Arc;

use chrono::{Duration, Utc};
use kcp_core::constants::{DESCRIPTION_CANCELED, DESCRIPTION_CREATED, DESCRIPTION_RETRY_TRIGGERED};
use kcp_core::{Instance, KymaParameters, NotificationState, Operation, OperationState, OperationStore, OperationType,
               Orchestration, OrchestrationParameters, Runtime, StoreError, VersionOrigin};
use kcp_core::InMemoryOperationStore;
use kcp_orchestration::{LifecycleManager, OperationFactory, OrchestrationError, VersionError};
use serde_json::json;
use uuid::Uuid;

const ORCHESTRATION: &str = "orch-1";

fn manager() -> (Arc<InMemoryOperationStore>, LifecycleManager<Arc<InMemoryOperationStore>>) {
    let store = Arc::new(InMemoryOperationStore::new());
    (store.clone(), LifecycleManager::upgrade_kyma(store, "2.4.1"))
}

/// Inserta una operación de upgrade de Kyma con `created_at` escalonado.
fn seed(store: &InMemoryOperationStore, runtime_id: &str, state: OperationState, offset_secs: i64) -> Operation {
    let mut op = Operation::new(OperationType::UpgradeKyma, format!("inst-{runtime_id}"), state);
    op.orchestration_id = Some(ORCHESTRATION.to_string());
    op.runtime_id = runtime_id.to_string();
    op.runtime.runtime_id = runtime_id.to_string();
    op.provisioner_operation_id = format!("prov-{runtime_id}");
    op.created_at = Utc::now() + Duration::seconds(offset_secs);
    store.insert(op).unwrap()
}

fn orchestration(version: &str) -> Orchestration {
    Orchestration::new(ORCHESTRATION,
                       OrchestrationParameters { dry_run: true,
                                                 notification: true,
                                                 kyma: KymaParameters { version: version.to_string() } })
}

fn runtime(id: &str) -> Runtime {
    Runtime { instance_id: format!("inst-{id}"),
              runtime_id: id.to_string(),
              global_account_id: "ga".into(),
              subaccount_id: "sa".into(),
              shoot_name: format!("shoot-{id}") }
}

fn instance(id: &str, details: serde_json::Value) -> Instance {
    Instance { instance_id: format!("inst-{id}"),
               runtime_id: id.to_string(),
               global_account_id: "ga".into(),
               parameters: json!({"plan": "azure"}),
               details }
}

#[test]
fn resume_orders_in_progress_then_retrying_then_pending() {
    let (store, mgr) = manager();
    let retrying = seed(&store, "r-retry", OperationState::Retrying, 0);
    let pending = seed(&store, "r-pending", OperationState::Pending, 1);
    let in_progress = seed(&store, "r-progress", OperationState::InProgress, 2);
    seed(&store, "r-done", OperationState::Succeeded, 3);

    let resumed = mgr.resume_operations(ORCHESTRATION).unwrap();

    let ids: Vec<Uuid> = resumed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![in_progress.id, retrying.id, pending.id]);

    let rearmed = store.get(retrying.id).unwrap();
    assert_eq!(rearmed.state, OperationState::Pending);
    assert_eq!(rearmed.provisioner_operation_id, "");
    assert_eq!(rearmed.description, DESCRIPTION_RETRY_TRIGGERED);
    assert!(rearmed.updated_at >= retrying.updated_at);
    // las demás no se tocan
    assert_eq!(store.get(pending.id).unwrap().version, pending.version);
    assert_eq!(store.get(in_progress.id).unwrap().version, in_progress.version);
}

#[test]
fn resume_ignores_other_operation_types() {
    let store = Arc::new(InMemoryOperationStore::new());
    seed(&store, "r1", OperationState::Pending, 0);
    let cluster_mgr = LifecycleManager::upgrade_cluster(store.clone(), "2.4.1");
    assert!(cluster_mgr.resume_operations(ORCHESTRATION).unwrap().is_empty());
}

#[test]
fn cancel_operation_only_touches_pending_of_that_runtime() {
    let (store, mgr) = manager();
    let target = seed(&store, "r1", OperationState::Pending, 0);
    let other_runtime = seed(&store, "r2", OperationState::Pending, 1);
    let in_progress = seed(&store, "r1", OperationState::InProgress, 2);

    mgr.cancel_operation(ORCHESTRATION, "r1").unwrap();

    let canceled = store.get(target.id).unwrap();
    assert_eq!(canceled.state, OperationState::Canceled);
    assert_eq!(canceled.description, DESCRIPTION_CANCELED);
    assert_eq!(store.get(other_runtime.id).unwrap().state, OperationState::Pending);
    assert_eq!(store.get(in_progress.id).unwrap().state, OperationState::InProgress);
}

#[test]
fn cancel_operations_cancels_every_pending() {
    let (store, mgr) = manager();
    let a = seed(&store, "r1", OperationState::Pending, 0);
    let b = seed(&store, "r2", OperationState::Pending, 1);
    let c = seed(&store, "r3", OperationState::Retrying, 2);

    mgr.cancel_operations(ORCHESTRATION).unwrap();

    assert_eq!(store.get(a.id).unwrap().state, OperationState::Canceled);
    assert_eq!(store.get(b.id).unwrap().state, OperationState::Canceled);
    assert_eq!(store.get(c.id).unwrap().state, OperationState::Retrying);
    assert!(mgr.query_operations(ORCHESTRATION).unwrap().is_empty());
}

#[test]
fn retry_operations_reports_missing_ids_without_aborting() {
    let (store, mgr) = manager();
    let a = seed(&store, "r1", OperationState::Failed, 0);
    let missing = Uuid::new_v4();
    let b = seed(&store, "r2", OperationState::Failed, 1);

    let outcome = mgr.retry_operations(&[a.id, missing, b.id]);

    assert_eq!(outcome.operations.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].operation_id, missing);
    assert_eq!(outcome.failures[0].error, StoreError::NotFound(missing));
    assert!(!outcome.is_complete());
}

#[test]
fn query_operation_finds_pending_by_runtime() {
    let (store, mgr) = manager();
    let pending = seed(&store, "r1", OperationState::Pending, 0);
    seed(&store, "r2", OperationState::InProgress, 1);

    let found = mgr.query_operation(ORCHESTRATION, &runtime("r1")).unwrap();
    assert_eq!(found.map(|r| r.id), Some(pending.id));
    assert!(mgr.query_operation(ORCHESTRATION, &runtime("r2")).unwrap().is_none());
    assert_eq!(mgr.query_operations(ORCHESTRATION).unwrap().len(), 1);
}

#[test]
fn notify_operation_sets_state_for_matching_runtime_and_state() {
    let (store, mgr) = manager();
    let pending = seed(&store, "r1", OperationState::Pending, 0);
    let in_progress = seed(&store, "r1", OperationState::InProgress, 1);

    mgr.notify_operation(ORCHESTRATION, "r1", OperationState::Pending, NotificationState::Created)
       .unwrap();

    assert_eq!(store.get(pending.id).unwrap().notification_state, NotificationState::Created);
    assert_eq!(store.get(in_progress.id).unwrap().notification_state, NotificationState::Pending);

    // sobrescribible de forma idempotente
    mgr.notify_operation(ORCHESTRATION, "r1", OperationState::Pending, NotificationState::Cancelled)
       .unwrap();
    assert_eq!(store.get(pending.id).unwrap().notification_state, NotificationState::Cancelled);
}

#[test]
fn new_operation_copies_orchestration_parameters_and_resolves_version() {
    let (store, mgr) = manager();

    let ro = mgr.new_operation(&orchestration("PR-1234"),
                               &runtime("r1"),
                               &instance("r1", json!({"runtime_id": "r1", "shoot_name": "shoot-r1"})),
                               OperationState::Pending)
                .unwrap();

    assert!(ro.dry_run);
    assert!(ro.notification);
    assert_eq!(ro.runtime.runtime_id, "r1");
    let op = store.get(ro.id).unwrap();
    assert_eq!(op.state, OperationState::Pending);
    assert_eq!(op.version, 0);
    assert_eq!(op.description, DESCRIPTION_CREATED);
    assert_eq!(op.orchestration_id.as_deref(), Some(ORCHESTRATION));
    assert_eq!(op.operation_type, OperationType::UpgradeKyma);
    assert_eq!(op.instance_details.shoot_name, "shoot-r1");
    assert_eq!(op.provisioning_parameters, json!({"plan": "azure"}));
    let version = op.runtime_version.expect("runtime version");
    assert_eq!(version.version, "PR-1234");
    assert_eq!(version.major_version, 2);
    assert_eq!(version.origin, VersionOrigin::Parameters);
}

#[test]
fn new_operation_without_requested_version_keeps_none() {
    let (store, mgr) = manager();
    let ro = mgr.new_operation(&orchestration(""), &runtime("r1"), &instance("r1", serde_json::Value::Null),
                               OperationState::Pending)
                .unwrap();
    let op = store.get(ro.id).unwrap();
    assert!(op.runtime_version.is_none());
    assert_eq!(op.runtime_id, "r1");
}

#[test]
fn new_operation_fails_on_unparseable_version() {
    let (store, mgr) = manager();
    let err = mgr.new_operation(&orchestration("abc.1.2"),
                                &runtime("r1"),
                                &instance("r1", serde_json::Value::Null),
                                OperationState::Pending)
                 .unwrap_err();
    assert!(matches!(err, OrchestrationError::Version(VersionError::InvalidMajor(_))));
    assert!(store.is_empty());
}

#[test]
fn new_operation_fails_when_instance_details_are_unreadable() {
    let (store, mgr) = manager();
    let err = mgr.new_operation(&orchestration("1.24.3"),
                                &runtime("r1"),
                                &instance("r1", json!(42)),
                                OperationState::Pending)
                 .unwrap_err();
    assert!(matches!(err, OrchestrationError::InstanceDetails(_)));
    assert!(store.is_empty());
}
