mod test_support;

use kcp_core::{Operation, OperationFilter, OperationState, OperationStore, OperationType, StoreError};
use kcp_persistence::PgOperationStore;
use test_support::with_pool;
use uuid::Uuid;

fn orchestration_op(orchestration_id: &str, state: OperationState) -> Operation {
    let mut op = Operation::new(OperationType::UpgradeKyma, format!("inst-{}", Uuid::new_v4()), state);
    op.orchestration_id = Some(orchestration_id.to_string());
    op
}

#[test]
fn insert_then_get_returns_the_operation() {
    let ran = with_pool(|pool| {
        let store = PgOperationStore::from_pool(pool.clone());
        let mut op = orchestration_op("orch-get", OperationState::Pending);
        op.dry_run = true;
        op.description = "Operation created".into();
        store.insert(op.clone()).expect("insert");

        let loaded = store.get(op.id).expect("get");
        assert_eq!(loaded.instance_id, op.instance_id);
        assert_eq!(loaded.state, OperationState::Pending);
        assert_eq!(loaded.version, 0);
        assert!(loaded.dry_run);
        assert_eq!(loaded.description, "Operation created");
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn duplicate_insert_is_rejected() {
    let ran = with_pool(|pool| {
        let store = PgOperationStore::from_pool(pool.clone());
        let op = orchestration_op("orch-dup", OperationState::Pending);
        store.insert(op.clone()).expect("insert");
        assert_eq!(store.insert(op.clone()), Err(StoreError::AlreadyExists(op.id)));
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn missing_operation_is_not_found() {
    let ran = with_pool(|pool| {
        let store = PgOperationStore::from_pool(pool.clone());
        let id = Uuid::new_v4();
        assert_eq!(store.get(id), Err(StoreError::NotFound(id)));
        let ghost = Operation::new(OperationType::Provision, "ghost", OperationState::Pending);
        let ghost_id = ghost.id;
        assert_eq!(store.update(ghost), Err(StoreError::NotFound(ghost_id)));
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn stale_update_is_a_conflict() {
    let ran = with_pool(|pool| {
        let store = PgOperationStore::from_pool(pool.clone());
        let op = orchestration_op("orch-cas", OperationState::Pending);
        store.insert(op.clone()).expect("insert");

        let mut first = op.clone();
        first.state = OperationState::InProgress;
        let saved = store.update(first).expect("first update");
        assert_eq!(saved.version, 1);

        let mut stale = op.clone();
        stale.state = OperationState::Canceled;
        match store.update(stale) {
            Err(StoreError::Conflict { expected, actual, .. }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.get(op.id).unwrap().state, OperationState::InProgress);
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn list_filters_by_state_and_pages_in_creation_order() {
    let ran = with_pool(|pool| {
        let store = PgOperationStore::from_pool(pool.clone());
        let orchestration_id = format!("orch-list-{}", Uuid::new_v4());
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut op = orchestration_op(&orchestration_id, OperationState::Pending);
            op.created_at += chrono::Duration::seconds(i);
            store.insert(op.clone()).expect("insert");
            ids.push(op.id);
        }
        let done = orchestration_op(&orchestration_id, OperationState::Succeeded);
        store.insert(done).expect("insert");

        let pending = OperationFilter::with_states(&[OperationState::Pending]);
        let all = store.list_by_orchestration(&orchestration_id, &pending).unwrap();
        assert_eq!(all.total_count, 5);
        assert_eq!(all.operations.iter().map(|o| o.id).collect::<Vec<_>>(), ids);

        let second_page = store.list_by_orchestration(&orchestration_id, &pending.clone().paged(2, 2))
                               .unwrap();
        assert_eq!(second_page.count, 2);
        assert_eq!(second_page.total_count, 5);
        assert_eq!(second_page.operations[0].id, ids[2]);

        let other = store.list_by_orchestration("orch-does-not-exist", &OperationFilter::default())
                         .unwrap();
        assert_eq!(other.total_count, 0);
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}
