//! End-to-end coverage of the batch reduction path against the in-memory
//! entity store.

mod support;

use std::sync::Arc;

use reprise_core::services::BatchReduceService;
use reprise_memory::MemoryEntityStore;

use support::{Balance, BalanceIdentity, BalanceRecord, BalanceReducer};

type Store = MemoryEntityStore<String, BalanceRecord, Balance>;
type Service = BatchReduceService<String, BalanceRecord, Balance>;

fn service(store: Arc<Store>) -> Service {
    BatchReduceService::new(store, Arc::new(BalanceReducer))
}

#[tokio::test]
async fn test_groups_by_id_in_first_seen_order() {
    let store = Arc::new(MemoryEntityStore::new(Arc::new(BalanceIdentity)));
    let service = service(store.clone());

    let updated = service
        .reduce_all(vec![
            BalanceRecord::confirmed("alice", 1, 1),
            BalanceRecord::confirmed("bob", 1, 5),
            BalanceRecord::confirmed("alice", 2, 2),
        ])
        .await
        .unwrap();

    // One persisted entity per id, ids in first-seen order, non-adjacent
    // records of one id folded together.
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].account, "alice");
    assert_eq!(updated[0].value, 3);
    assert_eq!(updated[1].account, "bob");
    assert_eq!(updated[1].value, 5);

    assert_eq!(store.stored(&"alice".to_string()).unwrap().value, 3);
    assert_eq!(store.stored(&"bob".to_string()).unwrap().value, 5);
}

// Test critique: le lot relit et rejoue l'unité complète après un conflit
#[tokio::test]
async fn test_version_conflict_replays_unit_until_success() {
    let store = Arc::new(MemoryEntityStore::with_conflicts(
        Arc::new(BalanceIdentity),
        1,
    ));
    let service = service(store.clone());

    let updated = service
        .reduce_all(vec![BalanceRecord::confirmed("alice", 1, 4)])
        .await
        .unwrap();

    assert_eq!(updated[0].value, 4);
    assert_eq!(store.update_attempts(&"alice".to_string()), 2);
    assert_eq!(store.stored(&"alice".to_string()).unwrap().value, 4);
}

#[tokio::test]
async fn test_template_seeds_unknown_entities() {
    let store = Arc::new(MemoryEntityStore::new(Arc::new(BalanceIdentity)));
    let service = service(store.clone());

    let updated = service
        .reduce_all(vec![BalanceRecord::confirmed("carol", 8, 12)])
        .await
        .unwrap();

    // Fresh id: folded on top of the template, not an error.
    assert_eq!(updated[0].account, "carol");
    assert_eq!(updated[0].value, 12);
    assert_eq!(updated[0].history.len(), 1);
}
