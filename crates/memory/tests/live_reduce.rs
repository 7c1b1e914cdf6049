//! End-to-end coverage of the live reduction path against the in-memory
//! stores.

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};

use reprise_core::models::ChainMark;
use reprise_core::ports::{EntityService, IdentityRecordMapper, RecordMapper};
use reprise_core::services::{LiveReduceConfig, LiveReduceService};
use reprise_memory::MemoryEntityStore;

use support::{Balance, BalanceIdentity, BalanceRecord, BalanceReducer, ConfirmationMarks};

type Store = MemoryEntityStore<String, BalanceRecord, Balance>;
type Service = LiveReduceService<String, ChainMark, BalanceRecord, Balance>;

fn store() -> Arc<Store> {
    Arc::new(MemoryEntityStore::new(Arc::new(BalanceIdentity)))
}

fn service(store: Arc<Store>, stable_below: u64) -> Service {
    LiveReduceService::new(
        LiveReduceConfig::default(),
        Arc::new(ConfirmationMarks { stable_below }),
        Arc::new(IdentityRecordMapper),
        store,
        Arc::new(BalanceReducer),
    )
}

async fn run(service: &Service, records: Vec<BalanceRecord>) -> Vec<Result<Balance, String>> {
    service
        .reduce(stream::iter(records))
        .map(|result| result.map_err(|error| error.to_string()))
        .collect()
        .await
}

// Out-of-order delivery: a record with an older mark than the retained head
// lands behind it in the ledger, and the fold still runs in arrival order.
#[tokio::test]
async fn test_out_of_order_arrival_positions_by_mark() {
    let store = store();
    let seeded = Balance {
        account: "alice".into(),
        value: 10,
        history: vec![ChainMark::new(3, 0)],
        records: vec![BalanceRecord::confirmed("alice", 3, 10)],
    };
    store.update(seeded).await.unwrap();

    let service = service(store.clone(), 0);
    let results = run(&service, vec![BalanceRecord::confirmed("alice", 2, 5)]).await;

    assert_eq!(results.len(), 1);
    let persisted = results[0].as_ref().unwrap();
    assert_eq!(persisted.value, 15);
    assert_eq!(
        persisted.history,
        vec![ChainMark::new(3, 0), ChainMark::new(2, 0)]
    );

    // Ledger is ordered by mark descending, not by arrival.
    let heights: Vec<u64> = persisted.records.iter().map(|r| r.mark.height).collect();
    assert_eq!(heights, vec![3, 2]);
}

// Test critique: un revert dans le même run annule exactement le record,
// l'entité reste inchangée et rien n'est persisté
#[tokio::test]
async fn test_revert_within_run_leaves_entity_untouched() {
    let store = store();
    let service = service(store.clone(), 0);

    let results = run(
        &service,
        vec![
            BalanceRecord::confirmed("alice", 5, 7),
            BalanceRecord::reverted("alice", 5, 7),
        ],
    )
    .await;

    // Add then exact revert folds back to the template: nothing to persist.
    assert!(results.is_empty());
    assert!(store.stored(&"alice".to_string()).is_none());
}

#[tokio::test]
async fn test_revert_across_runs_restores_prior_state() {
    let store = store();
    let service = service(store.clone(), 0);

    let first = run(&service, vec![BalanceRecord::confirmed("bob", 5, 7)]).await;
    assert_eq!(first[0].as_ref().unwrap().value, 7);

    let second = run(&service, vec![BalanceRecord::reverted("bob", 5, 7)]).await;
    let restored = second[0].as_ref().unwrap();

    assert_eq!(restored.value, 0);
    assert!(restored.history.is_empty());
    assert!(restored.records.is_empty());
}

#[tokio::test]
async fn test_stale_deliveries_are_skipped_without_error() {
    let store = store();
    let seeded = Balance {
        account: "alice".into(),
        value: 10,
        history: vec![ChainMark::new(3, 0)],
        records: vec![BalanceRecord::confirmed("alice", 3, 10)],
    };
    store.update(seeded.clone()).await.unwrap();

    let service = service(store.clone(), 0);
    let results = run(
        &service,
        vec![
            // Duplicate of an already-applied mark
            BalanceRecord::confirmed("alice", 3, 10),
            // Revert of a record never observed
            BalanceRecord::reverted("alice", 7, 2),
        ],
    )
    .await;

    assert!(results.is_empty());
    assert_eq!(store.stored(&"alice".to_string()).unwrap(), seeded);
}

#[tokio::test]
async fn test_contiguous_runs_and_reappearing_keys() {
    let store = store();
    let service = service(store.clone(), 0);

    let results = run(
        &service,
        vec![
            BalanceRecord::confirmed("alice", 1, 1),
            BalanceRecord::confirmed("alice", 2, 2),
            BalanceRecord::confirmed("bob", 1, 5),
            // alice again, after bob: an independent run
            BalanceRecord::confirmed("alice", 3, 3),
        ],
    )
    .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().value, 3);
    assert_eq!(results[0].as_ref().unwrap().account, "alice");
    assert_eq!(results[1].as_ref().unwrap().value, 5);
    assert_eq!(results[1].as_ref().unwrap().account, "bob");
    // The second alice run loaded the first run's persisted state.
    assert_eq!(results[2].as_ref().unwrap().value, 6);

    assert_eq!(store.stored(&"alice".to_string()).unwrap().value, 6);
    assert_eq!(store.stored(&"bob".to_string()).unwrap().value, 5);
}

// Test critique: une erreur de cohérence abandonne le run courant, pas le
// stream
#[tokio::test]
async fn test_malformed_record_fails_run_but_not_stream() {
    let store = store();
    let service = service(store.clone(), 0);

    let results = run(
        &service,
        vec![
            BalanceRecord::malformed("alice", 9),
            BalanceRecord::confirmed("bob", 1, 5),
        ],
    )
    .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap_err().contains("no resolvable status"));
    assert_eq!(results[1].as_ref().unwrap().value, 5);
}

#[tokio::test]
async fn test_record_mapper_expansion_filters_records() {
    struct SkipZeroMapper;

    #[async_trait]
    impl RecordMapper<BalanceRecord> for SkipZeroMapper {
        async fn map(&self, record: BalanceRecord) -> Vec<BalanceRecord> {
            if record.delta == 0 {
                Vec::new()
            } else {
                vec![record]
            }
        }
    }

    let store = store();
    let service = LiveReduceService::new(
        LiveReduceConfig::default(),
        Arc::new(ConfirmationMarks { stable_below: 0 }),
        Arc::new(SkipZeroMapper),
        store.clone(),
        Arc::new(BalanceReducer),
    );

    let results: Vec<_> = service
        .reduce(stream::iter(vec![
            BalanceRecord::confirmed("alice", 1, 0),
            BalanceRecord::confirmed("bob", 1, 5),
        ]))
        .collect()
        .await;

    // The zero-delta record expanded to nothing: no run, no emission.
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap().account, "bob");
    assert!(store.stored(&"alice".to_string()).is_none());
}

// Stable marks stay folded into the value but leave the persisted ledger.
#[tokio::test]
async fn test_stable_records_pruned_from_persisted_ledger() {
    let store = store();
    let service = service(store.clone(), 4);

    let results = run(
        &service,
        vec![
            BalanceRecord::confirmed("alice", 3, 10),
            BalanceRecord::confirmed("alice", 5, 1),
        ],
    )
    .await;

    let persisted = results[0].as_ref().unwrap();
    assert_eq!(persisted.value, 11);

    let heights: Vec<u64> = persisted.records.iter().map(|r| r.mark.height).collect();
    assert_eq!(heights, vec![5]);
}

#[tokio::test]
async fn test_same_stream_reduces_deterministically() {
    let input = vec![
        BalanceRecord::confirmed("alice", 1, 4),
        BalanceRecord::confirmed("alice", 3, 2),
        BalanceRecord::confirmed("alice", 2, 1),
        BalanceRecord::reverted("alice", 3, 2),
        BalanceRecord::confirmed("alice", 4, 8),
    ];

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let store = store();
        let service = service(store.clone(), 0);
        run(&service, input.clone()).await;
        outcomes.push(store.stored(&"alice".to_string()).unwrap());
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0].value, 13);
    let heights: Vec<u64> = outcomes[0].records.iter().map(|r| r.mark.height).collect();
    assert_eq!(heights, vec![4, 2, 1]);
}
