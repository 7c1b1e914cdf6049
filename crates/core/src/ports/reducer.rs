//! Port traits for the host-supplied fold functions.
//!
//! Reducers must be pure functions of their inputs: the engine re-executes
//! them freely (optimistic retry, replay from snapshot) and relies on
//! identical inputs producing identical outputs.

use async_trait::async_trait;

use crate::error::ReduceResult;
use crate::models::ReduceSnapshot;

/// Fold function for the live path: one record into one entity.
#[async_trait]
pub trait EntityReducer<R, E>: Send + Sync {
    /// Fold a single record into the entity, returning the updated entity.
    async fn reduce(&self, entity: E, record: &R) -> ReduceResult<E>;
}

/// Fold function for the snapshot path: a window of events into a data
/// value, annotated with the mark the fold ran through.
#[async_trait]
pub trait SnapshotReducer<K, M, Ev, D>: Send + Sync {
    /// The data key a stream of events reduces into.
    fn data_key(&self, event: &Ev) -> K;

    /// The initial data value for a key with no snapshot.
    fn initial_data(&self, key: &K) -> D;

    /// Fold an ordered window of events into the running data value.
    ///
    /// The returned snapshot's mark must be the mark of the last event in
    /// the window.
    async fn reduce_window(&self, data: D, window: &[Ev]) -> ReduceResult<ReduceSnapshot<M, D>>;
}
