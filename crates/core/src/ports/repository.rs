//! Port traits for the snapshot-path repositories.
//!
//! These traits define the storage interface used by the snapshot reduction
//! path. Implementations live in adapter crates (e.g., `reprise-memory`).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::StorageResult;
use crate::models::ReduceSnapshot;

/// Ordered stream of events for one key.
pub type EventStream<Ev> = Pin<Box<dyn Stream<Item = StorageResult<Ev>> + Send>>;

/// Repository for the durable, ordered event history.
#[async_trait]
pub trait EventRepository<K, M, Ev>: Send + Sync {
    /// Stream the events for a key with marks strictly greater than `after`,
    /// in ascending mark order. `None` streams from genesis.
    ///
    /// Replay reads from this history, not from the in-memory batch, so the
    /// reconstructed state is consistent with every event ever recorded for
    /// the key.
    async fn events_after(&self, key: &K, after: Option<&M>) -> StorageResult<EventStream<Ev>>;
}

/// Repository for reduced data values, keyed by data key.
#[async_trait]
pub trait DataRepository<K, D>: Send + Sync {
    /// Load the stored data value for a key.
    async fn get(&self, key: &K) -> StorageResult<Option<D>>;

    /// Persist a reduced data value.
    ///
    /// Returns [`crate::error::StorageError::VersionConflict`] when the
    /// stored value was updated concurrently since it was read; the caller
    /// recovers by re-executing its unit of work.
    async fn save(&self, data: D) -> StorageResult<D>;
}

/// Repository for the latest checkpoint snapshot per key.
#[async_trait]
pub trait SnapshotRepository<K, M, D>: Send + Sync {
    /// Load the most recent snapshot for a key, if any.
    async fn latest(&self, key: &K) -> StorageResult<Option<ReduceSnapshot<M, D>>>;

    /// Persist a snapshot as the new latest checkpoint for a key.
    async fn save(&self, key: &K, snapshot: &ReduceSnapshot<M, D>) -> StorageResult<()>;
}
