//! In-memory checkpoint snapshot store.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use parking_lot::RwLock;

use reprise_core::error::StorageResult;
use reprise_core::models::ReduceSnapshot;
use reprise_core::ports::SnapshotRepository;

/// In-memory implementation of [`SnapshotRepository`].
///
/// Keeps only the latest snapshot per key; saving replaces the previous
/// checkpoint.
pub struct MemorySnapshotStore<K, M, D> {
    snapshots: RwLock<HashMap<K, ReduceSnapshot<M, D>>>,
}

impl<K, M, D> MemorySnapshotStore<K, M, D>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a snapshot directly, bypassing the engine.
    pub fn seed(&self, key: K, snapshot: ReduceSnapshot<M, D>) {
        self.snapshots.write().insert(key, snapshot);
    }

    /// Number of keys with a stored checkpoint.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }
}

impl<K, M, D> Default for MemorySnapshotStore<K, M, D>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, M, D> SnapshotRepository<K, M, D> for MemorySnapshotStore<K, M, D>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    async fn latest(&self, key: &K) -> StorageResult<Option<ReduceSnapshot<M, D>>> {
        Ok(self.snapshots.read().get(key).cloned())
    }

    async fn save(&self, key: &K, snapshot: &ReduceSnapshot<M, D>) -> StorageResult<()> {
        self.snapshots
            .write()
            .insert(key.clone(), snapshot.clone());
        Ok(())
    }
}
