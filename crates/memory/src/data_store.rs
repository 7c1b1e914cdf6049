//! In-memory reduced-data store with simulated version conflicts.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use parking_lot::RwLock;

use reprise_core::error::{StorageError, StorageResult};
use reprise_core::ports::DataRepository;

/// Contract for data values that know their own key.
pub trait KeyedData<K>: Clone + Send + Sync + 'static {
    fn data_key(&self) -> K;
}

/// In-memory implementation of [`DataRepository`].
///
/// Tracks a monotonic version per key. [`with_conflicts`] makes each key's
/// first saves fail with [`StorageError::VersionConflict`], simulating
/// writers racing on the same key so tests can drive the optimistic-retry
/// path to completion.
///
/// [`with_conflicts`]: Self::with_conflicts
pub struct MemoryDataStore<K, D> {
    data: RwLock<HashMap<K, (u64, D)>>,
    attempts: RwLock<HashMap<K, usize>>,
    conflicts_per_key: usize,
}

impl<K, D> MemoryDataStore<K, D>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    D: KeyedData<K>,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
            conflicts_per_key: 0,
        }
    }

    /// Fail each key's first `conflicts` saves with a version conflict.
    pub fn with_conflicts(conflicts: usize) -> Self {
        Self {
            conflicts_per_key: conflicts,
            ..Self::new()
        }
    }

    /// How many saves were attempted for a key, conflicted ones included.
    pub fn save_attempts(&self, key: &K) -> usize {
        self.attempts.read().get(key).copied().unwrap_or(0)
    }

    /// The stored version for a key, bumped on every successful save.
    pub fn version_of(&self, key: &K) -> Option<u64> {
        self.data.read().get(key).map(|(version, _)| *version)
    }
}

impl<K, D> Default for MemoryDataStore<K, D>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    D: KeyedData<K>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, D> DataRepository<K, D> for MemoryDataStore<K, D>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    D: KeyedData<K>,
{
    async fn get(&self, key: &K) -> StorageResult<Option<D>> {
        Ok(self.data.read().get(key).map(|(_, data)| data.clone()))
    }

    async fn save(&self, data: D) -> StorageResult<D> {
        let key = data.data_key();

        let attempt = {
            let mut attempts = self.attempts.write();
            let counter = attempts.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt <= self.conflicts_per_key {
            return Err(StorageError::VersionConflict(format!("{key:?}")));
        }

        let mut stored = self.data.write();
        let version = stored.get(&key).map_or(1, |(version, _)| version + 1);
        stored.insert(key, (version, data.clone()));
        Ok(data)
    }
}
