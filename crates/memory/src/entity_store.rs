//! In-memory entity store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use reprise_core::error::{StorageError, StorageResult};
use reprise_core::models::RevertableEntity;
use reprise_core::ports::EntityService;

/// Host-side identity logic an entity store cannot know by itself: how to
/// key a record and what a never-persisted entity looks like.
pub trait EntityIdentity<K, R, E>: Send + Sync {
    /// The id of the entity a record belongs to.
    fn entity_id(&self, record: &R) -> K;

    /// A blank entity for an id.
    fn template(&self, id: &K) -> E;
}

/// In-memory implementation of [`EntityService`].
///
/// Plain last-write-wins upserts by default. [`with_conflicts`] makes the
/// first saves per key fail with a version conflict, simulating concurrent
/// writers for tests of the optimistic-retry path.
///
/// [`with_conflicts`]: Self::with_conflicts
pub struct MemoryEntityStore<K, R, E> {
    entities: RwLock<HashMap<K, E>>,
    attempts: RwLock<HashMap<K, usize>>,
    conflicts_per_key: usize,
    identity: Arc<dyn EntityIdentity<K, R, E>>,
}

impl<K, R, E> MemoryEntityStore<K, R, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    R: Send + Sync + 'static,
    E: RevertableEntity<K, R>,
{
    pub fn new(identity: Arc<dyn EntityIdentity<K, R, E>>) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
            conflicts_per_key: 0,
            identity,
        }
    }

    /// Fail each key's first `conflicts` updates with a version conflict.
    pub fn with_conflicts(identity: Arc<dyn EntityIdentity<K, R, E>>, conflicts: usize) -> Self {
        Self {
            conflicts_per_key: conflicts,
            ..Self::new(identity)
        }
    }

    /// How many updates were attempted for a key, conflicted ones included.
    pub fn update_attempts(&self, id: &K) -> usize {
        self.attempts.read().get(id).copied().unwrap_or(0)
    }

    /// Snapshot of the stored entity for a key.
    pub fn stored(&self, id: &K) -> Option<E> {
        self.entities.read().get(id).cloned()
    }
}

#[async_trait]
impl<K, R, E> EntityService<K, R, E> for MemoryEntityStore<K, R, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    R: Send + Sync + 'static,
    E: RevertableEntity<K, R>,
{
    async fn get(&self, id: &K) -> StorageResult<Option<E>> {
        Ok(self.entities.read().get(id).cloned())
    }

    async fn update(&self, entity: E) -> StorageResult<E> {
        let id = entity.id().clone();

        let attempt = {
            let mut attempts = self.attempts.write();
            let counter = attempts.entry(id.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt <= self.conflicts_per_key {
            return Err(StorageError::VersionConflict(format!("{id:?}")));
        }

        self.entities.write().insert(id, entity.clone());
        Ok(entity)
    }

    fn template(&self, id: &K) -> E {
        self.identity.template(id)
    }

    fn entity_id(&self, record: &R) -> K {
        self.identity.entity_id(record)
    }
}
