//! Batch reduction service - applies a finite record batch under optimistic
//! locking.
//!
//! Unlike the live path, the batch path groups records globally by entity id
//! and defends each entity's read-modify-write with the optimistic-retry
//! wrapper, so concurrent writers on one id are safe. Suited to replays and
//! catch-up jobs where a batch of already-classified records is applied in
//! one pass.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{ReduceError, ReduceResult};
use crate::metrics::record_entity_updated;
use crate::ports::{EntityReducer, EntityService};
use crate::services::retry::optimistic_retry;

/// Reduces a finite batch of records, one optimistic unit of work per
/// entity.
pub struct BatchReduceService<K, R, E> {
    entities: Arc<dyn EntityService<K, R, E>>,
    reducer: Arc<dyn EntityReducer<R, E>>,
}

impl<K, R, E> BatchReduceService<K, R, E>
where
    K: PartialEq + Clone + Debug + Send + Sync + 'static,
    R: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(
        entities: Arc<dyn EntityService<K, R, E>>,
        reducer: Arc<dyn EntityReducer<R, E>>,
    ) -> Self {
        Self { entities, reducer }
    }

    /// Group the batch by entity id and reduce each group.
    ///
    /// Groups are processed in first-seen order; records within a group keep
    /// their batch order. Returns the persisted entity of every group.
    #[instrument(skip_all, fields(batch = records.len()))]
    pub async fn reduce_all(&self, records: Vec<R>) -> ReduceResult<Vec<E>> {
        let mut groups: Vec<(K, Vec<R>)> = Vec::new();
        for record in records {
            let id = self.entities.entity_id(&record);
            match groups.iter_mut().find(|(key, _)| *key == id) {
                Some((_, group)) => group.push(record),
                None => groups.push((id, vec![record])),
            }
        }

        let mut updated = Vec::with_capacity(groups.len());
        for (id, group) in &groups {
            updated.push(self.reduce_group(id, group).await?);
        }
        Ok(updated)
    }

    /// Load-or-template, fold, persist - re-executed from a fresh read on
    /// version conflict.
    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn reduce_group(&self, id: &K, records: &[R]) -> ReduceResult<E> {
        let entity = optimistic_retry(
            || async {
                let entity = match self.entities.get(id).await? {
                    Some(entity) => entity,
                    None => self.entities.template(id),
                };

                let mut folded = entity;
                for record in records {
                    folded = self.reducer.reduce(folded, record).await?;
                }

                Ok::<E, ReduceError>(self.entities.update(folded).await?)
            },
            ReduceError::is_version_conflict,
        )
        .await?;

        record_entity_updated();
        debug!("Entity updated");
        Ok(entity)
    }
}
