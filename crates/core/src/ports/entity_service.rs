//! Port traits for entity access and record expansion.
//!
//! These traits define the interface between the live reduction path and
//! the host application. Implementations live in adapter crates (e.g.,
//! `reprise-memory`).

use async_trait::async_trait;

use crate::error::StorageResult;

/// Access to persisted entities, keyed by the host's entity id type.
#[async_trait]
pub trait EntityService<K, R, E>: Send + Sync {
    /// Load an entity by id.
    async fn get(&self, id: &K) -> StorageResult<Option<E>>;

    /// Persist an entity, replacing any stored value.
    async fn update(&self, entity: E) -> StorageResult<E>;

    /// A blank entity for an id that has never been persisted.
    fn template(&self, id: &K) -> E;

    /// The id of the entity a record belongs to.
    fn entity_id(&self, record: &R) -> K;
}

/// Record-expansion hook applied before run grouping.
///
/// Maps each incoming record into zero or more derived records. Most hosts
/// use [`IdentityRecordMapper`]; a mapper is useful when one upstream record
/// fans out into several entity-level changes.
#[async_trait]
pub trait RecordMapper<R>: Send + Sync {
    async fn map(&self, record: R) -> Vec<R>;
}

/// Mapper that passes every record through unchanged.
pub struct IdentityRecordMapper;

#[async_trait]
impl<R: Send + 'static> RecordMapper<R> for IdentityRecordMapper {
    async fn map(&self, record: R) -> Vec<R> {
        vec![record]
    }
}
