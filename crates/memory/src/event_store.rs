//! In-memory event history.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use futures::stream;
use parking_lot::RwLock;

use reprise_core::error::StorageResult;
use reprise_core::models::ReduceEvent;
use reprise_core::ports::{EventRepository, EventStream};

/// In-memory implementation of [`EventRepository`].
///
/// Keeps each key's history sorted ascending by mark, the order replay
/// expects.
pub struct MemoryEventStore<K, Ev> {
    events: RwLock<HashMap<K, Vec<Ev>>>,
}

impl<K, Ev> MemoryEventStore<K, Ev>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Append events to a key's history.
    pub fn append<M>(&self, key: K, batch: impl IntoIterator<Item = Ev>)
    where
        M: Ord,
        Ev: ReduceEvent<M>,
    {
        let mut events = self.events.write();
        let history = events.entry(key).or_default();
        history.extend(batch);
        history.sort_by(|a, b| a.mark().cmp(&b.mark()));
    }

    /// Number of events recorded for a key.
    pub fn len(&self, key: &K) -> usize {
        self.events.read().get(key).map_or(0, Vec::len)
    }
}

impl<K, Ev> Default for MemoryEventStore<K, Ev>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, M, Ev> EventRepository<K, M, Ev> for MemoryEventStore<K, Ev>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    M: Ord + Clone + Send + Sync + 'static,
    Ev: ReduceEvent<M>,
{
    async fn events_after(&self, key: &K, after: Option<&M>) -> StorageResult<EventStream<Ev>> {
        let matching: Vec<Ev> = self
            .events
            .read()
            .get(key)
            .map(|history| {
                history
                    .iter()
                    .filter(|event| after.is_none_or(|mark| event.mark() > *mark))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(matching.into_iter().map(Ok))))
    }
}
