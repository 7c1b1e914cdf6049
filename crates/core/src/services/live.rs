//! Live reduction service - folds a continuous record stream into entities.
//!
//! Records arrive interleaved across entity keys. The service expands each
//! record through the host's [`RecordMapper`], partitions the stream into
//! contiguous same-key runs, and folds every run against a freshly loaded
//! entity. `can_apply` is the reorg-safety valve: a record the ledger cannot
//! position (a duplicate delivery, a removal for a record never seen) is
//! skipped without mutating state.
//!
//! Persistence is deliberately not wrapped in a version-conflict retry on
//! this path: every record is processed against a fresh load and the host
//! is expected to partition the upstream so one key has a single logical
//! writer at a time.

use std::fmt::Debug;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, instrument, trace, warn};

use crate::error::{ReduceError, ReduceResult};
use crate::metrics::{
    RunTimer, record_applied, record_consistency_error, record_entity_updated, record_skipped,
};
use crate::models::{LogRecord, RevertableEntity};
use crate::ports::{EntityReducer, EntityService, MarkService, RecordMapper};
use crate::services::ledger::RecordLedger;
use crate::stream::{KeyedRun, window_runs};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the live reduction service.
#[derive(Debug, Clone)]
pub struct LiveReduceConfig {
    /// Capacity of each run's record buffer. When the fold-and-persist
    /// consumer falls behind, the producer suspends once this fills.
    pub run_buffer: usize,
}

impl Default for LiveReduceConfig {
    fn default() -> Self {
        Self { run_buffer: 32 }
    }
}

// =============================================================================
// LiveReduceService
// =============================================================================

/// Reduces an unbounded stream of log records into persisted entities.
///
/// # Flow
///
/// 1. Expand each record through the record mapper
/// 2. Partition into contiguous same-key runs
/// 3. Per run: load the entity (or its template), rebuild its ledger,
///    fold each applicable record, skip the rest
/// 4. Persist when the fold changed the entity, with the ledger's
///    still-revertible records attached
pub struct LiveReduceService<K, M, R, E> {
    config: LiveReduceConfig,
    marks: Arc<dyn MarkService<R, M>>,
    mapper: Arc<dyn RecordMapper<R>>,
    entities: Arc<dyn EntityService<K, R, E>>,
    reducer: Arc<dyn EntityReducer<R, E>>,
}

impl<K, M, R, E> LiveReduceService<K, M, R, E>
where
    K: PartialEq + Clone + Debug + Send + Sync + 'static,
    M: Ord + Clone + Debug + Send + Sync + 'static,
    R: LogRecord,
    E: RevertableEntity<K, R>,
{
    pub fn new(
        config: LiveReduceConfig,
        marks: Arc<dyn MarkService<R, M>>,
        mapper: Arc<dyn RecordMapper<R>>,
        entities: Arc<dyn EntityService<K, R, E>>,
        reducer: Arc<dyn EntityReducer<R, E>>,
    ) -> Self {
        Self {
            config,
            marks,
            mapper,
            entities,
            reducer,
        }
    }

    /// Reduce a record stream into a stream of persisted entities.
    ///
    /// Emits one item per successfully persisted change; runs that leave an
    /// entity unchanged emit nothing. A consistency error abandons the
    /// current run only: it is emitted as an `Err` item and processing
    /// continues with the next run.
    ///
    /// Same-key records are applied strictly in delivery order. Callers
    /// wanting cross-key parallelism partition the upstream and run one
    /// service per partition.
    pub fn reduce<S>(&self, records: S) -> impl Stream<Item = ReduceResult<E>> + '_
    where
        S: Stream<Item = R> + Send + 'static,
    {
        let mapper = self.mapper.clone();
        let expanded = records
            .then(move |record| {
                let mapper = mapper.clone();
                async move { futures::stream::iter(mapper.map(record).await) }
            })
            .flatten();

        let entities = self.entities.clone();
        let runs = window_runs(expanded, self.config.run_buffer, move |record| {
            entities.entity_id(record)
        });

        runs.filter_map(move |run| self.process_run(run))
    }

    async fn process_run(&self, run: KeyedRun<K, R>) -> Option<ReduceResult<E>> {
        let key = run.key.clone();
        match self.reduce_run(run).await {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => None,
            Err(error) => {
                if matches!(error, ReduceError::Consistency(_)) {
                    record_consistency_error("live");
                }
                warn!(key = ?key, error = %error, "Run abandoned");
                Some(Err(error))
            }
        }
    }

    /// Fold one contiguous same-key run.
    ///
    /// Returns the persisted entity, or `None` when the run left it
    /// unchanged.
    #[instrument(skip_all, fields(key = ?run.key))]
    async fn reduce_run(&self, mut run: KeyedRun<K, R>) -> ReduceResult<Option<E>> {
        let _timer = RunTimer::new();
        let key = run.key;

        let current = match self.entities.get(&key).await? {
            Some(entity) => entity,
            None => self.entities.template(&key),
        };
        let mut ledger = RecordLedger::new(current.records().to_vec(), self.marks.clone());
        let mut updated = current.clone();

        while let Some(record) = run.records.next().await {
            if ledger.can_apply(&record)? {
                updated = self.reducer.reduce(updated, &record).await?;
                ledger.apply(record)?;
                record_applied();
            } else {
                let reason = match record.status() {
                    Some(status) if status.is_additive() => "duplicate",
                    _ => "unmatched",
                };
                trace!(record = ?record, reason, "Record skipped");
                record_skipped(reason);
            }
        }

        if updated == current {
            trace!("Entity unchanged");
            return Ok(None);
        }

        let persisted = self
            .entities
            .update(updated.with_records(ledger.retained()))
            .await?;
        record_entity_updated();
        debug!("Entity updated");
        Ok(Some(persisted))
    }
}
