//! Snapshot reduction service - replays event history with periodic
//! checkpoints.
//!
//! Each incoming batch is grouped by data key. Per key, the service seeds
//! from the latest checkpoint snapshot (when it is safely older than the
//! batch), replays the durable event history in fixed-size windows, and
//! persists the reduced data plus, at a configured cadence, a new
//! checkpoint. Persistence runs inside the optimistic-retry wrapper because
//! concurrent batches may race on one key's stored data.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use futures::StreamExt;
use futures::future::join_all;
use tracing::{debug, instrument, trace, warn};

use crate::error::{ReduceError, ReduceResult, StorageResult};
use crate::metrics::{
    record_consistency_error, record_data_saved, record_replay_windows, record_snapshot_saved,
};
use crate::models::{ReduceEvent, ReduceSnapshot};
use crate::ports::{DataRepository, EventRepository, SnapshotReducer, SnapshotRepository};
use crate::services::retry::optimistic_retry;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the snapshot reduction service.
#[derive(Debug, Clone)]
pub struct SnapshotReduceConfig {
    /// Number of events folded per replay window. A checkpoint candidate is
    /// produced after every full window; a trailing partial window folds
    /// into the data without one.
    pub min_events_before_snapshot: usize,
    /// Minimum number of checkpoint candidates produced in one run before
    /// the most recent one is persisted.
    ///
    /// This is a policy knob, not an invariant: it trades checkpoint-write
    /// frequency against replay-window cost. Persisting after every window
    /// would be wasteful when windows are small.
    pub snapshot_persist_threshold: usize,
    /// Maximum number of checkpoint candidates kept in memory per run.
    pub snapshot_stack_capacity: usize,
}

impl Default for SnapshotReduceConfig {
    fn default() -> Self {
        Self {
            min_events_before_snapshot: 100,
            snapshot_persist_threshold: 3,
            snapshot_stack_capacity: 16,
        }
    }
}

// =============================================================================
// SnapshotReduceService
// =============================================================================

/// Reduces batches of ordered events into persisted data values, bounding
/// replay cost with periodic checkpoint snapshots.
///
/// # Flow, per batch
///
/// 1. Compute the batch's minimum mark
/// 2. Per distinct key: load the latest snapshot; discard it unless it is
///    strictly older than the batch minimum
/// 3. Replay the durable event history after the snapshot's mark (not the
///    in-memory batch) in fixed-size windows
/// 4. Persist the data when it changed; persist the newest checkpoint when
///    enough full windows were folded
///
/// Distinct keys are processed concurrently; there is no cross-key locking.
pub struct SnapshotReduceService<K, M, Ev, D> {
    config: SnapshotReduceConfig,
    reducer: Arc<dyn SnapshotReducer<K, M, Ev, D>>,
    events: Arc<dyn EventRepository<K, M, Ev>>,
    snapshots: Arc<dyn SnapshotRepository<K, M, D>>,
    data: Arc<dyn DataRepository<K, D>>,
}

impl<K, M, Ev, D> SnapshotReduceService<K, M, Ev, D>
where
    K: PartialEq + Clone + Debug + Send + Sync + 'static,
    M: Ord + Clone + Debug + Send + Sync + 'static,
    Ev: ReduceEvent<M>,
    D: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        config: SnapshotReduceConfig,
        reducer: Arc<dyn SnapshotReducer<K, M, Ev, D>>,
        events: Arc<dyn EventRepository<K, M, Ev>>,
        snapshots: Arc<dyn SnapshotRepository<K, M, D>>,
        data: Arc<dyn DataRepository<K, D>>,
    ) -> Self {
        Self {
            config,
            reducer,
            events,
            snapshots,
            data,
        }
    }

    /// Reduce one batch of events.
    ///
    /// An empty batch is a no-op. Every distinct key in the batch is
    /// attempted; when one key fails, the others' persisted changes stand
    /// and the first error is returned after all keys completed. Returns
    /// the data values persisted by this batch.
    #[instrument(skip_all, fields(batch = events.len()))]
    pub async fn on_events(&self, events: &[Ev]) -> ReduceResult<Vec<D>> {
        let Some(batch_min) = events.iter().map(|event| event.mark()).min() else {
            return Ok(Vec::new());
        };

        let mut keys: Vec<K> = Vec::new();
        for event in events {
            let key = self.reducer.data_key(event);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let updates = keys.iter().map(|key| self.update_key(key, &batch_min));
        let results = join_all(updates).await;

        let mut saved = Vec::new();
        let mut first_error = None;
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(Some(data)) => saved.push(data),
                Ok(None) => {}
                Err(error) => {
                    if matches!(error, ReduceError::Consistency(_)) {
                        record_consistency_error("snapshot");
                    }
                    warn!(key = ?key, error = %error, "Key update failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(saved),
        }
    }

    #[instrument(skip(self, batch_min))]
    async fn update_key(&self, key: &K, batch_min: &M) -> ReduceResult<Option<D>> {
        // A snapshot is a safe replay base only when it is strictly older
        // than everything this batch replays.
        let snapshot = self
            .snapshots
            .latest(key)
            .await?
            .filter(|snapshot| *batch_min > snapshot.mark);

        optimistic_retry(
            || self.replay(key, snapshot.as_ref()),
            ReduceError::is_version_conflict,
        )
        .await
    }

    /// One full load-replay-save unit for a key.
    ///
    /// Re-executed wholesale on a version conflict, so every step reads
    /// fresh state.
    async fn replay(
        &self,
        key: &K,
        snapshot: Option<&ReduceSnapshot<M, D>>,
    ) -> ReduceResult<Option<D>> {
        let initial = match snapshot {
            Some(snapshot) => snapshot.data.clone(),
            None => self.reducer.initial_data(key),
        };
        let after = snapshot.map(|snapshot| &snapshot.mark);
        let events = self.events.events_after(key, after).await?;

        // A zero window size would never produce a checkpoint candidate and
        // cannot chunk; fold at least one event at a time.
        let window_size = self.config.min_events_before_snapshot.max(1);
        let mut stack = SnapshotStack::new(self.config.snapshot_stack_capacity);
        let mut data = initial.clone();
        let mut replayed = 0usize;
        let mut windows_folded = 0u64;

        let mut windows = events.chunks(window_size);
        while let Some(chunk) = windows.next().await {
            let window: Vec<Ev> = chunk.into_iter().collect::<StorageResult<_>>()?;
            replayed += window.len();
            let full = window.len() == window_size;

            let folded = self.reducer.reduce_window(data, &window).await?;
            data = folded.data.clone();
            windows_folded += 1;

            if full {
                stack.push(folded);
            }
        }
        record_replay_windows(windows_folded);

        if replayed == 0 {
            // Raced with the event writer: nothing recorded after the
            // snapshot's mark yet.
            trace!("No events to replay");
            return Ok(None);
        }

        if data == initial {
            trace!(replayed, "Data unchanged");
            return Ok(None);
        }

        let saved = self.data.save(data).await?;
        record_data_saved();

        if stack.pushed() >= self.config.snapshot_persist_threshold
            && let Some(checkpoint) = stack.latest()
        {
            self.snapshots.save(key, checkpoint).await?;
            record_snapshot_saved();
            debug!(mark = ?checkpoint.mark, "Checkpoint persisted");
        }

        debug!(replayed, "Data persisted");
        Ok(Some(saved))
    }
}

// =============================================================================
// Snapshot stack
// =============================================================================

/// Bounded stack of the checkpoint candidates produced during one replay.
///
/// Keeps the most recent candidates up to capacity but counts every push,
/// so the persist threshold sees the true number of full windows even after
/// older candidates have been dropped.
struct SnapshotStack<M, D> {
    entries: VecDeque<ReduceSnapshot<M, D>>,
    capacity: usize,
    pushed: usize,
}

impl<M, D> SnapshotStack<M, D> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            pushed: 0,
        }
    }

    fn push(&mut self, snapshot: ReduceSnapshot<M, D>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
        self.pushed += 1;
    }

    /// The most recently pushed candidate.
    fn latest(&self) -> Option<&ReduceSnapshot<M, D>> {
        self.entries.back()
    }

    /// Total candidates pushed, including dropped ones.
    fn pushed(&self) -> usize {
        self.pushed
    }
}
