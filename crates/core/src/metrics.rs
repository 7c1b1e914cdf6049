//! Metrics definitions for the reduction engine.
//!
//! This module defines all metrics used throughout the engine.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "records_applied_total",
        "Total number of log records applied to an entity ledger"
    );
    describe_counter!(
        "records_skipped_total",
        "Total number of log records discarded as redundant or stale"
    );
    describe_counter!(
        "entities_updated_total",
        "Total number of entity updates persisted"
    );
    describe_counter!(
        "consistency_errors_total",
        "Total number of reduction-consistency errors"
    );
    describe_counter!(
        "optimistic_retries_total",
        "Total number of unit-of-work re-executions after a version conflict"
    );
    describe_counter!(
        "data_saved_total",
        "Total number of reduced data values persisted by the snapshot path"
    );
    describe_counter!(
        "snapshots_saved_total",
        "Total number of checkpoint snapshots persisted"
    );
    describe_counter!(
        "replay_windows_total",
        "Total number of event windows folded during snapshot replay"
    );
    describe_histogram!(
        "run_reduce_duration_seconds",
        "Time taken to reduce one contiguous same-key run in seconds"
    );
}

/// Record a log record applied to a ledger.
pub fn record_applied() {
    counter!("records_applied_total").increment(1);
}

/// Record a log record skipped by the reorg-safety valve.
///
/// # Arguments
/// * `reason` - Why the record was skipped ("duplicate" or "unmatched")
pub fn record_skipped(reason: &str) {
    counter!("records_skipped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a persisted entity update.
pub fn record_entity_updated() {
    counter!("entities_updated_total").increment(1);
}

/// Record a reduction-consistency error.
///
/// # Arguments
/// * `path` - The reduction path that hit the error ("live", "batch" or "snapshot")
pub fn record_consistency_error(path: &str) {
    counter!("consistency_errors_total", "path" => path.to_string()).increment(1);
}

/// Record an optimistic-lock retry.
pub fn record_optimistic_retry() {
    counter!("optimistic_retries_total").increment(1);
}

/// Record a persisted reduced data value.
pub fn record_data_saved() {
    counter!("data_saved_total").increment(1);
}

/// Record a persisted checkpoint snapshot.
pub fn record_snapshot_saved() {
    counter!("snapshots_saved_total").increment(1);
}

/// Record folded replay windows.
pub fn record_replay_windows(count: u64) {
    counter!("replay_windows_total").increment(count);
}

/// Record run reduction duration.
pub fn record_run_duration(duration_secs: f64) {
    histogram!("run_reduce_duration_seconds").record(duration_secs);
}

/// A timer that automatically records run duration when dropped.
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Start a new run timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RunTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_run_duration(duration);
    }
}
