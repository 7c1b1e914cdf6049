//! Domain models and model contracts for the reduction engine.
//!
//! These types are storage-agnostic. The engine itself is generic over the
//! host's mark, record, entity, event and data types; the contracts below
//! are the minimal surface those types must expose.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Record Status
// =============================================================================

/// Lifecycle status attached to a log record by the upstream indexer.
///
/// `Confirmed` and `Pending` records are additive: they should be applied.
/// `Reverted`, `Dropped` and `Inactive` records are subtractive: a
/// previously-applied record, identified by equality, must be undone
/// (the chain reorganized underneath it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Record is part of canonical history.
    Confirmed,
    /// Record is seen but not yet finalized.
    Pending,
    /// Record was invalidated by a chain reorganization.
    Reverted,
    /// Record was dropped from the pending pool.
    Dropped,
    /// Record was deactivated upstream.
    Inactive,
}

impl RecordStatus {
    /// Whether a record with this status should be applied.
    pub fn is_additive(self) -> bool {
        matches!(self, Self::Confirmed | Self::Pending)
    }

    /// Whether a record with this status undoes a previously-applied record.
    pub fn is_subtractive(self) -> bool {
        !self.is_additive()
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Confirmed => "confirmed",
            Self::Pending => "pending",
            Self::Reverted => "reverted",
            Self::Dropped => "dropped",
            Self::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Chain Mark
// =============================================================================

/// Ready-made mark for chains ordered by block height plus intra-block index.
///
/// The engine treats marks as opaque `Ord` values; this concrete type covers
/// the common case so hosts don't have to define their own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ChainMark {
    /// Block height.
    pub height: u64,
    /// Position within the block.
    pub index: u32,
}

impl ChainMark {
    pub fn new(height: u64, index: u32) -> Self {
        Self { height, index }
    }
}

impl fmt::Display for ChainMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.index)
    }
}

// =============================================================================
// Model Contracts
// =============================================================================

/// Contract for log records consumed by the live reduction path.
///
/// Records are created upstream and read-only to the engine.
pub trait LogRecord: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The record's lifecycle status.
    ///
    /// `None` means the producer emitted a record the engine cannot
    /// classify; this is surfaced as a consistency error.
    fn status(&self) -> Option<RecordStatus>;

    /// Whether `other` is the same upstream record, status aside.
    ///
    /// A reverting record is the original delivery re-issued with a
    /// subtractive status; payload identity, not full equality, decides
    /// whether it matches a retained record.
    fn is_same_record(&self, other: &Self) -> bool;
}

/// Contract for entities that track the revertible subset of their applied
/// records.
///
/// Entities are mutated only by wholesale replacement (`with_records`),
/// never in place, so the fold stays pure and re-execution is safe.
pub trait RevertableEntity<K, R>: Clone + PartialEq + Send + Sync + 'static {
    /// The entity's key.
    fn id(&self) -> &K;

    /// The retained records, ordered by mark.
    fn records(&self) -> &[R];

    /// Copy of this entity with a new retained-record list.
    fn with_records(self, records: Vec<R>) -> Self;
}

/// Contract for ordered change events consumed by the snapshot path.
pub trait ReduceEvent<M>: Clone + fmt::Debug + Send + Sync + 'static {
    /// The event's position in the total order.
    fn mark(&self) -> M;
}

// =============================================================================
// Snapshot
// =============================================================================

/// Checkpoint pairing a reduced data value with the mark it was computed
/// through.
///
/// Replay for a key seeds from its latest snapshot instead of genesis, which
/// bounds replay cost. A snapshot's mark never exceeds the mark of any event
/// it seeds replay for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceSnapshot<M, D> {
    /// Mark of the last event folded into `data`.
    pub mark: M,
    /// The reduced value at `mark`.
    pub data: D,
    /// When this checkpoint was taken.
    pub taken_at: DateTime<Utc>,
}

impl<M, D> ReduceSnapshot<M, D> {
    pub fn new(mark: M, data: D) -> Self {
        Self {
            mark,
            data,
            taken_at: Utc::now(),
        }
    }
}
