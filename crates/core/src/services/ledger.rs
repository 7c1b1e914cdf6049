//! Reorg-safe ledger of the records applied to one entity.
//!
//! The ledger holds an entity's currently-retained records sorted by mark,
//! monotonically decreasing from the head. Additive records are inserted at
//! their mark position; subtractive records remove the previously-applied
//! record they undo. Records whose marks have become stable are pruned from
//! the retained view, which bounds the ledger to the recent, still-revertible
//! tail of history.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{ConsistencyError, ConsistencyResult};
use crate::models::{LogRecord, RecordStatus};
use crate::ports::MarkService;

/// In-memory, mark-ordered view of an entity's retained records.
///
/// Built fresh for every reduction run from the entity's persisted records;
/// never shared across runs.
pub struct RecordLedger<M, R> {
    records: Vec<R>,
    marks: Arc<dyn MarkService<R, M>>,
}

impl<M, R> RecordLedger<M, R>
where
    M: Ord + Clone + Debug,
    R: LogRecord,
{
    /// Build a ledger from an entity's retained records.
    pub fn new(mut records: Vec<R>, marks: Arc<dyn MarkService<R, M>>) -> Self {
        records.sort_by(|a, b| marks.mark(b).cmp(&marks.mark(a)));
        Self { records, marks }
    }

    /// Whether a record can be applied to this ledger.
    ///
    /// For additive records: true iff no retained record already occupies
    /// the mark. For subtractive records: true iff a retained record matches
    /// by full equality. A `false` here is not an error, it is how
    /// redundant or stale deliveries are discarded after a reorg.
    pub fn can_apply(&self, record: &R) -> ConsistencyResult<bool> {
        let status = self.status_of(record)?;
        Ok(if status.is_additive() {
            self.insert_index(record).is_some()
        } else {
            self.remove_index(record).is_some()
        })
    }

    /// Insert or remove a record at the position computed by [`can_apply`].
    ///
    /// [`can_apply`] must have returned `true` for this record; a violation
    /// is a reduction-consistency failure.
    ///
    /// [`can_apply`]: Self::can_apply
    pub fn apply(&mut self, record: R) -> ConsistencyResult<()> {
        let status = self.status_of(&record)?;
        if status.is_additive() {
            let index = self
                .insert_index(&record)
                .ok_or_else(|| ConsistencyError::DuplicateMark(format!("{record:?}")))?;
            self.records.insert(index, record);
        } else {
            let index = self
                .remove_index(&record)
                .ok_or_else(|| ConsistencyError::UnmatchedRemoval(format!("{record:?}")))?;
            self.records.remove(index);
        }
        Ok(())
    }

    /// The retained records whose marks are not yet stable, head first.
    ///
    /// Stable records stay folded into derived state but are dropped from
    /// the persisted ledger; the chain can no longer invalidate them.
    pub fn retained(&self) -> Vec<R> {
        self.records
            .iter()
            .filter(|record| !self.marks.is_stable(&self.marks.mark(record)))
            .cloned()
            .collect()
    }

    /// Insertion index for an additive record, `None` when its mark is
    /// already occupied. A record newer than every retained mark goes to
    /// the head without a search.
    fn insert_index(&self, record: &R) -> Option<usize> {
        let mark = self.marks.mark(record);
        match self.head_mark() {
            None => Some(0),
            Some(head) if mark > head => Some(0),
            Some(_) => match self.search(&mark) {
                Ok(_) => None,
                Err(index) => Some(index),
            },
        }
    }

    /// Index of the retained record a subtractive record undoes, `None`
    /// when nothing matches (never observed, or already pruned as stable).
    fn remove_index(&self, record: &R) -> Option<usize> {
        let mark = self.marks.mark(record);
        let index = match self.head_mark() {
            Some(head) if mark == head => 0,
            _ => self.search(&mark).ok()?,
        };
        // Marks pick the position; record identity decides the match.
        self.records[index].is_same_record(record).then_some(index)
    }

    /// Binary search over the descending-by-mark order.
    fn search(&self, mark: &M) -> Result<usize, usize> {
        self.records
            .binary_search_by(|probe| self.marks.mark(probe).cmp(mark).reverse())
    }

    fn head_mark(&self) -> Option<M> {
        self.records.first().map(|record| self.marks.mark(record))
    }

    fn status_of(&self, record: &R) -> ConsistencyResult<RecordStatus> {
        record
            .status()
            .ok_or_else(|| ConsistencyError::MissingStatus(format!("{record:?}")))
    }
}
