//! Port trait for the host-supplied ordering model.
//!
//! The engine never interprets marks itself; it only compares them and asks
//! whether the chain has progressed far enough past a mark that a reorg can
//! no longer revert it.

/// Ordering model over log records.
///
/// Both operations must be total and deterministic; they are called on the
/// engine's hot path and must not perform I/O.
pub trait MarkService<R, M>: Send + Sync {
    /// The mark attached to a record.
    fn mark(&self, record: &R) -> M;

    /// Whether the chain can no longer revert a record at this mark.
    ///
    /// Stable records are pruned from the retained ledger: their effect
    /// stays folded into derived state, but they no longer need to be
    /// tracked for possible reversal. A typical policy is "stable if at
    /// least N confirmations behind the chain head".
    fn is_stable(&self, mark: &M) -> bool;
}
