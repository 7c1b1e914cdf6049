//! Error types for the reduction engine domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConsistencyError`] - Reduction-consistency violations
//! - [`StorageError`] - Repository/persistence errors
//! - [`ReduceError`] - Top-level engine errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Consistency Errors
// =============================================================================

/// Reduction-consistency violations.
///
/// These errors mean the incoming record stream disagrees with the state
/// the engine has already derived: a malformed producer, a removal for a
/// record that was never applied, or an insertion that cannot be positioned.
/// They are fatal to the current record or run only; other keys' state is
/// not affected.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// Record carries no resolvable status; the producer is malformed.
    #[error("Record has no resolvable status: {0}")]
    MissingStatus(String),

    /// An additive record targets a mark that is already occupied.
    #[error("Cannot insert record, mark already occupied: {0}")]
    DuplicateMark(String),

    /// A subtractive record matches no retained record.
    #[error("Cannot remove record, no matching record retained: {0}")]
    UnmatchedRemoval(String),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Repository and persistence errors.
///
/// These errors originate from the host-supplied repository adapters
/// behind the port traits in [`crate::ports`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying record was updated concurrently since it was read.
    ///
    /// Recovered locally by the optimistic-retry wrapper via full unit
    /// re-execution; see [`crate::services::optimistic_retry`].
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Failed to reach the backing store.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Top-level reduction engine errors.
///
/// This is the main error type returned by the services in
/// [`crate::services`]. It wraps all lower-level errors and adds
/// engine-specific variants.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// Reduction-consistency violation.
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// Repository/persistence error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReduceError {
    /// Whether this error is a persistence version conflict.
    ///
    /// This is the predicate the optimistic-retry wrapper keys on.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::Storage(StorageError::VersionConflict(_)))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for engine operations.
pub type ReduceResult<T> = Result<T, ReduceError>;

/// Result type for consistency checks.
pub type ConsistencyResult<T> = Result<T, ConsistencyError>;

/// Result type for repository operations.
pub type StorageResult<T> = Result<T, StorageError>;
