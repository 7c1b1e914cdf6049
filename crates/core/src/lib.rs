//! Core domain layer for the Reprise reduction engine.
//!
//! This crate rebuilds mutable domain entities from the ordered, append-only
//! change records a blockchain indexer produces, and stays correct when the
//! chain reorganizes - when records already applied are later marked
//! reverted, dropped or inactive. It follows hexagonal architecture
//! principles: this is the innermost layer, with no dependency on any
//! storage or transport backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     reprise (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    reprise-memory                           │
//! │               (in-memory adapters)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    reprise-core  ← YOU ARE HERE             │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Model types and contracts (marks, statuses, snapshots)
//! - [`ports`] - Interface traits for host collaborators to implement
//! - [`services`] - The reduction engine (ledger, live/snapshot/batch paths)
//! - [`stream`] - Contiguous-run grouping over async streams
//! - [`error`] - Engine error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! Ports define interfaces the host application must implement:
//!
//! - [`ports::MarkService`] - Total order over records plus the stability
//!   predicate
//! - [`ports::EntityService`] - Load, template and persist entities
//! - [`ports::EntityReducer`] / [`ports::SnapshotReducer`] - The pure fold
//!   functions
//! - [`ports::EventRepository`] / [`ports::DataRepository`] /
//!   [`ports::SnapshotRepository`] - Snapshot-path storage
//!
//! ## Reorg safety
//!
//! Every applied record stays tracked in the entity's
//! [`services::RecordLedger`] until its mark is stable. A subtractive
//! record undoes exactly the retained record it matches; one that matches
//! nothing is skipped, which is how redundant and stale deliveries die
//! quietly instead of corrupting state.
//!
//! ## Reduction lifecycle
//!
//! 1. Records arrive as an ordered stream, grouped into contiguous
//!    same-key runs
//! 2. Each run folds into a freshly loaded entity through the host reducer
//! 3. Changed entities are persisted with their still-revertible records
//! 4. The snapshot path replays durable history in windows, checkpointing
//!    so replay never starts from genesis

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
pub mod stream;
