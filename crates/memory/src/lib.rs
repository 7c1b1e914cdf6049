//! In-memory adapter layer for the Reprise reduction engine.
//!
//! This crate provides in-memory implementations of the port traits defined
//! in `reprise-core`. They back the demo binary and the integration test
//! suite; a production deployment implements the same traits against its
//! own document store.
//!
//! # Architecture
//!
//! One store per port:
//!
//! - [`MemoryEntityStore`] - entities for the live and batch paths
//! - [`MemoryEventStore`] - the durable, ordered event history
//! - [`MemoryDataStore`] - reduced data values, with simulated version
//!   conflicts for exercising the optimistic-retry path
//! - [`MemorySnapshotStore`] - the latest checkpoint per key
//!
//! # Usage
//!
//! ```ignore
//! use reprise_memory::{EntityIdentity, MemoryEntityStore};
//!
//! let entities = Arc::new(MemoryEntityStore::new(Arc::new(BalanceIdentity)));
//! let service = LiveReduceService::new(config, marks, mapper, entities, reducer);
//! ```

mod data_store;
mod entity_store;
mod event_store;
mod snapshot_store;

pub use data_store::{KeyedData, MemoryDataStore};
pub use entity_store::{EntityIdentity, MemoryEntityStore};
pub use event_store::MemoryEventStore;
pub use snapshot_store::MemorySnapshotStore;
