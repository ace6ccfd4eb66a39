//! Durable and replicated persistence for the gas monitor.
//!
//! - [`snapshot`] - periodic atomic snapshot of devices and settings.
//! - [`replica`] - the external replicated store ([`ReplicaStore`]) with
//!   REST and in-memory implementations.
//! - [`mirror`] - forwards origin events from the bus to a replica store.

pub mod error;
pub mod mirror;
pub mod replica;
pub mod snapshot;

pub use error::{PersistenceError, ReplicaError};
pub use mirror::{mirror_event, should_mirror, MirrorWriter};
pub use replica::{InMemoryReplicaStore, ReplicaStore, RestReplicaStore};
pub use snapshot::{Snapshot, SnapshotFile};
