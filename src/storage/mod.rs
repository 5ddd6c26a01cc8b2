//! Snapshot persistence.

mod store;

pub use store::SnapshotStore;
