//! Persistence: snapshots of committed worlds, the commit log, file-backed store.
//!
//! # Invariants
//! - Graph and state are always persisted together as one model.
//! - The commit log is append-only.
//! - Snapshots are content-addressed and verifiable.
//! - Loading replays only commits newer than the snapshot.

pub mod snapshot;
pub mod store;

pub use snapshot::{CommitRecord, EventLog, Snapshot};
pub use store::{IntegrityManifest, ManifestEntry, StoreError, StoreMeta, WorldStore};
