//! Developer tooling: read-only world inspection.
//!
//! # Invariants
//! - Tools never mutate the world; they only take `&WorldModel`.

mod inspector;

pub use inspector::{BodyInfo, WorldInspector, WorldSummary};
