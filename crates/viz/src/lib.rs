//! Visualization adapter: read-only views of committed worlds.
//!
//! # Invariants
//! - Renderers cannot mutate the world; they only see `&WorldModel`.
//! - Output derives from one committed snapshot, never a partial transaction.
//!
//! Two contracts are offered: pull (render `World::snapshot()` whenever a
//! frame is needed) and push ([`SnapshotFollower`] tracks commit notices).

mod follower;
mod renderer;

pub use follower::SnapshotFollower;
pub use renderer::{DebugTextRenderer, PoseRenderer, RenderView, Renderer};
