//! Shared types for the kinetree world model: entity identity and rigid poses.

mod name;
mod types;

pub use name::PrefixedName;
pub use types::{Pose, rpy_to_quat, transforms_close};
