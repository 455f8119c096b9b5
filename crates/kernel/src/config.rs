use serde::{Deserialize, Serialize};

/// What a state write does with values outside a DoF's limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Fail the write with `OutOfBounds`.
    #[default]
    Reject,
    /// Store the nearest admissible value.
    Clamp,
}

/// What `modify_world` does while another thread holds the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Wait until the open transaction finishes.
    #[default]
    Block,
    /// Return `TransactionBusy` immediately.
    FailFast,
}

/// Per-world behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub bounds_policy: BoundsPolicy,
    pub lock_policy: LockPolicy,
    /// Check the tree invariant before publishing a commit.
    pub validate_on_commit: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            bounds_policy: BoundsPolicy::Reject,
            lock_policy: LockPolicy::Block,
            validate_on_commit: true,
        }
    }
}
