//! World Kernel: the kinematic scene graph, its degrees of freedom, and the
//! transactional state every other crate derives from.
//!
//! # Invariants
//! - Bodies and connections always form a single tree at commit time.
//! - Every registered degree of freedom has exactly one state entry.
//! - Every body or view a view refers to exists at commit time.
//! - Shared worlds are only mutated inside a transaction; readers see whole commits.

pub mod body;
pub mod config;
pub mod connection;
pub mod dof;
pub mod error;
pub mod event;
pub mod expression;
pub mod model;
pub mod query;
pub mod state;
pub mod view;
pub mod world;

pub use body::Body;
pub use config::{BoundsPolicy, LockPolicy, WorldConfig};
pub use connection::{Connection, ConnectionKind};
pub use dof::{Bounds, DegreeOfFreedom, DofLimits};
pub use error::{EntityKind, StateComponent, WorldError, WorldResult};
pub use event::WorldEvent;
pub use expression::{PoseEvaluator, TransformExpression};
pub use model::{WorldId, WorldModel};
pub use query::{Match, Query, the, the_pair};
pub use state::{DofState, WorldState};
pub use view::{View, ViewKind};
pub use world::{CommitNotice, Transaction, World};

pub use kinetree_common::{Pose, PrefixedName};
