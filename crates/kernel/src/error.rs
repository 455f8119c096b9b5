use kinetree_common::PrefixedName;
use std::fmt;

/// Alias for `Result<T, WorldError>`.
pub type WorldResult<T> = Result<T, WorldError>;

/// Which namespace a name collided in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Body,
    Connection,
    DegreeOfFreedom,
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Body => "body",
            Self::Connection => "connection",
            Self::DegreeOfFreedom => "degree of freedom",
            Self::View => "view",
        })
    }
}

/// Component of a DoF state that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateComponent {
    Position,
    Velocity,
    Acceleration,
    Jerk,
}

impl fmt::Display for StateComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Acceleration => "acceleration",
            Self::Jerk => "jerk",
        })
    }
}

/// Errors raised by world construction, mutation, transform evaluation and queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("{kind} \"{name}\" already exists in this world")]
    DuplicateIdentity { kind: EntityKind, name: PrefixedName },

    #[error("body not found: {0}")]
    UnknownBody(PrefixedName),

    #[error("connection not found: {0}")]
    UnknownConnection(PrefixedName),

    #[error("degree of freedom not found: {0}")]
    UnknownDegreeOfFreedom(PrefixedName),

    #[error("body {child} already has parent connection {existing}")]
    AlreadyConnected {
        child: PrefixedName,
        existing: PrefixedName,
    },

    #[error("connecting {parent} -> {child} would create a cycle")]
    CycleDetected {
        parent: PrefixedName,
        child: PrefixedName,
    },

    #[error("{component} {value} of {dof} is outside [{lower}, {upper}]")]
    OutOfBounds {
        dof: PrefixedName,
        component: StateComponent,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("mutation attempted outside of a transaction")]
    NoActiveTransaction,

    #[error("no element satisfies the query")]
    NoMatch,

    #[error("query is ambiguous: {count} elements match")]
    AmbiguousMatch { count: usize },

    /// Internal invariant violation: the body has no path to the root.
    #[error("body {0} is not reachable from the world root")]
    Unreachable(PrefixedName),

    #[error("world has {} root bodies, expected one", .0.len())]
    MultipleRoots(Vec<PrefixedName>),

    #[error("world has no bodies")]
    EmptyWorld,

    #[error("view {0} already exists")]
    AddingAnExistingView(PrefixedName),

    /// A view with this name exists but describes different bodies.
    #[error("view {0} conflicts with an existing view of the same name")]
    DuplicateView(PrefixedName),

    #[error("view not found: {0}")]
    ViewNotFound(PrefixedName),

    #[error("body {0} still has child connections")]
    HasChildren(PrefixedName),

    #[error("another transaction is open on this world")]
    TransactionBusy,

    #[error("transaction aborted: {0}")]
    TransactionFailed(String),

    #[error("connection {connection} needs {expected} degrees of freedom, got {actual}")]
    DofCountMismatch {
        connection: PrefixedName,
        expected: usize,
        actual: usize,
    },
}

impl WorldError {
    /// Whether this error signals a broken internal invariant rather than misuse.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identity_names_kind() {
        let e = WorldError::DuplicateIdentity {
            kind: EntityKind::Body,
            name: PrefixedName::new("drawer"),
        };
        assert_eq!(e.to_string(), "body \"drawer\" already exists in this world");
    }

    #[test]
    fn out_of_bounds_message() {
        let e = WorldError::OutOfBounds {
            dof: PrefixedName::new("slide"),
            component: StateComponent::Position,
            value: 2.0,
            lower: 0.0,
            upper: 1.0,
        };
        assert_eq!(e.to_string(), "position 2 of slide is outside [0, 1]");
    }

    #[test]
    fn multiple_roots_counts() {
        let e = WorldError::MultipleRoots(vec![PrefixedName::new("a"), PrefixedName::new("b")]);
        assert!(e.to_string().contains("2 root bodies"));
        assert!(!e.is_invariant_violation());
        assert!(WorldError::Unreachable(PrefixedName::new("a")).is_invariant_violation());
    }
}
