use crate::body::Body;
use crate::connection::Connection;
use crate::dof::{DegreeOfFreedom, DofLimits};
use crate::expression::TransformExpression;
use crate::state::DofState;
use crate::view::View;
use kinetree_common::PrefixedName;
use serde::{Deserialize, Serialize};

/// A record produced by every mutation of a world model.
///
/// Committed transactions hand their events to subscribers and the event log.
/// Each event carries enough data to replay the mutation onto an earlier model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldEvent {
    BodyAdded {
        body: Body,
    },
    /// Carries the removed body for inspection and undo.
    BodyRemoved {
        body: Body,
    },
    ConnectionAdded {
        connection: Connection,
    },
    ConnectionRemoved {
        connection: Connection,
    },
    DofRegistered {
        dof: DegreeOfFreedom,
    },
    DofRemoved {
        dof: DegreeOfFreedom,
        last_state: DofState,
    },
    StateSet {
        dof: PrefixedName,
        old: DofState,
        new: DofState,
    },
    ExpressionReplaced {
        connection: PrefixedName,
        expression: TransformExpression,
    },
    LimitsSet {
        dof: PrefixedName,
        old: DofLimits,
        new: DofLimits,
    },
    ViewAdded {
        view: View,
    },
    ViewRemoved {
        view: View,
    },
}

impl WorldEvent {
    /// Whether the event changes the body/connection graph.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::BodyAdded { .. }
                | Self::BodyRemoved { .. }
                | Self::ConnectionAdded { .. }
                | Self::ConnectionRemoved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_classification() {
        assert!(WorldEvent::BodyAdded { body: Body::new("a") }.is_structural());
        let set = WorldEvent::StateSet {
            dof: PrefixedName::new("q"),
            old: DofState::ZERO,
            new: DofState::at_position(1.0),
        };
        assert!(!set.is_structural());
    }
}
