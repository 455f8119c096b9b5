use crate::error::{WorldError, WorldResult};
use kinetree_common::PrefixedName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time-varying value of one degree of freedom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DofState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
}

impl DofState {
    pub const ZERO: DofState = DofState {
        position: 0.0,
        velocity: 0.0,
        acceleration: 0.0,
        jerk: 0.0,
    };

    /// At rest at `position`.
    pub fn at_position(position: f64) -> Self {
        Self {
            position,
            ..Self::ZERO
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.position, self.velocity, self.acceleration, self.jerk]
    }
}

impl From<[f64; 4]> for DofState {
    fn from([position, velocity, acceleration, jerk]: [f64; 4]) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            jerk,
        }
    }
}

/// Aggregated state of every degree of freedom in a world.
///
/// Writes go through the owning `WorldModel`, which keeps the key set equal
/// to the DoF registry and validates values against limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    values: BTreeMap<PrefixedName, DofState>,
}

impl WorldState {
    pub fn get(&self, dof: &PrefixedName) -> WorldResult<DofState> {
        self.values
            .get(dof)
            .copied()
            .ok_or_else(|| WorldError::UnknownDegreeOfFreedom(dof.clone()))
    }

    pub fn position(&self, dof: &PrefixedName) -> WorldResult<f64> {
        self.get(dof).map(|s| s.position)
    }

    pub fn contains(&self, dof: &PrefixedName) -> bool {
        self.values.contains_key(dof)
    }

    /// Registered DoF names in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &PrefixedName> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PrefixedName, &DofState)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, dof: PrefixedName, value: DofState) -> Option<DofState> {
        self.values.insert(dof, value)
    }

    pub(crate) fn remove(&mut self, dof: &PrefixedName) -> Option<DofState> {
        self.values.remove(dof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dof_is_an_error() {
        let state = WorldState::default();
        assert_eq!(
            state.get(&PrefixedName::new("ghost")),
            Err(WorldError::UnknownDegreeOfFreedom(PrefixedName::new("ghost")))
        );
    }

    #[test]
    fn from_array_orders_components() {
        let s = DofState::from([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.position, 1.0);
        assert_eq!(s.jerk, 4.0);
        assert_eq!(s.as_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn keys_are_sorted() {
        let mut state = WorldState::default();
        state.insert(PrefixedName::new("b"), DofState::ZERO);
        state.insert(PrefixedName::new("a"), DofState::at_position(1.0));
        let keys: Vec<_> = state.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(state.position(&PrefixedName::new("a")).unwrap(), 1.0);
    }
}
