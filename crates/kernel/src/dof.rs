use crate::config::BoundsPolicy;
use crate::error::{StateComponent, WorldError, WorldResult};
use crate::state::DofState;
use kinetree_common::PrefixedName;
use serde::{Deserialize, Serialize};

/// Closed interval with optional ends. A missing end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        lower: None,
        upper: None,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower.min(upper)),
            upper: Some(lower.max(upper)),
        }
    }

    pub fn lower_or_neg_inf(&self) -> f64 {
        self.lower.unwrap_or(f64::NEG_INFINITY)
    }

    pub fn upper_or_inf(&self) -> f64 {
        self.upper.unwrap_or(f64::INFINITY)
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_or_neg_inf() && value <= self.upper_or_inf()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower_or_neg_inf(), self.upper_or_inf())
    }
}

/// Limits of a degree of freedom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DofLimits {
    pub position: Bounds,
    pub velocity: Bounds,
}

/// A free scalar parameter of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeOfFreedom {
    pub name: PrefixedName,
    pub limits: DofLimits,
}

impl DegreeOfFreedom {
    /// An unbounded DoF.
    pub fn new(name: impl Into<PrefixedName>) -> Self {
        Self {
            name: name.into(),
            limits: DofLimits::default(),
        }
    }

    pub fn with_position_limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits.position = Bounds::new(lower, upper);
        self
    }

    pub fn with_velocity_limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits.velocity = Bounds::new(lower, upper);
        self
    }

    /// Check `value` against the limits and return what should be stored.
    ///
    /// Non-finite components are rejected under either policy.
    pub fn admit(&self, value: DofState, policy: BoundsPolicy) -> WorldResult<DofState> {
        let position = self.admit_component(
            StateComponent::Position,
            &self.limits.position,
            value.position,
            policy,
        )?;
        let velocity = self.admit_component(
            StateComponent::Velocity,
            &self.limits.velocity,
            value.velocity,
            policy,
        )?;
        for (component, extra) in [
            (StateComponent::Acceleration, value.acceleration),
            (StateComponent::Jerk, value.jerk),
        ] {
            if !extra.is_finite() {
                return Err(self.out_of_bounds(component, &Bounds::UNBOUNDED, extra));
            }
        }
        Ok(DofState {
            position,
            velocity,
            ..value
        })
    }

    fn admit_component(
        &self,
        component: StateComponent,
        bounds: &Bounds,
        value: f64,
        policy: BoundsPolicy,
    ) -> WorldResult<f64> {
        if !value.is_finite() {
            return Err(self.out_of_bounds(component, bounds, value));
        }
        if bounds.contains(value) {
            return Ok(value);
        }
        match policy {
            BoundsPolicy::Reject => Err(self.out_of_bounds(component, bounds, value)),
            BoundsPolicy::Clamp => Ok(bounds.clamp(value)),
        }
    }

    fn out_of_bounds(&self, component: StateComponent, bounds: &Bounds, value: f64) -> WorldError {
        WorldError::OutOfBounds {
            dof: self.name.clone(),
            component,
            value,
            lower: bounds.lower_or_neg_inf(),
            upper: bounds.upper_or_inf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide() -> DegreeOfFreedom {
        DegreeOfFreedom::new("slide")
            .with_position_limits(0.0, 0.4)
            .with_velocity_limits(-1.0, 1.0)
    }

    #[test]
    fn bounds_order_is_normalized() {
        let b = Bounds::new(1.0, -1.0);
        assert_eq!(b.lower, Some(-1.0));
        assert_eq!(b.upper, Some(1.0));
    }

    #[test]
    fn unbounded_contains_everything_finite() {
        assert!(Bounds::UNBOUNDED.contains(1e300));
        assert!(Bounds::UNBOUNDED.contains(-1e300));
        assert!(!Bounds::UNBOUNDED.contains(f64::NAN));
    }

    #[test]
    fn reject_policy_reports_component() {
        let err = slide()
            .admit(DofState::at_position(0.5), BoundsPolicy::Reject)
            .unwrap_err();
        match err {
            WorldError::OutOfBounds {
                component, upper, ..
            } => {
                assert_eq!(component, StateComponent::Position);
                assert_eq!(upper, 0.4);
            }
            other => panic!("expected OutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn clamp_policy_clamps_position_and_velocity() {
        let value = DofState {
            position: -0.2,
            velocity: 3.0,
            acceleration: 0.5,
            jerk: 0.0,
        };
        let stored = slide().admit(value, BoundsPolicy::Clamp).unwrap();
        assert_eq!(stored.position, 0.0);
        assert_eq!(stored.velocity, 1.0);
        assert_eq!(stored.acceleration, 0.5);
    }

    #[test]
    fn nan_is_rejected_even_when_clamping() {
        let res = slide().admit(DofState::at_position(f64::NAN), BoundsPolicy::Clamp);
        assert!(matches!(res, Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn in_bounds_value_passes_unchanged() {
        let v = DofState::at_position(0.1);
        assert_eq!(slide().admit(v, BoundsPolicy::Reject).unwrap(), v);
    }
}
