//! Transformation expressions: functions from DoF positions to a rigid transform.
//!
//! The closed-form variants cover fixed, single-axis and free connections.
//! Anything else plugs in through [`PoseEvaluator`], which the core treats as
//! an opaque, pure function of the DoFs it names.

use crate::error::WorldResult;
use crate::state::WorldState;
use glam::{DMat4, DVec3};
use kinetree_common::{Pose, PrefixedName, rpy_to_quat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// External evaluator mapping DoF positions to a 4x4 transform.
///
/// `evaluate` receives the positions of `dofs()` in the same order and must
/// be deterministic and free of side effects.
pub trait PoseEvaluator: fmt::Debug + Send + Sync {
    fn dofs(&self) -> Vec<PrefixedName>;
    fn evaluate(&self, positions: &[f64]) -> DMat4;
}

/// Child-relative-to-parent transform of a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransformExpression {
    /// Independent of any DoF.
    Constant(Pose),
    /// `origin * T(axis * (multiplier * q + offset))`.
    Prismatic {
        origin: Pose,
        axis: DVec3,
        dof: PrefixedName,
        multiplier: f64,
        offset: f64,
    },
    /// `origin * R(axis, multiplier * q + offset)`.
    Revolute {
        origin: Pose,
        axis: DVec3,
        dof: PrefixedName,
        multiplier: f64,
        offset: f64,
    },
    /// `origin * T(x, y, z) * R(roll, pitch, yaw)`; dofs are ordered x, y, z, roll, pitch, yaw.
    Free {
        origin: Pose,
        dofs: [PrefixedName; 6],
    },
    #[serde(skip)]
    Custom(Arc<dyn PoseEvaluator>),
}

impl TransformExpression {
    pub fn identity() -> Self {
        Self::Constant(Pose::default())
    }

    /// DoFs read by this expression, in evaluation order.
    pub fn dofs(&self) -> Vec<PrefixedName> {
        match self {
            Self::Constant(_) => Vec::new(),
            Self::Prismatic { dof, .. } | Self::Revolute { dof, .. } => vec![dof.clone()],
            Self::Free { dofs, .. } => dofs.to_vec(),
            Self::Custom(evaluator) => evaluator.dofs(),
        }
    }

    /// Evaluate against the current state. Fails only when a DoF is missing.
    pub fn evaluate(&self, state: &WorldState) -> WorldResult<DMat4> {
        let m = match self {
            Self::Constant(pose) => pose.to_matrix(),
            Self::Prismatic {
                origin,
                axis,
                dof,
                multiplier,
                offset,
            } => {
                let q = multiplier * state.position(dof)? + offset;
                origin.to_matrix() * DMat4::from_translation(unit_axis(*axis) * q)
            }
            Self::Revolute {
                origin,
                axis,
                dof,
                multiplier,
                offset,
            } => {
                let q = multiplier * state.position(dof)? + offset;
                origin.to_matrix() * DMat4::from_axis_angle(unit_axis(*axis), q)
            }
            Self::Free { origin, dofs } => {
                let mut q = [0.0; 6];
                for (slot, dof) in q.iter_mut().zip(dofs) {
                    *slot = state.position(dof)?;
                }
                let motion = DMat4::from_rotation_translation(
                    rpy_to_quat(q[3], q[4], q[5]),
                    DVec3::new(q[0], q[1], q[2]),
                );
                origin.to_matrix() * motion
            }
            Self::Custom(evaluator) => {
                let positions = evaluator
                    .dofs()
                    .iter()
                    .map(|dof| state.position(dof))
                    .collect::<WorldResult<Vec<_>>>()?;
                evaluator.evaluate(&positions)
            }
        };
        Ok(m)
    }
}

impl From<Pose> for TransformExpression {
    fn from(pose: Pose) -> Self {
        Self::Constant(pose)
    }
}

fn unit_axis(axis: DVec3) -> DVec3 {
    axis.try_normalize().unwrap_or(DVec3::Z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DofState;
    use kinetree_common::transforms_close;
    use std::f64::consts::FRAC_PI_2;

    fn state_with(values: &[(&str, f64)]) -> WorldState {
        let mut state = WorldState::default();
        for (name, q) in values {
            state.insert(PrefixedName::new(*name), DofState::at_position(*q));
        }
        state
    }

    #[test]
    fn constant_ignores_state() {
        let pose = Pose::from_translation(DVec3::new(1.0, 0.0, 0.0));
        let expr = TransformExpression::from(pose);
        assert!(expr.dofs().is_empty());
        assert_eq!(expr.evaluate(&WorldState::default()).unwrap(), pose.to_matrix());
    }

    #[test]
    fn prismatic_translates_along_axis() {
        let expr = TransformExpression::Prismatic {
            origin: Pose::from_translation(DVec3::new(0.0, 0.0, 1.0)),
            axis: DVec3::new(2.0, 0.0, 0.0),
            dof: PrefixedName::new("slide"),
            multiplier: 1.0,
            offset: 0.0,
        };
        let m = expr.evaluate(&state_with(&[("slide", 0.1)])).unwrap();
        let expected = DMat4::from_translation(DVec3::new(0.1, 0.0, 1.0));
        assert!(transforms_close(&m, &expected, 1e-12));
    }

    #[test]
    fn revolute_applies_multiplier_and_offset() {
        let expr = TransformExpression::Revolute {
            origin: Pose::default(),
            axis: DVec3::Z,
            dof: PrefixedName::new("hinge"),
            multiplier: 2.0,
            offset: -FRAC_PI_2,
        };
        // 2 * pi/2 - pi/2 = pi/2
        let m = expr.evaluate(&state_with(&[("hinge", FRAC_PI_2)])).unwrap();
        assert!(m.transform_point3(DVec3::X).abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn free_combines_translation_and_rotation() {
        let names = ["x", "y", "z", "roll", "pitch", "yaw"].map(PrefixedName::new);
        let expr = TransformExpression::Free {
            origin: Pose::default(),
            dofs: names,
        };
        let state = state_with(&[
            ("x", 1.0),
            ("y", 2.0),
            ("z", 3.0),
            ("roll", 0.0),
            ("pitch", 0.0),
            ("yaw", FRAC_PI_2),
        ]);
        let m = expr.evaluate(&state).unwrap();
        // Rotation happens in the moved frame: X maps to Y, then translation.
        let p = m.transform_point3(DVec3::X);
        assert!(p.abs_diff_eq(DVec3::new(1.0, 3.0, 3.0), 1e-12));
        assert_eq!(expr.dofs().len(), 6);
    }

    #[test]
    fn missing_dof_is_reported() {
        let expr = TransformExpression::Revolute {
            origin: Pose::default(),
            axis: DVec3::Z,
            dof: PrefixedName::new("hinge"),
            multiplier: 1.0,
            offset: 0.0,
        };
        assert!(expr.evaluate(&WorldState::default()).is_err());
    }

    #[derive(Debug)]
    struct Lift(PrefixedName);

    impl PoseEvaluator for Lift {
        fn dofs(&self) -> Vec<PrefixedName> {
            vec![self.0.clone()]
        }

        fn evaluate(&self, positions: &[f64]) -> DMat4 {
            DMat4::from_translation(DVec3::new(0.0, 0.0, positions[0] * positions[0]))
        }
    }

    #[test]
    fn custom_evaluator_reads_its_dofs() {
        let expr = TransformExpression::Custom(Arc::new(Lift(PrefixedName::new("lift"))));
        let m = expr.evaluate(&state_with(&[("lift", 3.0)])).unwrap();
        assert!(m.w_axis.z == 9.0);
    }

    #[test]
    fn custom_expression_does_not_serialize() {
        let expr = TransformExpression::Custom(Arc::new(Lift(PrefixedName::new("lift"))));
        assert!(serde_json::to_string(&expr).is_err());
        let constant = TransformExpression::identity();
        assert!(serde_json::to_string(&constant).is_ok());
    }
}
