use glam::{DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// Rigid pose: translation plus rotation, no scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// Pure translation.
    pub fn from_translation(position: DVec3) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    /// Translation plus roll/pitch/yaw about the fixed X, Y, Z axes (URDF convention).
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self {
            position: DVec3::from(xyz),
            rotation: rpy_to_quat(rpy[0], rpy[1], rpy[2]),
        }
    }

    /// Homogeneous 4x4 matrix of this pose.
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Extract the rigid part of a homogeneous matrix. Scale is discarded.
    pub fn from_matrix(matrix: &DMat4) -> Self {
        let (_, rotation, position) = matrix.to_scale_rotation_translation();
        Self { position, rotation }
    }
}

/// Rotation `Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rpy_to_quat(roll: f64, pitch: f64, yaw: f64) -> DQuat {
    DQuat::from_euler(EulerRot::ZYX, yaw, pitch, roll)
}

/// Element-wise comparison of two transforms within `eps`.
pub fn transforms_close(a: &DMat4, b: &DMat4, eps: f64) -> bool {
    a.abs_diff_eq(*b, eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn pose_default_is_identity() {
        let p = Pose::default();
        assert_eq!(p.to_matrix(), DMat4::IDENTITY);
    }

    #[test]
    fn matrix_roundtrip_keeps_pose() {
        let p = Pose::from_xyz_rpy([1.0, -2.0, 0.5], [0.0, 0.0, FRAC_PI_2]);
        let back = Pose::from_matrix(&p.to_matrix());
        assert!(back.position.abs_diff_eq(p.position, 1e-12));
        assert!(back.rotation.abs_diff_eq(p.rotation, 1e-12));
    }

    #[test]
    fn yaw_rotates_x_onto_y() {
        let p = Pose::from_xyz_rpy([0.0; 3], [0.0, 0.0, FRAC_PI_2]);
        let moved = p.to_matrix().transform_point3(DVec3::X);
        assert!(moved.abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn roll_then_yaw_order() {
        // Rz(pi/2) * Rx(pi/2) takes Y to Z first, Z stays Z under yaw.
        let q = rpy_to_quat(FRAC_PI_2, 0.0, FRAC_PI_2);
        assert!((q * DVec3::Y).abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn transforms_close_tolerates_rounding() {
        let a = DMat4::from_translation(DVec3::new(0.1, 0.0, 0.0));
        let b = DMat4::from_translation(DVec3::new(0.1 + 1e-12, 0.0, 0.0));
        assert!(transforms_close(&a, &b, 1e-9));
        assert!(!transforms_close(&a, &DMat4::IDENTITY, 1e-9));
    }
}
