//! Transform and utilities for spatial positioning.
//!
//! The terrain world is Z-up: the height map spans the XY plane and heights
//! grow along +Z.

use glam::{Quat, Vec3};

/// World up axis.
pub const WORLD_UP: Vec3 = Vec3::Z;

/// A 3D transform representing position, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Forward direction. With an identity rotation this looks along +Y.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Right direction (positive X with an identity rotation).
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Up direction (positive Z with an identity rotation).
    pub fn up(&self) -> Vec3 {
        self.rotation * WORLD_UP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_axes_are_z_up() {
        let t = Transform::default();
        assert!((t.forward() - Vec3::Y).length() < 1e-6);
        assert!((t.up() - Vec3::Z).length() < 1e-6);
        assert!((t.right() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn pitch_down_faces_negative_z() {
        let t = Transform {
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            ..Transform::default()
        };
        assert!((t.forward() - Vec3::NEG_Z).length() < 1e-5);
    }
}
