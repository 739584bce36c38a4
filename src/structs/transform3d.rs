use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::structs::quaternion::Quaternion;
use crate::structs::vector3::Vector3;

fn default_position() -> Vector3 {
    Vector3::zero()
}
fn is_default_position(v: &Vector3) -> bool {
    *v == default_position()
}

fn default_rotation() -> Quaternion {
    Quaternion::identity()
}
fn is_default_rotation(v: &Quaternion) -> bool {
    *v == default_rotation()
}

fn default_scale() -> Vector3 {
    Vector3::one()
}
fn is_default_scale(v: &Vector3) -> bool {
    *v == default_scale()
}

/// 3D transform: position (`Vector3`), rotation (`Quaternion`), scale (`Vector3`).
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq)]
pub struct Transform3D {
    #[serde(
        default = "default_position",
        skip_serializing_if = "is_default_position"
    )]
    pub position: Vector3,

    #[serde(
        default = "default_rotation",
        skip_serializing_if = "is_default_rotation"
    )]
    pub rotation: Quaternion,

    #[serde(default = "default_scale", skip_serializing_if = "is_default_scale")]
    pub scale: Vector3,
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        position: Vector3::zero(),
        rotation: Quaternion::identity(),
        scale: Vector3::one(),
    };

    pub fn new(position: Vector3, rotation: Quaternion, scale: Vector3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Build a transform from position, euler rotation (in radians), and scale.
    pub fn from_euler(position: Vector3, euler: Vector3, scale: Vector3) -> Self {
        Self {
            position,
            rotation: Quaternion::from_euler(euler.x, euler.y, euler.z),
            scale,
        }
    }

    /// Check whether all components are default.
    pub fn is_default(&self) -> bool {
        is_default_position(&self.position)
            && is_default_rotation(&self.rotation)
            && is_default_scale(&self.scale)
    }

    /// Converts to a `glam::Mat4` (Scale → Rotate → Translate).
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale.to_glam(),
            self.rotation.to_glam(),
            self.position.to_glam(),
        )
    }

    /// Same as [`to_mat4`](Self::to_mat4) but with the translation shifted by
    /// `offset` (layout anchoring applies its offset in world units, after scale).
    pub fn to_mat4_offset(&self, offset: Vector3) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale.to_glam(),
            self.rotation.to_glam(),
            (self.position + offset).to_glam(),
        )
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_maps_to_identity_matrix() {
        assert_eq!(Transform3D::IDENTITY.to_mat4(), Mat4::IDENTITY);
    }

    #[test]
    fn scale_applies_before_translation() {
        let t = Transform3D::new(
            Vector3::new(1.0, 0.0, 0.0),
            Quaternion::identity(),
            Vector3::splat(2.0),
        );
        let p = t.to_mat4().transform_point3(glam::Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, glam::Vec3::new(3.0, 2.0, 2.0));
    }
}
