use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::structs::vector3::Vector3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

// Serialized as a plain [x, y, z, w] array.
impl Serialize for Quaternion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.x, self.y, self.z, self.w].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Quaternion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr = <[f32; 4]>::deserialize(deserializer)?;
        Ok(Quaternion::new(arr[0], arr[1], arr[2], arr[3]))
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quaternion({}, {}, {}, {})",
            self.x, self.y, self.z, self.w
        )
    }
}

impl Quaternion {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }

    /// Converts this quaternion into a `glam::Quat`.
    #[inline(always)]
    pub fn to_glam(self) -> glam::Quat {
        glam::Quat::from_xyzw(self.x, self.y, self.z, self.w)
    }

    /// Creates a `Quaternion` from a `glam::Quat`.
    #[inline(always)]
    pub fn from_glam(q: glam::Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }

    /// Create quaternion from Euler angles in radians (pitch, yaw, roll).
    pub fn from_euler(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self::from_glam(glam::Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, roll))
    }

    /// Create quaternion from Euler angles in degrees (pitch, yaw, roll).
    pub fn from_euler_degrees(pitch_deg: f32, yaw_deg: f32, roll_deg: f32) -> Self {
        Self::from_euler(
            pitch_deg.to_radians(),
            yaw_deg.to_radians(),
            roll_deg.to_radians(),
        )
    }

    /// Rotation of `angle` radians around `axis` (normalized internally).
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        Self::from_glam(glam::Quat::from_axis_angle(
            axis.normalized().to_glam(),
            angle,
        ))
    }

    /// Hamilton product; applies `rhs` first, then `self`.
    pub fn mul(self, rhs: Quaternion) -> Self {
        Self::from_glam(self.to_glam() * rhs.to_glam())
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate_vec3(self, v: Vector3) -> Vector3 {
        Vector3::from_glam(self.to_glam() * v.to_glam())
    }

    /// Returns a unit-length copy. Degenerate input falls back to identity.
    pub fn normalized(self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len == 0.0 {
            Self::identity()
        } else {
            Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}
