pub mod anchor;
pub mod color;
pub mod quaternion;
pub mod transform3d;
pub mod vector3;

pub use anchor::{Anchor, Bounds3};
pub use color::Color;
pub use quaternion::Quaternion;
pub use transform3d::Transform3D;
pub use vector3::Vector3;
