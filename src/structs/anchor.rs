use serde::{Deserialize, Serialize};

use crate::structs::vector3::Vector3;

/// Axis-aligned bounding box used for layout anchoring: origin corner plus extent.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Bounds3 {
    pub position: Vector3,
    pub size: Vector3,
}

impl Bounds3 {
    pub const fn new(position: Vector3, size: Vector3) -> Self {
        Self { position, size }
    }

    /// Unit box with its origin corner at the world origin.
    pub const fn unit() -> Self {
        Self::new(Vector3::zero(), Vector3::one())
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::unit()
    }
}

/// Named reference point within a node's default bounds. The anchor shifts the
/// position origin so that `position` addresses the named point of the box
/// instead of its origin corner. `Anchor::None` leaves the origin untouched.
///
/// The nine named anchors span the x/y grid; depth is always anchored to the
/// box midplane.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    None,
    BottomLeft,
    BottomCenter,
    BottomRight,
    CenterLeft,
    Center,
    CenterRight,
    TopLeft,
    TopCenter,
    TopRight,
}

impl Anchor {
    /// Fractional position of the anchor point within the bounds,
    /// or `None` when anchoring is disabled.
    pub fn ratio(self) -> Option<Vector3> {
        let xy = match self {
            Anchor::None => return None,
            Anchor::BottomLeft => (0.0, 0.0),
            Anchor::BottomCenter => (0.5, 0.0),
            Anchor::BottomRight => (1.0, 0.0),
            Anchor::CenterLeft => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::CenterRight => (1.0, 0.5),
            Anchor::TopLeft => (0.0, 1.0),
            Anchor::TopCenter => (0.5, 1.0),
            Anchor::TopRight => (1.0, 1.0),
        };
        Some(Vector3::new(xy.0, xy.1, 0.5))
    }

    /// World-space offset that moves the anchored point of `bounds` (after
    /// applying `scale`) onto the position origin.
    pub fn offset(self, bounds: &Bounds3, scale: Vector3) -> Vector3 {
        match self.ratio() {
            Some(ratio) => -((bounds.position + ratio * bounds.size) * scale),
            None => Vector3::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_has_no_offset() {
        let b = Bounds3::unit();
        assert_eq!(Anchor::None.offset(&b, Vector3::splat(3.0)), Vector3::zero());
    }

    #[test]
    fn center_of_unit_box_scaled() {
        let b = Bounds3::unit();
        let off = Anchor::Center.offset(&b, Vector3::splat(2.0));
        assert_eq!(off, Vector3::new(-1.0, -1.0, -1.0));
    }

    #[test]
    fn bottom_left_respects_bounds_origin() {
        let b = Bounds3::new(Vector3::new(1.0, 1.0, 0.0), Vector3::one());
        let off = Anchor::BottomLeft.offset(&b, Vector3::one());
        assert_eq!(off, Vector3::new(-1.0, -1.0, -0.5));
    }
}
