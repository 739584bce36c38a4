//! Transformable node core: local/composed matrix caching and the
//! apply-transformation link.
//!
//! A `TransformNode` owns its transform components and two cached matrices.
//! The composed matrix is `ancestor_composed * local`; ancestry is expressed
//! through a non-owning [`NodeID`] link plus reverse links in `dependents`.
//! Cross-node propagation (rebuilding dependents after a setter) is driven by
//! [`crate::scene::Scene`], which owns the arena the handles index into.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::NodeID;
use crate::structs::{Anchor, Bounds3, Quaternion, Transform3D, Vector3};

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransformNode {
    pub transform: Transform3D,

    #[serde(default)]
    pub anchor: Anchor,

    #[serde(default)]
    pub default_bounds: Bounds3,

    /// Ancestor whose composed matrix this node composes with. Nil means the
    /// local matrix is the composed matrix. Never owned; both ends are
    /// detached when either node is destroyed.
    #[serde(default)]
    pub apply_transformation: NodeID,

    /// Reverse links of `apply_transformation`. Maintained by the scene.
    #[serde(skip)]
    pub dependents: SmallVec<[NodeID; 4]>,

    #[serde(skip, default = "identity")]
    local_matrix: Mat4,

    #[serde(skip, default = "identity")]
    composed_matrix: Mat4,
}

impl Default for TransformNode {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformNode {
    pub fn new() -> Self {
        Self {
            transform: Transform3D::IDENTITY,
            anchor: Anchor::None,
            default_bounds: Bounds3::unit(),
            apply_transformation: NodeID::nil(),
            dependents: SmallVec::new(),
            local_matrix: Mat4::IDENTITY,
            composed_matrix: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(transform: Transform3D) -> Self {
        let mut node = Self::new();
        node.transform = transform;
        node.rebuild_local(Mat4::IDENTITY);
        node
    }

    // ---------------- component setters ----------------
    //
    // Each setter rebuilds the cached matrices against the ancestor matrix the
    // caller looked up. `Scene` wraps these and pushes the new composed matrix
    // through the dependents.

    pub fn set_position(&mut self, position: Vector3, ancestor: Mat4) {
        self.transform.position = position;
        self.rebuild_local(ancestor);
    }

    pub fn set_rotation(&mut self, rotation: Quaternion, ancestor: Mat4) {
        self.transform.rotation = rotation;
        self.rebuild_local(ancestor);
    }

    pub fn set_scale(&mut self, scale: Vector3, ancestor: Mat4) {
        self.transform.scale = scale;
        self.rebuild_local(ancestor);
    }

    pub fn set_anchor(&mut self, anchor: Anchor, ancestor: Mat4) {
        self.anchor = anchor;
        self.rebuild_local(ancestor);
    }

    pub fn set_default_bounds(&mut self, position: Vector3, size: Vector3, ancestor: Mat4) {
        self.default_bounds = Bounds3::new(position, size);
        self.rebuild_local(ancestor);
    }

    /// Recomputes the local matrix and re-derives the composed matrix from the
    /// given ancestor matrix.
    pub fn rebuild_local(&mut self, ancestor: Mat4) {
        let offset = self
            .anchor
            .offset(&self.default_bounds, self.transform.scale);
        self.local_matrix = self.transform.to_mat4_offset(offset);
        self.composed_matrix = ancestor * self.local_matrix;
    }

    /// Re-derives only the composed matrix; used when an ancestor moved but
    /// this node's own components did not change.
    pub fn recompose(&mut self, ancestor: Mat4) {
        self.composed_matrix = ancestor * self.local_matrix;
    }

    pub fn local_matrix(&self) -> Mat4 {
        self.local_matrix
    }

    pub fn composed_matrix(&self) -> Mat4 {
        self.composed_matrix
    }

    pub fn has_ancestor_link(&self) -> bool {
        !self.apply_transformation.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_matrix_tracks_setters() {
        let mut node = TransformNode::new();
        node.set_position(Vector3::new(2.0, 0.0, 0.0), Mat4::IDENTITY);
        let p = node
            .local_matrix()
            .transform_point3(glam::Vec3::ZERO);
        assert_eq!(p, glam::Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn centered_anchor_recenters_scaled_unit_cube() {
        // Unit cube anchored at its center, scaled 2x, placed at (1, 0, 0):
        // the cube's center must land on (1, 0, 0).
        let mut node = TransformNode::new();
        node.set_default_bounds(Vector3::zero(), Vector3::one(), Mat4::IDENTITY);
        node.set_anchor(Anchor::Center, Mat4::IDENTITY);
        node.set_scale(Vector3::splat(2.0), Mat4::IDENTITY);
        node.set_position(Vector3::new(1.0, 0.0, 0.0), Mat4::IDENTITY);

        let m = node.composed_matrix();
        let center = m.transform_point3(glam::Vec3::splat(0.5));
        assert!((center - glam::Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        // Still scaled 2x: the cube's corners are 2 apart per axis.
        let a = m.transform_point3(glam::Vec3::ZERO);
        let b = m.transform_point3(glam::Vec3::ONE);
        assert!(((b - a) - glam::Vec3::splat(2.0)).length() < 1e-6);
    }

    #[test]
    fn recompose_keeps_local_matrix() {
        let mut node = TransformNode::new();
        node.set_position(Vector3::new(1.0, 0.0, 0.0), Mat4::IDENTITY);
        let local = node.local_matrix();
        let ancestor = Mat4::from_translation(glam::Vec3::new(0.0, 5.0, 0.0));
        node.recompose(ancestor);
        assert_eq!(node.local_matrix(), local);
        assert_eq!(node.composed_matrix(), ancestor * local);
    }
}
