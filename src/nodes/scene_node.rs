//! Scene-tree node: a drawable layered over [`TransformNode`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::{Deref, DerefMut};

use crate::ids::{MaterialID, MeshID, NodeID};
use crate::nodes::transform_node::TransformNode;

/// Drawable payload. `Node` is a pure grouping/transform node and never
/// reaches a draw list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum SceneNodeData {
    #[default]
    Node,
    Mesh(MeshInstance),
    Points(PointCloud),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeshInstance {
    pub mesh: MeshID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PointCloud {
    pub geometry: MeshID,
    pub point_count: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SceneNode {
    #[serde(skip)]
    pub id: NodeID,

    pub name: Cow<'static, str>,

    /// Tree parent (owner of this node's slot in a child list). Nil for roots.
    #[serde(skip)]
    pub parent: NodeID,

    /// Ordered children; the order is the paint order for overlay elements.
    #[serde(skip)]
    pub children: Vec<NodeID>,

    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Material reference; materials outlive nodes. Nil = nothing to draw.
    #[serde(default)]
    pub material: MaterialID,

    pub base: TransformNode,

    #[serde(default)]
    pub data: SceneNodeData,
}

fn default_visible() -> bool {
    true
}

impl SceneNode {
    pub fn new(data: SceneNodeData) -> Self {
        Self {
            id: NodeID::nil(),
            name: Cow::Borrowed("Node"),
            parent: NodeID::nil(),
            children: Vec::new(),
            visible: true,
            material: MaterialID::nil(),
            base: TransformNode::new(),
            data,
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>, data: SceneNodeData) -> Self {
        let mut node = Self::new(data);
        node.name = name.into();
        node
    }

    /// Mesh handle of the drawable payload, if any.
    pub fn mesh(&self) -> Option<MeshID> {
        match &self.data {
            SceneNodeData::Node => None,
            SceneNodeData::Mesh(m) => Some(m.mesh),
            SceneNodeData::Points(p) => Some(p.geometry),
        }
    }

    /// A node is registered for drawing when it is visible, has a material
    /// and carries drawable geometry.
    pub fn is_drawable(&self) -> bool {
        self.visible && !self.material.is_nil() && self.mesh().is_some()
    }

    /// Pre-draw hook, invoked before the node is considered for the draw
    /// list. Grouping and mesh nodes have no per-frame work; payloads that
    /// grow one get their update here.
    pub fn on_update(&mut self) {
        match &mut self.data {
            SceneNodeData::Node | SceneNodeData::Mesh(_) | SceneNodeData::Points(_) => {}
        }
    }
}

impl Deref for SceneNode {
    type Target = TransformNode;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for SceneNode {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_node_is_never_drawable() {
        let mut node = SceneNode::new(SceneNodeData::Node);
        node.material = MaterialID::new();
        assert!(!node.is_drawable());
    }

    #[test]
    fn mesh_node_needs_material_and_visibility() {
        let mut node = SceneNode::new(SceneNodeData::Mesh(MeshInstance {
            mesh: MeshID::new(),
        }));
        assert!(!node.is_drawable());
        node.material = MaterialID::new();
        assert!(node.is_drawable());
        node.visible = false;
        assert!(!node.is_drawable());
    }
}
