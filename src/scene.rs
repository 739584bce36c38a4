//! Scene graph: hierarchy bookkeeping, matrix propagation and the pre-draw
//! traversal.
//!
//! All scene mutation happens on the render thread; the arena plus handle
//! links mean no locking and no dangling references. Transform ancestry
//! (`apply_transformation`) is independent of tree parenthood: the tree
//! drives ownership, traversal and paint order, the transform link drives
//! matrix composition.

use glam::Mat4;
use std::borrow::Cow;

use crate::ids::NodeID;
use crate::node_arena::NodeArena;
use crate::nodes::scene_node::{SceneNode, SceneNodeData};
use crate::rendering::render_target::{DrawCommand, RenderTarget};
use crate::structs::{Anchor, Quaternion, Vector3};

pub struct Scene {
    nodes: NodeArena,
    root: NodeID,
}

impl Scene {
    pub fn new() -> Self {
        let mut root = SceneNode::named("Root", SceneNodeData::Node);
        root.id = NodeID::new();
        let mut nodes = NodeArena::new();
        let root = nodes.insert(root);
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeID {
        self.root
    }

    pub fn get(&self, id: NodeID) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeID) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------- hierarchy ----------------

    /// Insert `node` as the last child of `parent`. Assigns a fresh id when
    /// the node carries nil.
    pub fn spawn(&mut self, parent: NodeID, mut node: SceneNode) -> NodeID {
        if node.id.is_nil() {
            node.id = NodeID::new();
        }
        node.parent = NodeID::nil();
        let id = self.nodes.insert(node);
        if !self.add_child(parent, id, None) {
            log::warn!("spawn: parent {parent} not found, node {id} left unparented");
        }
        id
    }

    pub fn spawn_named(
        &mut self,
        parent: NodeID,
        name: impl Into<Cow<'static, str>>,
        data: SceneNodeData,
    ) -> NodeID {
        self.spawn(parent, SceneNode::named(name, data))
    }

    /// Attach `child` under `parent` at `index` (append when `None` or out of
    /// range). Removes the child from its previous parent first, so a node is
    /// never listed twice. Returns false (and changes nothing) when either
    /// node is missing, when `child == parent`, or when the attachment would
    /// make `parent` its own descendant.
    pub fn add_child(&mut self, parent: NodeID, child: NodeID, index: Option<usize>) -> bool {
        if child == parent || !self.nodes.contains(parent) || !self.nodes.contains(child) {
            return false;
        }
        if self.is_descendant_of(parent, child) {
            log::warn!("add_child: {child} is an ancestor of {parent}, refusing cycle");
            return false;
        }

        let old_parent = self.nodes.get(child).map(|n| n.parent).unwrap_or_default();
        if !old_parent.is_nil() {
            if let Some(old) = self.nodes.get_mut(old_parent) {
                old.children.retain(|&c| c != child);
            }
        }

        let parent_node = self.nodes.get_mut(parent).expect("checked above");
        let at = index
            .unwrap_or(parent_node.children.len())
            .min(parent_node.children.len());
        parent_node.children.insert(at, child);
        self.nodes.get_mut(child).expect("checked above").parent = parent;
        true
    }

    /// Reparent `child` under `parent` at `index`.
    pub fn set_parent(&mut self, child: NodeID, parent: NodeID, index: Option<usize>) -> bool {
        self.add_child(parent, child, index)
    }

    /// Unlink `child` from `parent`'s child list. Returns false and is a
    /// no-op when `child` is not currently a child of `parent`. The child
    /// survives as an unparented root.
    pub fn remove_child(&mut self, parent: NodeID, child: NodeID) -> bool {
        let is_child = self
            .nodes
            .get(child)
            .map(|n| n.parent == parent)
            .unwrap_or(false);
        if !is_child {
            return false;
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = NodeID::nil();
        }
        true
    }

    /// Orphan every child of `parent`; the children are not destroyed.
    pub fn clear_children(&mut self, parent: NodeID) {
        let children = match self.nodes.get_mut(parent) {
            Some(p) => std::mem::take(&mut p.children),
            None => return,
        };
        for child in children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = NodeID::nil();
            }
        }
    }

    /// Whether `node` sits somewhere below `ancestor` in the tree.
    pub fn is_descendant_of(&self, node: NodeID, ancestor: NodeID) -> bool {
        let mut cursor = self.nodes.get(node).map(|n| n.parent).unwrap_or_default();
        while !cursor.is_nil() {
            if cursor == ancestor {
                return true;
            }
            cursor = self.nodes.get(cursor).map(|n| n.parent).unwrap_or_default();
        }
        false
    }

    /// Destroy a node. Its slot in the parent's child list disappears, its
    /// children become unparented roots, and every transform link touching it
    /// is nulled on the surviving side.
    pub fn remove_node(&mut self, id: NodeID) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };

        if !node.parent.is_nil() {
            if let Some(p) = self.nodes.get_mut(node.parent) {
                p.children.retain(|&c| c != id);
            }
        }
        for child in &node.children {
            if let Some(c) = self.nodes.get_mut(*child) {
                c.parent = NodeID::nil();
            }
        }

        // Transform links: drop the reverse link on our ancestor, and detach
        // every dependent (their composed matrix collapses to local).
        if node.base.has_ancestor_link() {
            if let Some(a) = self.nodes.get_mut(node.base.apply_transformation) {
                a.base.dependents.retain(|d| *d != id);
            }
        }
        for dep in node.base.dependents.iter().copied() {
            if let Some(d) = self.nodes.get_mut(dep) {
                d.base.apply_transformation = NodeID::nil();
                d.base.recompose(Mat4::IDENTITY);
            }
            self.propagate_composed(dep);
        }
    }

    // ---------------- transforms ----------------

    fn ancestor_matrix(&self, id: NodeID) -> Mat4 {
        let link = self
            .nodes
            .get(id)
            .map(|n| n.base.apply_transformation)
            .unwrap_or_default();
        if link.is_nil() {
            Mat4::IDENTITY
        } else {
            self.nodes
                .get(link)
                .map(|a| a.base.composed_matrix())
                .unwrap_or(Mat4::IDENTITY)
        }
    }

    /// Push this node's composed matrix through its dependents, depth-first.
    /// Cycles in the link graph are a contract violation and are not detected.
    fn propagate_composed(&mut self, id: NodeID) {
        let mut stack: Vec<NodeID> = self
            .nodes
            .get(id)
            .map(|n| n.base.dependents.to_vec())
            .unwrap_or_default();
        while let Some(dep) = stack.pop() {
            let ancestor = self.ancestor_matrix(dep);
            let Some(node) = self.nodes.get_mut(dep) else {
                continue;
            };
            node.base.recompose(ancestor);
            stack.extend(node.base.dependents.iter().copied());
        }
    }

    pub fn set_position(&mut self, id: NodeID, position: Vector3) {
        let ancestor = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.set_position(position, ancestor);
            self.propagate_composed(id);
        }
    }

    pub fn set_rotation(&mut self, id: NodeID, rotation: Quaternion) {
        let ancestor = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.set_rotation(rotation, ancestor);
            self.propagate_composed(id);
        }
    }

    pub fn set_scale(&mut self, id: NodeID, scale: Vector3) {
        let ancestor = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.set_scale(scale, ancestor);
            self.propagate_composed(id);
        }
    }

    pub fn set_anchor(&mut self, id: NodeID, anchor: Anchor) {
        let ancestor = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.set_anchor(anchor, ancestor);
            self.propagate_composed(id);
        }
    }

    pub fn set_default_bounds(&mut self, id: NodeID, position: Vector3, size: Vector3) {
        let ancestor = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.set_default_bounds(position, size, ancestor);
            self.propagate_composed(id);
        }
    }

    /// Link `id`'s matrix composition to `ancestor` (nil to detach). Both
    /// sides of the old and new links are kept consistent. Linking a node to
    /// its own transitive dependent is forbidden by contract.
    pub fn set_apply_transformation(&mut self, id: NodeID, ancestor: NodeID) {
        if !self.nodes.contains(id) || (!ancestor.is_nil() && !self.nodes.contains(ancestor)) {
            log::warn!("set_apply_transformation: dead handle ({id} -> {ancestor})");
            return;
        }
        if ancestor == id {
            log::warn!("set_apply_transformation: {id} cannot compose with itself");
            return;
        }

        let old = self
            .nodes
            .get(id)
            .map(|n| n.base.apply_transformation)
            .unwrap_or_default();
        if !old.is_nil() {
            if let Some(a) = self.nodes.get_mut(old) {
                a.base.dependents.retain(|d| *d != id);
            }
        }
        if !ancestor.is_nil() {
            if let Some(a) = self.nodes.get_mut(ancestor) {
                a.base.dependents.push(id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.apply_transformation = ancestor;
        }

        let matrix = self.ancestor_matrix(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.base.recompose(matrix);
        }
        self.propagate_composed(id);
    }

    /// World-space matrix of the node; identity for dead handles.
    pub fn composed_matrix(&self, id: NodeID) -> Mat4 {
        self.nodes
            .get(id)
            .map(|n| n.base.composed_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    // ---------------- per-frame traversal ----------------

    /// Pre-draw pass: walk the tree from the root in child order, run each
    /// node's update hook and register visible, materialed drawables with the
    /// target. Registration order is the paint order for overlay elements;
    /// depth testing resolves 3D visibility independently of it.
    pub fn update(&mut self, target: &mut RenderTarget) {
        self.update_subtree(self.root, target);
    }

    fn update_subtree(&mut self, id: NodeID, target: &mut RenderTarget) {
        let children = {
            let Some(node) = self.nodes.get_mut(id) else {
                return;
            };
            node.on_update();
            if node.is_drawable() {
                target.add_to_draw(DrawCommand {
                    node: id,
                    material: node.material,
                    mesh: node.mesh().expect("drawable implies mesh"),
                    model: node.base.composed_matrix(),
                });
            }
            node.children.clone()
        };
        for child in children {
            self.update_subtree(child, target);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MaterialID, MeshID};
    use crate::nodes::scene_node::MeshInstance;

    fn scene_with_chain() -> (Scene, NodeID, NodeID, NodeID) {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_named(root, "a", SceneNodeData::Node);
        let b = scene.spawn_named(root, "b", SceneNodeData::Node);
        let c = scene.spawn_named(root, "c", SceneNodeData::Node);
        scene.set_apply_transformation(b, a);
        scene.set_apply_transformation(c, b);
        (scene, a, b, c)
    }

    #[test]
    fn composed_matrix_is_ordered_product_of_locals() {
        let (mut scene, a, b, c) = scene_with_chain();
        scene.set_position(a, Vector3::new(1.0, 0.0, 0.0));
        scene.set_rotation(
            b,
            Quaternion::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), 0.7),
        );
        scene.set_scale(c, Vector3::new(2.0, 3.0, 1.0));

        let la = scene.get(a).unwrap().base.local_matrix();
        let lb = scene.get(b).unwrap().base.local_matrix();
        let lc = scene.get(c).unwrap().base.local_matrix();

        let expect = la * lb * lc;
        assert!(scene.composed_matrix(c).abs_diff_eq(expect, 1e-6));

        // Order matters: the reversed product differs.
        let reversed = lc * lb * la;
        assert!(!scene.composed_matrix(c).abs_diff_eq(reversed, 1e-6));
    }

    #[test]
    fn setter_on_ancestor_reaches_transitive_dependents() {
        let (mut scene, a, _b, c) = scene_with_chain();
        scene.set_position(c, Vector3::new(0.0, 1.0, 0.0));
        scene.set_position(a, Vector3::new(5.0, 0.0, 0.0));
        let p = scene
            .composed_matrix(c)
            .transform_point3(glam::Vec3::ZERO);
        assert_eq!(p, glam::Vec3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn detach_restores_local_matrix() {
        let (mut scene, a, b, _c) = scene_with_chain();
        scene.set_position(a, Vector3::new(9.0, 0.0, 0.0));
        scene.set_position(b, Vector3::new(1.0, 0.0, 0.0));
        scene.set_apply_transformation(b, NodeID::nil());
        assert_eq!(
            scene.composed_matrix(b),
            scene.get(b).unwrap().base.local_matrix()
        );
        // Dependents of the old ancestor no longer mention b.
        assert!(!scene.get(a).unwrap().base.dependents.contains(&b));
    }

    #[test]
    fn child_lives_in_exactly_one_parent_list() {
        let mut scene = Scene::new();
        let root = scene.root();
        let p1 = scene.spawn_named(root, "p1", SceneNodeData::Node);
        let p2 = scene.spawn_named(root, "p2", SceneNodeData::Node);
        let child = scene.spawn_named(p1, "child", SceneNodeData::Node);

        assert!(scene.set_parent(child, p2, Some(0)));
        assert!(!scene.get(p1).unwrap().children.contains(&child));
        assert_eq!(scene.get(p2).unwrap().children, vec![child]);
        assert_eq!(scene.get(child).unwrap().parent, p2);
    }

    #[test]
    fn remove_child_on_non_child_is_a_noop() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_named(root, "a", SceneNodeData::Node);
        let b = scene.spawn_named(root, "b", SceneNodeData::Node);
        assert!(!scene.remove_child(a, b));
        assert!(scene.remove_child(root, b));
        assert!(!scene.is_descendant_of(b, root));
        assert!(!scene.remove_child(root, b));
    }

    #[test]
    fn reparenting_refuses_cycles() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_named(root, "a", SceneNodeData::Node);
        let b = scene.spawn_named(a, "b", SceneNodeData::Node);
        assert!(!scene.set_parent(a, b, None));
        assert_eq!(scene.get(a).unwrap().parent, root);
    }

    #[test]
    fn destroy_orphans_children_and_detaches_links() {
        let (mut scene, a, b, c) = scene_with_chain();
        let child = scene.spawn_named(b, "leaf", SceneNodeData::Node);
        scene.set_position(a, Vector3::new(3.0, 0.0, 0.0));
        scene.remove_node(b);

        assert!(scene.get(b).is_none());
        // Tree side: leaf is orphaned, not destroyed.
        assert!(scene.get(child).is_some());
        assert!(scene.get(child).unwrap().parent.is_nil());
        // Transform side: c no longer composes with anything.
        assert!(scene.get(c).unwrap().base.apply_transformation.is_nil());
        assert_eq!(
            scene.composed_matrix(c),
            scene.get(c).unwrap().base.local_matrix()
        );
        assert!(!scene.get(a).unwrap().base.dependents.contains(&b));
    }

    #[test]
    fn update_registers_drawables_in_tree_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mesh = MeshID::new();
        let mat = MaterialID::new();

        let mut first = SceneNode::named("first", SceneNodeData::Mesh(MeshInstance { mesh }));
        first.material = mat;
        let mut second = SceneNode::named("second", SceneNodeData::Mesh(MeshInstance { mesh }));
        second.material = mat;
        let mut hidden = SceneNode::named("hidden", SceneNodeData::Mesh(MeshInstance { mesh }));
        hidden.material = mat;
        hidden.visible = false;

        let first = scene.spawn(root, first);
        let _hidden = scene.spawn(first, hidden);
        let second = scene.spawn(root, second);

        let mut target = RenderTarget::new(64, 64);
        scene.update(&mut target);
        let order: Vec<NodeID> = target.draw_list().iter().map(|c| c.node).collect();
        assert_eq!(order, vec![first, second]);
    }
}
