//! Arena-based storage for scene nodes.
//!
//! Nodes are addressed by stable [`NodeID`] handles instead of pointers, so
//! parent/ancestor/dependent links can never dangle: a dead handle simply
//! resolves to `None`. IDs are issued sequentially with 0 reserved as nil,
//! which lets the ID double as a slot index.

use crate::ids::NodeID;
use crate::nodes::scene_node::SceneNode;

pub struct NodeArena {
    slots: Vec<Option<SceneNode>>,
    live: u32,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    fn slot_index(id: NodeID) -> Option<usize> {
        if id.is_nil() {
            return None;
        }
        Some(id.as_u32() as usize - 1)
    }

    /// Insert a node under its own `id`. The slot must be free; a collision
    /// means an ID was reused and is a logic error.
    pub fn insert(&mut self, node: SceneNode) -> NodeID {
        let id = node.id;
        let idx = Self::slot_index(id).expect("NodeArena::insert: nil node id");
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        assert!(
            self.slots[idx].is_none(),
            "NodeArena::insert: slot already occupied (id={id})"
        );
        self.slots[idx] = Some(node);
        self.live += 1;
        id
    }

    #[inline]
    pub fn get(&self, id: NodeID) -> Option<&SceneNode> {
        self.slots.get(Self::slot_index(id)?)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeID) -> Option<&mut SceneNode> {
        self.slots.get_mut(Self::slot_index(id)?)?.as_mut()
    }

    /// Remove a node, leaving a hole. Link cleanup is the caller's job
    /// (see `Scene::remove_node`).
    #[inline]
    pub fn remove(&mut self, id: NodeID) -> Option<SceneNode> {
        let slot = self.slots.get_mut(Self::slot_index(id)?)?;
        let out = slot.take()?;
        self.live -= 1;
        Some(out)
    }

    #[inline]
    pub fn contains(&self, id: NodeID) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeID, &SceneNode)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|node| (node.id, node)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeID, &mut SceneNode)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|node| (node.id, node)))
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::scene_node::SceneNodeData;

    fn make_node() -> SceneNode {
        let mut node = SceneNode::new(SceneNodeData::Node);
        node.id = NodeID::new();
        node
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let mut arena = NodeArena::new();
        let id = arena.insert(make_node());
        assert!(arena.contains(id));
        assert_eq!(arena.len(), 1);
        assert!(arena.remove(id).is_some());
        assert!(!arena.contains(id));
        assert!(arena.is_empty());
    }

    #[test]
    fn dead_handle_resolves_to_none() {
        let mut arena = NodeArena::new();
        let id = arena.insert(make_node());
        arena.remove(id);
        assert!(arena.get(id).is_none());
        assert!(arena.get_mut(id).is_none());
        assert!(arena.get(NodeID::nil()).is_none());
    }
}
