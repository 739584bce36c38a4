pub mod scene_node;
pub mod transform_node;

pub use scene_node::{MeshInstance, PointCloud, SceneNode, SceneNodeData};
pub use transform_node::TransformNode;
