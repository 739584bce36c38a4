pub mod dataset;
pub mod ids;
pub mod node_arena;
pub mod nodes;
pub mod rendering;
pub mod scene;
pub mod scivis;
pub mod structs;
pub mod tf;
pub mod worker;

pub use dataset::{Dataset, FieldChannel};
pub use ids::{MaterialID, MeshID, NodeID, TextureID};
pub use node_arena::NodeArena;
pub use nodes::*;
pub use rendering::{
    Camera3D, ColorMaterial, DrawCommand, FboRenderTarget, GraphicsContext, GridMaterial,
    Material, MaterialKind, MaterialRegistry, PhongMaterial, PointsMaterial, RenderTarget,
    ShaderKind, TexturedMaterial, TransferMaterial,
};
pub use scene::Scene;
pub use scivis::SciVis;
pub use structs::*;
pub use tf::{
    ColorMode, DirectTransfer, GaussianTransfer, TransferFunction, TransferFunctionKind,
    TriangularGaussianTransfer,
};
pub use worker::{ColorBuffer, ColorMailbox, ColorRecomputeWorker};
