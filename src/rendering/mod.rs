pub mod graphics;
pub mod material;
pub mod mesh;
pub mod render_target;

pub use graphics::GraphicsContext;
pub use material::{
    ColorMaterial, GridMaterial, Material, MaterialKind, MaterialRegistry, PhongMaterial,
    PointsMaterial, ShaderKind, TexturedMaterial, TransferMaterial,
};
pub use mesh::{GpuMesh, MeshRegistry, Vertex3D};
pub use render_target::{Camera3D, DrawCommand, FboRenderTarget, RenderTarget};

use thiserror::Error;

/// Resource-level rendering failures. Logged and recovered from by leaving
/// the owning object unusable; only engine assembly treats them as fatal.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(String),

    #[error("device request failed: {0}")]
    DeviceUnavailable(String),

    #[error("offscreen buffer creation failed: {0}")]
    OffscreenCreation(String),

    #[error("texture creation failed: {0}")]
    TextureCreation(String),

    #[error("readback failed: {0}")]
    Readback(String),
}
