//! Materials: the association between a shader pipeline and the per-draw
//! uniform state written while binding.
//!
//! Binding happens during draw-list execution: the pipeline is switched only
//! when the incoming material's shader differs from the active one, then the
//! material's uniform block (base matrices plus kind-specific values) is
//! selected via a dynamic offset. A material whose pipeline or texture is
//! missing logs an error and leaves GPU state untouched.

use bytemuck::{Pod, Zeroable};
use enum_dispatch::enum_dispatch;
use glam::Mat4;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{MaterialID, TextureID};
use crate::structs::Color;

/// Pipeline selector. One GPU program per variant; transfer-function
/// sampling splits by LUT dimensionality because the texture binding type
/// differs.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Color,
    Phong,
    Grid,
    Textured,
    Points,
    Transfer1D,
    Transfer2D,
    Transfer3D,
}

/// Per-draw uniform block, written at a 256-byte aligned dynamic offset.
/// Layout mirrors `ObjectData` in `shaders/scivis.wgsl`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub mvp: [[f32; 4]; 4],
    pub inv_mvp: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x: point size, y: grid spacing, z: TF LUT dimensionality, w: shininess.
    pub params: [f32; 4],
}

impl ObjectUniform {
    pub fn from_matrices(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        let mvp = projection * view * model;
        Self {
            model: model.to_cols_array_2d(),
            mvp: mvp.to_cols_array_2d(),
            inv_mvp: mvp.inverse().to_cols_array_2d(),
            color: [1.0, 1.0, 1.0, 1.0],
            params: [1.0, 1.0, 0.0, 32.0],
        }
    }
}

#[enum_dispatch]
pub trait Material {
    fn shader(&self) -> ShaderKind;

    /// LUT or image texture this material samples, if any.
    fn texture(&self) -> Option<TextureID> {
        None
    }

    /// Write the kind-specific tail of the uniform block.
    fn fill_uniform(&self, uniform: &mut ObjectUniform);
}

#[enum_dispatch(Material)]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum MaterialKind {
    Color(ColorMaterial),
    Phong(PhongMaterial),
    Grid(GridMaterial),
    Textured(TexturedMaterial),
    Points(PointsMaterial),
    Transfer(TransferMaterial),
}

/// Flat single-color surface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ColorMaterial {
    pub color: Color,
}

impl Material for ColorMaterial {
    fn shader(&self) -> ShaderKind {
        ShaderKind::Color
    }

    fn fill_uniform(&self, uniform: &mut ObjectUniform) {
        uniform.color = self.color.to_array();
    }
}

/// Headlight-lit surface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhongMaterial {
    pub color: Color,
    pub shininess: f32,
}

impl Material for PhongMaterial {
    fn shader(&self) -> ShaderKind {
        ShaderKind::Phong
    }

    fn fill_uniform(&self, uniform: &mut ObjectUniform) {
        uniform.color = self.color.to_array();
        uniform.params[3] = self.shininess;
    }
}

/// Surface with world-space grid lines every `spacing` units.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GridMaterial {
    pub color: Color,
    pub spacing: f32,
}

impl Material for GridMaterial {
    fn shader(&self) -> ShaderKind {
        ShaderKind::Grid
    }

    fn fill_uniform(&self, uniform: &mut ObjectUniform) {
        uniform.color = self.color.to_array();
        uniform.params[1] = self.spacing;
    }
}

/// Image-textured surface (uv sampled).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TexturedMaterial {
    pub texture: TextureID,
}

impl Material for TexturedMaterial {
    fn shader(&self) -> ShaderKind {
        ShaderKind::Textured
    }

    fn texture(&self) -> Option<TextureID> {
        Some(self.texture)
    }

    fn fill_uniform(&self, _uniform: &mut ObjectUniform) {}
}

/// Point-cloud rendering; color comes from the per-point attribute buffer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PointsMaterial {
    pub point_size: f32,
}

impl Material for PointsMaterial {
    fn shader(&self) -> ShaderKind {
        ShaderKind::Points
    }

    fn fill_uniform(&self, uniform: &mut ObjectUniform) {
        uniform.params[0] = self.point_size;
    }
}

/// Transfer-function sampling material: binds a generated LUT texture and
/// tells the shader its dimensionality.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransferMaterial {
    pub texture: TextureID,
    pub dimensions: u32,
}

impl TransferMaterial {
    pub fn new(texture: TextureID, dimensions: u32) -> Self {
        Self {
            texture,
            dimensions: dimensions.clamp(1, 3),
        }
    }
}

impl Material for TransferMaterial {
    fn shader(&self) -> ShaderKind {
        match self.dimensions {
            1 => ShaderKind::Transfer1D,
            2 => ShaderKind::Transfer2D,
            _ => ShaderKind::Transfer3D,
        }
    }

    fn texture(&self) -> Option<TextureID> {
        Some(self.texture)
    }

    fn fill_uniform(&self, uniform: &mut ObjectUniform) {
        uniform.params[2] = self.dimensions as f32;
    }
}

/// Materials live outside the scene tree and outlive the nodes referencing
/// them; nodes hold plain [`MaterialID`]s.
pub struct MaterialRegistry {
    materials: FxHashMap<MaterialID, MaterialKind>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self {
            materials: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, material: MaterialKind) -> MaterialID {
        let id = MaterialID::new();
        self.materials.insert(id, material);
        id
    }

    pub fn get(&self, id: MaterialID) -> Option<&MaterialKind> {
        self.materials.get(&id)
    }

    pub fn get_mut(&mut self, id: MaterialID) -> Option<&mut MaterialKind> {
        self.materials.get_mut(&id)
    }

    pub fn remove(&mut self, id: MaterialID) -> bool {
        self.materials.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_material_picks_pipeline_by_dimensionality() {
        let tex = TextureID::new();
        assert_eq!(
            TransferMaterial::new(tex, 1).shader(),
            ShaderKind::Transfer1D
        );
        assert_eq!(
            TransferMaterial::new(tex, 2).shader(),
            ShaderKind::Transfer2D
        );
        assert_eq!(
            TransferMaterial::new(tex, 3).shader(),
            ShaderKind::Transfer3D
        );
        // Out-of-range dimensionality clamps instead of inventing a pipeline.
        assert_eq!(
            TransferMaterial::new(tex, 9).shader(),
            ShaderKind::Transfer3D
        );
    }

    #[test]
    fn uniform_carries_kind_specific_params() {
        let mut u = ObjectUniform::from_matrices(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY);
        GridMaterial {
            color: Color::rgb(10, 20, 30),
            spacing: 2.5,
        }
        .fill_uniform(&mut u);
        assert_eq!(u.params[1], 2.5);
        assert!((u.color[0] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn mvp_inverse_round_trips() {
        let model = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::look_at_rh(
            glam::Vec3::new(0.0, 0.0, 5.0),
            glam::Vec3::ZERO,
            glam::Vec3::Y,
        );
        let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        let u = ObjectUniform::from_matrices(model, view, proj);
        let mvp = Mat4::from_cols_array_2d(&u.mvp);
        let inv = Mat4::from_cols_array_2d(&u.inv_mvp);
        assert!((mvp * inv).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn registry_hands_out_stable_ids() {
        let mut reg = MaterialRegistry::new();
        let id = reg.register(MaterialKind::Color(ColorMaterial {
            color: Color::WHITE,
        }));
        assert!(reg.get(id).is_some());
        assert!(reg.remove(id));
        assert!(reg.get(id).is_none());
    }
}
