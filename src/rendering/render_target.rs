//! Render targets: per-target camera state, the accumulated draw list, and
//! the offscreen (FBO) variant with snapshot readback.
//!
//! `update` traversals register draw commands; `render` replays them in
//! registration order against the target's camera, switching pipelines only
//! at material boundaries, then clears the list. The offscreen variant scopes
//! its redirection to the duration of `render`, so the previously bound
//! destination is untouched afterwards.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use crate::ids::{MaterialID, MeshID, NodeID, TextureID};
use crate::rendering::RenderError;
use crate::rendering::graphics::{CameraUniform, GraphicsContext, OBJECT_SLOT_STRIDE};
use crate::rendering::material::{Material, MaterialRegistry, ObjectUniform, ShaderKind};
use crate::structs::Transform3D;

/// Camera state owned by a render target. View derives from the transform,
/// projection from fov/near/far and the target's aspect ratio.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Camera3D {
    pub transform: Transform3D,
    /// Field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera3D {
    fn default() -> Self {
        Self {
            transform: Transform3D::IDENTITY,
            fov: 70.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera3D {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(
            self.transform.rotation.to_glam(),
            self.transform.position.to_glam(),
        )
        .inverse()
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect_ratio, self.near, self.far)
    }
}

/// One registered drawable: everything `draw` needs, captured at update time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub node: NodeID,
    pub material: MaterialID,
    pub mesh: MeshID,
    pub model: Mat4,
}

pub struct RenderTarget {
    pub camera: Camera3D,
    pub clear_color: wgpu::Color,
    draw_list: Vec<DrawCommand>,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            camera: Camera3D::default(),
            clear_color: wgpu::Color::BLACK,
            draw_list: Vec::new(),
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn add_to_draw(&mut self, command: DrawCommand) {
        self.draw_list.push(command);
    }

    pub fn draw_list(&self) -> &[DrawCommand] {
        &self.draw_list
    }

    pub fn clear_draw_list(&mut self) {
        self.draw_list.clear();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.camera.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.camera.projection_matrix(self.aspect_ratio())
    }

    /// Replay the accumulated draw list into the given attachments, then
    /// clear it. The host hands in the views when drawing to its surface;
    /// [`FboRenderTarget::render`] wraps this for offscreen drawing.
    pub fn render(
        &mut self,
        gfx: &mut GraphicsContext,
        materials: &MaterialRegistry,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) {
        let commands = std::mem::take(&mut self.draw_list);

        let view = self.view_matrix();
        let projection = self.projection_matrix();
        let p = self.camera.transform.position;
        gfx.write_camera(&CameraUniform {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            position: [p.x, p.y, p.z, 1.0],
        });

        gfx.ensure_object_slots(commands.len());
        let prepared = prepare_draws(gfx, materials, &commands, view, projection);

        let mut encoder = gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Target Encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Target Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            execute_draws(gfx, &prepared, &mut rpass);
        }
        gfx.queue.submit(Some(encoder.finish()));
    }
}

struct PreparedDraw {
    shader: ShaderKind,
    texture: Option<TextureID>,
    mesh: MeshID,
    slot: u32,
}

/// Resolve materials, write per-draw uniform slots and drop commands that
/// cannot be drawn (missing material, pipeline or texture) with a log line.
fn prepare_draws(
    gfx: &GraphicsContext,
    materials: &MaterialRegistry,
    commands: &[DrawCommand],
    view: Mat4,
    projection: Mat4,
) -> Vec<PreparedDraw> {
    let mut prepared = Vec::with_capacity(commands.len());
    for command in commands {
        let Some(material) = materials.get(command.material) else {
            log::error!(
                "node {} references missing material {}, skipping draw",
                command.node,
                command.material
            );
            continue;
        };
        let shader = material.shader();
        if gfx.pipeline(shader).is_none() {
            log::error!("material {} has no shader pipeline, skipping draw", command.material);
            continue;
        }
        let texture = material.texture();
        if let Some(tex) = texture {
            if gfx.texture_bind_group(tex).is_none() {
                log::error!(
                    "material {} references missing texture {tex}, skipping draw",
                    command.material
                );
                continue;
            }
        }

        let slot = prepared.len() as u32;
        let mut uniform = ObjectUniform::from_matrices(command.model, view, projection);
        material.fill_uniform(&mut uniform);
        gfx.write_object_slot(slot as usize, &uniform);
        prepared.push(PreparedDraw {
            shader,
            texture,
            mesh: command.mesh,
            slot,
        });
    }
    prepared
}

/// Issue the draws. The GPU program switches at most once per run of equal
/// materials; everything else is bind-group and vertex-buffer traffic.
fn execute_draws(gfx: &GraphicsContext, prepared: &[PreparedDraw], rpass: &mut wgpu::RenderPass) {
    let mut active_shader: Option<ShaderKind> = None;
    rpass.set_bind_group(0, gfx.camera_bind_group(), &[]);

    for draw in prepared {
        let Some(mesh) = gfx.meshes.get(draw.mesh) else {
            log::error!("draw references missing mesh {}, skipping", draw.mesh);
            continue;
        };

        if active_shader != Some(draw.shader) {
            // Pipelines were checked during prepare.
            rpass.set_pipeline(gfx.pipeline(draw.shader).expect("pipeline exists"));
            active_shader = Some(draw.shader);
        }
        rpass.set_bind_group(
            1,
            gfx.object_bind_group(),
            &[draw.slot * OBJECT_SLOT_STRIDE as u32],
        );
        if let Some(tex) = draw.texture {
            rpass.set_bind_group(2, gfx.texture_bind_group(tex).expect("checked"), &[]);
        }

        rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        if let Some(colors) = &mesh.color_buffer {
            rpass.set_vertex_buffer(1, colors.slice(..));
        }
        if let Some(index_buffer) = &mesh.index_buffer {
            rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
        } else {
            rpass.draw(0..mesh.vertex_count, 0..1);
        }
    }
}

struct OffscreenBuffers {
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

/// Offscreen render target. Drawing is redirected into its own color/depth
/// textures for the duration of `render`; `snapshot` reads the color buffer
/// back as tight RGBA bytes.
pub struct FboRenderTarget {
    pub target: RenderTarget,
    buffers: Option<OffscreenBuffers>,
}

impl FboRenderTarget {
    /// Creation runs inside a validation error scope; on driver failure the
    /// target stays alive but unusable (`has_buffer() == false`) and every
    /// render/snapshot is a logged no-op.
    pub fn new(gfx: &GraphicsContext, width: u32, height: u32) -> Self {
        let target = RenderTarget::new(width, height);
        let (width, height) = target.viewport();

        gfx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color_texture = gfx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("FBO Color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gfx.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_texture = gfx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("FBO Depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let error = pollster::block_on(gfx.device.pop_error_scope());

        let buffers = match error {
            Some(e) => {
                log::error!("offscreen buffer creation failed: {e}");
                None
            }
            None => {
                let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
                let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
                Some(OffscreenBuffers {
                    color_texture,
                    color_view,
                    _depth_texture: depth_texture,
                    depth_view,
                })
            }
        };

        Self { target, buffers }
    }

    /// Whether the offscreen attachments exist. Callers must check before
    /// relying on render output.
    pub fn has_buffer(&self) -> bool {
        self.buffers.is_some()
    }

    /// Render the accumulated draw list into the offscreen buffer. Without a
    /// buffer the list is discarded so it cannot grow unboundedly.
    pub fn render(&mut self, gfx: &mut GraphicsContext, materials: &MaterialRegistry) {
        let Some(buffers) = self.buffers.as_ref() else {
            log::warn!("FBO target unusable, dropping {} draws", self.target.draw_list().len());
            self.target.clear_draw_list();
            return;
        };
        self.target
            .render(gfx, materials, &buffers.color_view, &buffers.depth_view);
    }

    /// Read the color attachment back into a tight `width * height * 4` RGBA
    /// buffer. Not part of the steady-state draw loop.
    pub fn snapshot(&self, gfx: &GraphicsContext) -> anyhow::Result<Vec<u8>> {
        let Some(buffers) = self.buffers.as_ref() else {
            return Err(RenderError::Readback("offscreen buffer was never created".into()).into());
        };
        let (width, height) = self.target.viewport();

        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let buffer_size = padded_bytes_per_row as u64 * height as u64;

        let staging = gfx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Snapshot Staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Snapshot Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &buffers.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        gfx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = gfx.device.poll(wgpu::PollType::wait_indefinitely());
        receiver
            .recv()
            .map_err(|_| RenderError::Readback("map_async callback dropped".into()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut tight = vec![0u8; (unpadded_bytes_per_row * height) as usize];
        for row in 0..height as usize {
            let src = row * padded_bytes_per_row as usize;
            let dst = row * unpadded_bytes_per_row as usize;
            tight[dst..dst + unpadded_bytes_per_row as usize]
                .copy_from_slice(&data[src..src + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        staging.unmap();

        Ok(tight)
    }
}

impl Deref for FboRenderTarget {
    type Target = RenderTarget;

    fn deref(&self) -> &Self::Target {
        &self.target
    }
}

impl DerefMut for FboRenderTarget {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Vector3;

    #[test]
    fn draw_list_preserves_insertion_order_and_clears() {
        let mut target = RenderTarget::new(128, 64);
        let a = DrawCommand {
            node: NodeID::new(),
            material: MaterialID::new(),
            mesh: MeshID::new(),
            model: Mat4::IDENTITY,
        };
        let b = DrawCommand {
            node: NodeID::new(),
            material: a.material,
            mesh: a.mesh,
            model: Mat4::from_translation(glam::Vec3::X),
        };
        target.add_to_draw(a);
        target.add_to_draw(b);
        assert_eq!(target.draw_list(), &[a, b]);
        target.clear_draw_list();
        assert!(target.draw_list().is_empty());
    }

    #[test]
    fn viewport_never_degenerates() {
        let mut target = RenderTarget::new(0, 0);
        assert_eq!(target.viewport(), (1, 1));
        target.set_viewport(800, 0);
        assert_eq!(target.viewport(), (800, 1));
    }

    #[test]
    fn camera_view_inverts_its_transform() {
        let mut camera = Camera3D::default();
        camera.transform.position = Vector3::new(0.0, 0.0, 5.0);
        let eye = camera
            .view_matrix()
            .transform_point3(glam::Vec3::new(0.0, 0.0, 5.0));
        assert!(eye.length() < 1e-6, "camera position maps to the origin");
    }
}
