//! GPU context: device/queue acquisition, the pipeline library, shared bind
//! group layouts, the per-draw uniform ring and transfer-function texture
//! objects.
//!
//! The context never touches a window surface; targets are offscreen (see
//! [`crate::rendering::render_target::FboRenderTarget`]) or externally
//! provided texture views. All methods must be called from the render thread,
//! the only thread allowed to issue GPU work.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBinding, BufferBindingType,
    BufferDescriptor, BufferSize, BufferUsages, Device, PrimitiveTopology, Queue, RenderPipeline,
    SamplerBindingType, ShaderModuleDescriptor, ShaderSource, ShaderStages, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureViewDimension,
};

use crate::ids::TextureID;
use crate::rendering::RenderError;
use crate::rendering::material::{ObjectUniform, ShaderKind};
use crate::rendering::mesh::{MeshRegistry, Vertex3D};

/// Per-target camera block; layout mirrors `Camera` in `scivis.wgsl`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

const CAMERA_UNIFORM_SIZE: u64 = std::mem::size_of::<CameraUniform>() as u64;
const OBJECT_UNIFORM_SIZE: u64 = std::mem::size_of::<ObjectUniform>() as u64;
/// Dynamic-offset stride; uniform offsets must be 256-byte aligned.
pub const OBJECT_SLOT_STRIDE: u64 = 256;

/// A generated transfer-function LUT living on the GPU, 1-3 dimensional.
pub struct TfTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: BindGroup,
    pub dimensions: u32,
    pub size: [u32; 3],
}

pub struct GraphicsContext {
    pub adapter: wgpu::Adapter,
    pub device: Device,
    pub queue: Queue,
    /// Color format of offscreen targets.
    pub format: TextureFormat,

    pub meshes: MeshRegistry,

    camera_buffer: Buffer,
    camera_bind_group: BindGroup,

    object_buffer: Buffer,
    object_bind_group: BindGroup,
    object_bgl: BindGroupLayout,
    object_capacity: u32,

    tex_bgls: [BindGroupLayout; 3],
    sampler: wgpu::Sampler,
    textures: FxHashMap<TextureID, TfTexture>,

    pipelines: FxHashMap<ShaderKind, RenderPipeline>,
}

impl GraphicsContext {
    /// Acquire a device without a surface. Used both by the engine host and
    /// by snapshot/thumbnail tooling.
    pub fn new_headless() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .map_err(|e| RenderError::AdapterUnavailable(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("aster device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| RenderError::DeviceUnavailable(e.to_string()))?;

        log::info!("graphics context on {:?}", adapter.get_info().name);
        Ok(Self::from_device(adapter, device, queue, TextureFormat::Rgba8Unorm))
    }

    pub fn from_device(
        adapter: wgpu::Adapter,
        device: Device,
        queue: Queue,
        format: TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("SciVis Shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/scivis.wgsl"))),
        });

        // Camera (group 0)
        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Camera UBO"),
            size: CAMERA_UNIFORM_SIZE,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: BufferSize::new(CAMERA_UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let camera_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &camera_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &camera_buffer,
                    offset: 0,
                    size: BufferSize::new(CAMERA_UNIFORM_SIZE),
                }),
            }],
        });

        // Per-draw object ring (group 1, dynamic offset)
        let object_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Object BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: BufferSize::new(OBJECT_UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let object_capacity = 64u32;
        let (object_buffer, object_bind_group) =
            Self::make_object_ring(&device, &object_bgl, object_capacity);

        // Sampled textures (group 2), one layout per LUT dimensionality.
        let tex_bgls = [
            Self::make_texture_bgl(&device, 1, TextureViewDimension::D1),
            Self::make_texture_bgl(&device, 2, TextureViewDimension::D2),
            Self::make_texture_bgl(&device, 3, TextureViewDimension::D3),
        ];
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LUT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipelines = Self::build_pipelines(
            &device,
            &shader,
            format,
            &camera_bgl,
            &object_bgl,
            &tex_bgls,
        );

        Self {
            adapter,
            device,
            queue,
            format,
            meshes: MeshRegistry::new(),
            camera_buffer,
            camera_bind_group,
            object_buffer,
            object_bind_group,
            object_bgl,
            object_capacity,
            tex_bgls,
            sampler,
            textures: FxHashMap::default(),
            pipelines,
        }
    }

    fn make_object_ring(
        device: &Device,
        layout: &BindGroupLayout,
        capacity: u32,
    ) -> (Buffer, BindGroup) {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Object UBO Ring"),
            size: capacity as u64 * OBJECT_SLOT_STRIDE,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Object BG"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: BufferSize::new(OBJECT_UNIFORM_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn make_texture_bgl(
        device: &Device,
        dims: u32,
        view_dimension: TextureViewDimension,
    ) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: dims,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension,
                        sample_type: TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
            ],
        })
    }

    fn build_pipelines(
        device: &Device,
        shader: &wgpu::ShaderModule,
        format: TextureFormat,
        camera_bgl: &BindGroupLayout,
        object_bgl: &BindGroupLayout,
        tex_bgls: &[BindGroupLayout; 3],
    ) -> FxHashMap<ShaderKind, RenderPipeline> {
        let mesh_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }];
        let point_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Unorm8x4,
                }],
            },
        ];

        let base_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Base Pipeline Layout"),
            bind_group_layouts: &[camera_bgl, object_bgl],
            push_constant_ranges: &[],
        });
        let tex_layouts: Vec<wgpu::PipelineLayout> = tex_bgls
            .iter()
            .map(|bgl| {
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Textured Pipeline Layout"),
                    bind_group_layouts: &[camera_bgl, object_bgl, bgl],
                    push_constant_ranges: &[],
                })
            })
            .collect();

        fn make(
            device: &Device,
            shader: &wgpu::ShaderModule,
            format: TextureFormat,
            label: &str,
            layout: &wgpu::PipelineLayout,
            fs: &str,
            vs: &str,
            buffers: &[wgpu::VertexBufferLayout],
            topology: PrimitiveTopology,
        ) -> RenderPipeline {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some(vs),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        }

        let tri = PrimitiveTopology::TriangleList;
        let mesh_variants = [
            (ShaderKind::Color, "Color Pipeline", "fs_color", &base_layout),
            (ShaderKind::Phong, "Phong Pipeline", "fs_phong", &base_layout),
            (ShaderKind::Grid, "Grid Pipeline", "fs_grid", &base_layout),
            (ShaderKind::Textured, "Textured Pipeline", "fs_textured", &tex_layouts[1]),
            (ShaderKind::Transfer1D, "TF 1D Pipeline", "fs_transfer_1d", &tex_layouts[0]),
            (ShaderKind::Transfer2D, "TF 2D Pipeline", "fs_transfer_2d", &tex_layouts[1]),
            (ShaderKind::Transfer3D, "TF 3D Pipeline", "fs_transfer_3d", &tex_layouts[2]),
        ];

        let mut pipelines = FxHashMap::default();
        for (kind, label, fs, layout) in mesh_variants {
            pipelines.insert(
                kind,
                make(device, shader, format, label, layout, fs, "vs_mesh", &mesh_buffers, tri),
            );
        }
        pipelines.insert(
            ShaderKind::Points,
            make(
                device,
                shader,
                format,
                "Points Pipeline",
                &base_layout,
                "fs_points",
                "vs_points",
                &point_buffers,
                PrimitiveTopology::PointList,
            ),
        );
        pipelines
    }

    // ---------------- frame uniforms ----------------

    pub fn pipeline(&self, kind: ShaderKind) -> Option<&RenderPipeline> {
        self.pipelines.get(&kind)
    }

    pub fn camera_bind_group(&self) -> &BindGroup {
        &self.camera_bind_group
    }

    pub fn object_bind_group(&self) -> &BindGroup {
        &self.object_bind_group
    }

    pub fn write_camera(&self, uniform: &CameraUniform) {
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Grow the object ring to hold at least `count` draws this frame.
    pub fn ensure_object_slots(&mut self, count: usize) {
        let needed = count.max(1) as u32;
        if needed <= self.object_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        let (buffer, bind_group) = Self::make_object_ring(&self.device, &self.object_bgl, capacity);
        self.object_buffer = buffer;
        self.object_bind_group = bind_group;
        self.object_capacity = capacity;
    }

    /// Write the uniform block for draw slot `index`.
    pub fn write_object_slot(&self, index: usize, uniform: &ObjectUniform) {
        debug_assert!((index as u32) < self.object_capacity);
        self.queue.write_buffer(
            &self.object_buffer,
            index as u64 * OBJECT_SLOT_STRIDE,
            bytemuck::bytes_of(uniform),
        );
    }

    // ---------------- transfer-function textures ----------------

    /// Upload a generated LUT as a 1-3 dimensional GPU texture. `data` must
    /// hold exactly `4 * Π(sizes)` bytes (the generator's output contract).
    pub fn create_tf_texture(
        &mut self,
        sizes: &[u32],
        data: &[u8],
    ) -> Result<TextureID, RenderError> {
        let entry = self.make_tf_texture(sizes, data)?;
        let id = TextureID::new();
        self.textures.insert(id, entry);
        Ok(id)
    }

    /// Replace the contents of an existing LUT. Same extent writes in place;
    /// a changed extent recreates the texture under the same handle, so
    /// materials keep their references.
    pub fn update_tf_texture(
        &mut self,
        id: TextureID,
        sizes: &[u32],
        data: &[u8],
    ) -> Result<(), RenderError> {
        let same_extent = self
            .textures
            .get(&id)
            .is_some_and(|t| t.dimensions as usize == sizes.len() && {
                let mut size = [1u32; 3];
                size[..sizes.len()].copy_from_slice(sizes);
                t.size == size
            });
        if same_extent {
            let entry = &self.textures[&id];
            self.write_tf_texels(&entry.texture, entry.size, data);
            return Ok(());
        }
        let entry = self.make_tf_texture(sizes, data)?;
        self.textures.insert(id, entry);
        Ok(())
    }

    pub fn tf_texture(&self, id: TextureID) -> Option<&TfTexture> {
        self.textures.get(&id)
    }

    pub fn texture_bind_group(&self, id: TextureID) -> Option<&BindGroup> {
        self.textures.get(&id).map(|t| &t.bind_group)
    }

    pub fn remove_texture(&mut self, id: TextureID) -> bool {
        self.textures.remove(&id).is_some()
    }

    fn make_tf_texture(&self, sizes: &[u32], data: &[u8]) -> Result<TfTexture, RenderError> {
        let dims = sizes.len();
        if dims == 0 || dims > 3 || sizes.iter().any(|&s| s == 0) {
            return Err(RenderError::TextureCreation(format!(
                "unsupported LUT extent {sizes:?}"
            )));
        }
        let texel_count: u64 = sizes.iter().map(|&s| s as u64).product();
        if data.len() as u64 != texel_count * 4 {
            return Err(RenderError::TextureCreation(format!(
                "LUT data is {} bytes, extent {sizes:?} needs {}",
                data.len(),
                texel_count * 4
            )));
        }

        let mut size = [1u32; 3];
        size[..dims].copy_from_slice(sizes);
        let dimension = match dims {
            1 => TextureDimension::D1,
            2 => TextureDimension::D2,
            _ => TextureDimension::D3,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("TF LUT"),
            size: wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: size[2],
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.write_tf_texels(&texture, size, data);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("TF LUT BG"),
            layout: &self.tex_bgls[dims - 1],
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Sampler(&self.sampler),
                },
                BindGroupEntry {
                    binding: dims as u32,
                    resource: BindingResource::TextureView(&view),
                },
            ],
        });

        Ok(TfTexture {
            texture,
            view,
            bind_group,
            dimensions: dims as u32,
            size,
        })
    }

    fn write_tf_texels(&self, texture: &wgpu::Texture, size: [u32; 3], data: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size[0]),
                rows_per_image: Some(size[1]),
            },
            wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: size[2],
            },
        );
    }
}
