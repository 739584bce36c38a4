//! GPU geometry: vertex layouts, upload, and the handful of built-in
//! primitives the engine can draw without any external loader. Vertex and
//! index buffers arriving from mesh importers are consumed verbatim through
//! [`MeshRegistry::register_raw`].

use bytemuck::cast_slice;
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferUsages, Device, PrimitiveTopology, Queue};

use crate::ids::MeshID;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

pub struct GpuMesh {
    pub vertex_buffer: Buffer,
    pub index_buffer: Option<Buffer>,
    pub index_count: u32,
    pub vertex_count: u32,
    /// Per-point RGBA8 attribute buffer; only point clouds carry one. This is
    /// the upload destination for worker-recomputed colors.
    pub color_buffer: Option<Buffer>,
    pub topology: PrimitiveTopology,
}

pub struct MeshRegistry {
    meshes: FxHashMap<MeshID, GpuMesh>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self {
            meshes: FxHashMap::default(),
        }
    }

    pub fn get(&self, id: MeshID) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    pub fn register(&mut self, mesh: GpuMesh) -> MeshID {
        let id = MeshID::new();
        self.meshes.insert(id, mesh);
        id
    }

    pub fn remove(&mut self, id: MeshID) -> bool {
        self.meshes.remove(&id).is_some()
    }

    /// Upload loader-provided triangle geometry as-is.
    pub fn register_raw(
        &mut self,
        device: &Device,
        vertices: &[Vertex3D],
        indices: Option<&[u32]>,
    ) -> MeshID {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh VB"),
            contents: cast_slice(vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buffer = indices.map(|idx| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh IB"),
                contents: cast_slice(idx),
                usage: BufferUsages::INDEX,
            })
        });
        self.register(GpuMesh {
            vertex_buffer,
            index_count: indices.map(|i| i.len() as u32).unwrap_or(0),
            vertex_count: vertices.len() as u32,
            index_buffer,
            color_buffer: None,
            topology: PrimitiveTopology::TriangleList,
        })
    }

    /// Point-cloud geometry: positions plus an updatable RGBA8 color
    /// attribute, initially opaque white.
    pub fn register_point_cloud(&mut self, device: &Device, positions: &[[f32; 3]]) -> MeshID {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Points VB"),
            contents: cast_slice(positions),
            usage: BufferUsages::VERTEX,
        });
        let colors = vec![255u8; positions.len() * 4];
        let color_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Points Colors"),
            contents: &colors,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        });
        self.register(GpuMesh {
            vertex_buffer,
            index_buffer: None,
            index_count: 0,
            vertex_count: positions.len() as u32,
            color_buffer: Some(color_buffer),
            topology: PrimitiveTopology::PointList,
        })
    }

    /// Overwrite a point cloud's color attribute with a recomputed buffer.
    /// Size mismatches indicate a stale dataset and are skipped with a log.
    pub fn update_point_colors(&self, queue: &Queue, id: MeshID, rgba: &[u8]) -> bool {
        let Some(mesh) = self.meshes.get(&id) else {
            log::error!("update_point_colors: unknown mesh {id}");
            return false;
        };
        let Some(color_buffer) = mesh.color_buffer.as_ref() else {
            log::error!("update_point_colors: mesh {id} has no color attribute");
            return false;
        };
        if rgba.len() != mesh.vertex_count as usize * 4 {
            log::warn!(
                "update_point_colors: {} bytes for {} points, skipping stale buffer",
                rgba.len(),
                mesh.vertex_count
            );
            return false;
        }
        queue.write_buffer(color_buffer, 0, rgba);
        true
    }

    /// Unit cube centered on the origin, one quad per face.
    pub fn create_cube(&mut self, device: &Device) -> MeshID {
        let face = |n: [f32; 3], corners: [[f32; 3]; 4]| {
            corners.map(|position| Vertex3D {
                position,
                normal: n,
                uv: [
                    position[0] + 0.5,
                    position[1] + 0.5,
                ],
            })
        };

        let h = 0.5;
        let faces = [
            face([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            face([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            face([1.0, 0.0, 0.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            face([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
            face([0.0, 1.0, 0.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            face([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
        ];

        let vertices: Vec<Vertex3D> = faces.iter().flatten().copied().collect();
        let indices: Vec<u32> = (0..6u32)
            .flat_map(|f| {
                let b = f * 4;
                [b, b + 1, b + 2, b + 2, b + 3, b]
            })
            .collect();
        self.register_raw(device, &vertices, Some(&indices))
    }

    /// Unit quad in the xy plane, for slice/overlay drawing.
    pub fn create_plane(&mut self, device: &Device) -> MeshID {
        let n = [0.0, 0.0, 1.0];
        let vertices = [
            Vertex3D { position: [-0.5, -0.5, 0.0], normal: n, uv: [0.0, 1.0] },
            Vertex3D { position: [0.5, -0.5, 0.0], normal: n, uv: [1.0, 1.0] },
            Vertex3D { position: [0.5, 0.5, 0.0], normal: n, uv: [1.0, 0.0] },
            Vertex3D { position: [-0.5, 0.5, 0.0], normal: n, uv: [0.0, 0.0] },
        ];
        let indices = [0u32, 1, 2, 2, 3, 0];
        self.register_raw(device, &vertices, Some(&indices))
    }
}

impl Default for MeshRegistry {
    fn default() -> Self {
        Self::new()
    }
}
