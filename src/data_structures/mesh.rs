//! GPU-resident meshes.
//!
//! A [`MeshAsset`] is one vertex buffer shared by one or more [`Submesh`]es,
//! each of which owns an index buffer. Meshes are produced by
//! [`crate::resources::load_mesh`] and only borrowed while a frame is encoded.

use crate::{backend::GpuDevice, data_structures::vertex_layout::MeshVertexDescriptor};

/// Size in bytes of one index.
pub fn index_size(format: wgpu::IndexFormat) -> u64 {
    match format {
        wgpu::IndexFormat::Uint16 => 2,
        wgpu::IndexFormat::Uint32 => 4,
    }
}

/// A region of a backend buffer.
#[derive(Debug)]
pub struct MeshBuffer<D: GpuDevice> {
    pub buffer: D::Buffer,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug)]
pub struct Submesh<D: GpuDevice> {
    pub name: String,
    pub index_buffer: MeshBuffer<D>,
    pub index_count: u32,
    pub index_format: wgpu::IndexFormat,
}

impl<D: GpuDevice> Submesh<D> {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

#[derive(Debug)]
pub struct MeshAsset<D: GpuDevice> {
    pub name: String,
    pub vertex_descriptor: MeshVertexDescriptor,
    pub vertex_buffers: Vec<MeshBuffer<D>>,
    pub vertex_count: u32,
    pub submeshes: Vec<Submesh<D>>,
}

impl<D: GpuDevice> MeshAsset<D> {
    pub fn vertex_descriptor(&self) -> &MeshVertexDescriptor {
        &self.vertex_descriptor
    }

    pub fn index_count(&self) -> u32 {
        self.submeshes.iter().map(|s| s.index_count).sum()
    }
}
