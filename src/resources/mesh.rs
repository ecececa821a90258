use std::path::Path;

use crate::{
    backend::{BufferUsage, GpuDevice},
    data_structures::{
        mesh::{MeshAsset, MeshBuffer, Submesh},
        vertex_layout::{MeshVertexDescriptor, Semantic},
    },
    error::{RenderError, Result},
};

/// How asset data is interleaved into the single vertex buffer.
///
/// Only tightly packed layouts are accepted: every attribute in buffer slot 0,
/// in its semantic's natural format, with the stride equal to the sum of the
/// attribute sizes. Anything else is a [`RenderError::LayoutMismatch`] and is
/// reported before the asset is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexPacking {
    /// Ordered by offset.
    fields: Vec<Semantic>,
    stride: u64,
}

impl VertexPacking {
    pub fn new(descriptor: &MeshVertexDescriptor) -> Result<Self> {
        if descriptor.attribute(Semantic::Position).is_none() {
            return Err(RenderError::LayoutMismatch(
                "descriptor has no position attribute".into(),
            ));
        }
        if let Some(extra) = descriptor.stride(1) {
            return Err(RenderError::LayoutMismatch(format!(
                "descriptor declares a second buffer slot ({extra} byte stride), meshes only fill slot 0"
            )));
        }
        let mut attributes = descriptor.attributes().to_vec();
        attributes.sort_by_key(|a| a.attribute.offset);

        let mut packed = 0;
        for a in &attributes {
            if a.attribute.buffer_index != 0 {
                return Err(RenderError::LayoutMismatch(format!(
                    "{:?} reads buffer slot {}, meshes only fill slot 0",
                    a.semantic, a.attribute.buffer_index
                )));
            }
            let expected = a.semantic.natural_format();
            if a.attribute.format != expected {
                return Err(RenderError::LayoutMismatch(format!(
                    "{:?} is {:?}, asset data is {expected:?}",
                    a.semantic, a.attribute.format
                )));
            }
            if a.attribute.offset != packed {
                return Err(RenderError::LayoutMismatch(format!(
                    "{:?} starts at offset {}, expected {packed}",
                    a.semantic, a.attribute.offset
                )));
            }
            packed += expected.size();
        }

        let stride = descriptor.stride(0).unwrap_or_default();
        if stride != packed {
            return Err(RenderError::LayoutMismatch(format!(
                "stride is {stride} bytes, packed vertices are {packed}"
            )));
        }
        Ok(Self {
            fields: attributes.iter().map(|a| a.semantic).collect(),
            stride,
        })
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Appends every vertex of `mesh` to `out`.
    fn pack(&self, path: &Path, mesh: &tobj::Mesh, out: &mut Vec<u8>) -> Result<()> {
        let vertex_count = mesh.positions.len() / 3;
        for semantic in &self.fields {
            let (len, components) = match semantic {
                Semantic::Position => continue,
                Semantic::Normal => (mesh.normals.len(), 3),
                Semantic::TextureCoordinate => (mesh.texcoords.len(), 2),
            };
            if len != vertex_count * components {
                return Err(RenderError::malformed(
                    path,
                    format!("{semantic:?} requested but the asset has {len} values for {vertex_count} vertices"),
                ));
            }
        }

        out.reserve(vertex_count * self.stride as usize);
        for i in 0..vertex_count {
            for semantic in &self.fields {
                match semantic {
                    Semantic::Position => {
                        out.extend_from_slice(bytemuck::cast_slice(&mesh.positions[i * 3..i * 3 + 3]))
                    }
                    Semantic::Normal => {
                        out.extend_from_slice(bytemuck::cast_slice(&mesh.normals[i * 3..i * 3 + 3]))
                    }
                    // wgpu's texture origin is top left, OBJ's bottom left.
                    Semantic::TextureCoordinate => out.extend_from_slice(bytemuck::cast_slice(&[
                        mesh.texcoords[i * 2],
                        1.0 - mesh.texcoords[i * 2 + 1],
                    ])),
                }
            }
        }
        Ok(())
    }
}

/// Uploads all models of an OBJ file as one mesh: their vertices are packed
/// into a shared vertex buffer and each model becomes a submesh with its own
/// index buffer.
pub fn build_mesh<D: GpuDevice>(
    device: &D,
    path: &Path,
    file_name: &str,
    packing: &VertexPacking,
    descriptor: &MeshVertexDescriptor,
    models: &[tobj::Model],
) -> Result<MeshAsset<D>> {
    let first = models
        .first()
        .ok_or_else(|| RenderError::malformed(path, "file contains no mesh"))?;
    if first.mesh.positions.is_empty() || first.mesh.indices.is_empty() {
        return Err(RenderError::malformed(
            path,
            format!("first mesh `{}` has no faces", first.name),
        ));
    }

    let mut vertices = Vec::new();
    let mut ranges = Vec::new();
    let mut vertex_count: usize = 0;
    for model in models {
        let mesh = &model.mesh;
        if mesh.positions.is_empty() || mesh.indices.is_empty() {
            log::warn!("Skipping empty mesh `{}` in {}", model.name, file_name);
            continue;
        }
        if mesh.positions.len() % 3 != 0 {
            return Err(RenderError::malformed(
                path,
                format!("`{}` has {} position values", model.name, mesh.positions.len()),
            ));
        }
        let count = mesh.positions.len() / 3;
        if let Some(index) = mesh.indices.iter().find(|i| **i as usize >= count) {
            return Err(RenderError::malformed(
                path,
                format!("`{}` references vertex {index} of {count}", model.name),
            ));
        }
        packing.pack(path, mesh, &mut vertices)?;
        ranges.push((model, vertex_count));
        vertex_count += count;
    }

    let vertex_count = u32::try_from(vertex_count)
        .map_err(|_| RenderError::malformed(path, "too many vertices"))?;
    let index_format = if vertex_count <= u32::from(u16::MAX) {
        wgpu::IndexFormat::Uint16
    } else {
        wgpu::IndexFormat::Uint32
    };

    let vertex_buffer = MeshBuffer {
        length: vertices.len() as u64,
        offset: 0,
        buffer: device.make_buffer(
            &format!("{:?} Vertex Buffer", file_name),
            &vertices,
            BufferUsage::Vertex,
        ),
    };

    let submeshes = ranges
        .into_iter()
        .map(|(model, base)| {
            // `base` and every local index are below `vertex_count`.
            let indices = model.mesh.indices.iter().map(|i| *i + base as u32);
            let contents: Vec<u8> = match index_format {
                wgpu::IndexFormat::Uint16 => {
                    let indices: Vec<u16> = indices.map(|i| i as u16).collect();
                    bytemuck::cast_slice(&indices).to_vec()
                }
                wgpu::IndexFormat::Uint32 => {
                    let indices: Vec<u32> = indices.collect();
                    bytemuck::cast_slice(&indices).to_vec()
                }
            };
            Submesh {
                name: model.name.clone(),
                index_buffer: MeshBuffer {
                    length: contents.len() as u64,
                    offset: 0,
                    buffer: device.make_buffer(
                        &format!("{:?} Index Buffer ({})", file_name, model.name),
                        &contents,
                        BufferUsage::Index,
                    ),
                },
                index_count: model.mesh.indices.len() as u32,
                index_format,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "{file_name}: {vertex_count} vertices, {} submesh(es), {index_format:?} indices",
        submeshes.len()
    );
    Ok(MeshAsset {
        name: file_name.to_string(),
        vertex_descriptor: descriptor.clone(),
        vertex_buffers: vec![vertex_buffer],
        vertex_count,
        submeshes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::recording::RecordingDevice,
        data_structures::vertex_layout::{VertexFormat, VertexLayout},
        error::FailureKind,
    };

    fn position_descriptor() -> MeshVertexDescriptor {
        MeshVertexDescriptor::from_layout(&VertexLayout::position_only(), &[Semantic::Position])
            .unwrap()
    }

    fn triangle(name: &str) -> tobj::Model {
        tobj::Model::new(
            tobj::Mesh {
                positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                indices: vec![0, 1, 2],
                ..Default::default()
            },
            name.to_string(),
        )
    }

    #[test]
    fn rejects_padded_stride() {
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x3, 0, 0)
            .stride(0, 16)
            .build()
            .unwrap();
        let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position]).unwrap();
        let err = VertexPacking::new(&descriptor).unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert_eq!(err.kind(), FailureKind::InvalidLayout);
    }

    #[test]
    fn rejects_unfilled_second_slot() {
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x3, 0, 0)
            .stride(0, 12)
            .stride(1, 12)
            .build()
            .unwrap();
        let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position]).unwrap();
        let err = VertexPacking::new(&descriptor).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidLayout);
        assert!(err.to_string().contains("second buffer slot"));
    }

    #[test]
    fn rejects_wrong_format_for_semantic() {
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x4, 0, 0)
            .stride(0, 16)
            .build()
            .unwrap();
        let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position]).unwrap();
        assert!(VertexPacking::new(&descriptor).is_err());
    }

    #[test]
    fn packs_position_and_normal_interleaved() {
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x3, 0, 0)
            .attribute(1, VertexFormat::Float32x3, 12, 0)
            .stride(0, 24)
            .build()
            .unwrap();
        let descriptor =
            MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position, Semantic::Normal])
                .unwrap();
        let packing = VertexPacking::new(&descriptor).unwrap();
        let mut model = triangle("tri");
        model.mesh.normals = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];

        let mut out = Vec::new();
        packing.pack(Path::new("tri.obj"), &model.mesh, &mut out).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(&out);
        assert_eq!(floats.len(), 18);
        assert_eq!(&floats[6..12], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn submeshes_share_the_vertex_buffer() {
        let device = RecordingDevice::default();
        let descriptor = position_descriptor();
        let packing = VertexPacking::new(&descriptor).unwrap();
        let models = [triangle("a"), triangle("b")];
        let mesh = build_mesh(
            &device,
            Path::new("two.obj"),
            "two.obj",
            &packing,
            &descriptor,
            &models,
        )
        .unwrap();

        assert_eq!(mesh.vertex_count, 6);
        assert_eq!(mesh.vertex_buffers.len(), 1);
        assert_eq!(mesh.vertex_buffers[0].length, 72);
        assert_eq!(mesh.submeshes.len(), 2);
        let second: &[u16] = bytemuck::cast_slice(&mesh.submeshes[1].index_buffer.buffer.contents);
        assert_eq!(second, &[3, 4, 5]);
        assert_eq!(mesh.index_count(), 6);
    }

    #[test]
    fn empty_later_models_are_skipped() {
        let device = RecordingDevice::default();
        let descriptor = position_descriptor();
        let packing = VertexPacking::new(&descriptor).unwrap();
        let models = [
            triangle("a"),
            tobj::Model::new(tobj::Mesh::default(), "empty".to_string()),
        ];
        let mesh = build_mesh(&device, Path::new("a.obj"), "a.obj", &packing, &descriptor, &models)
            .unwrap();
        assert_eq!(mesh.submeshes.len(), 1);
    }

    #[test]
    fn empty_first_model_is_malformed() {
        let device = RecordingDevice::default();
        let descriptor = position_descriptor();
        let packing = VertexPacking::new(&descriptor).unwrap();
        let models = [tobj::Model::new(tobj::Mesh::default(), "empty".to_string())];
        let err = build_mesh(&device, Path::new("e.obj"), "e.obj", &packing, &descriptor, &models)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AssetMalformed);
        assert!(device.log().buffers.is_empty());
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let device = RecordingDevice::default();
        let descriptor = position_descriptor();
        let packing = VertexPacking::new(&descriptor).unwrap();
        let mut model = triangle("a");
        model.mesh.indices = vec![0, 1, 7];
        let err = build_mesh(&device, Path::new("a.obj"), "a.obj", &packing, &descriptor, &[model])
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AssetMalformed);
    }
}
