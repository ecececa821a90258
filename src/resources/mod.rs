//! Loading of external files: OBJ meshes and their material libraries.

use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use crate::{
    backend::GpuDevice,
    config::AssetConfig,
    data_structures::{mesh::MeshAsset, vertex_layout::MeshVertexDescriptor},
    error::{RenderError, Result},
};

pub mod mesh;

pub async fn load_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RenderError::AssetNotFound {
            path: path.to_path_buf(),
            source,
        })
}

/// Loads `file_name` from the asset root into GPU buffers laid out as
/// `descriptor` describes.
///
/// The descriptor is checked first, so a layout the loader cannot fill fails
/// without touching the file system.
pub async fn load_mesh<D: GpuDevice>(
    device: &D,
    assets: &AssetConfig,
    file_name: &str,
    descriptor: &MeshVertexDescriptor,
) -> Result<MeshAsset<D>> {
    let packing = mesh::VertexPacking::new(descriptor)?;
    let path = assets.resolve(file_name);
    let obj_text = load_string(&path).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let root = assets.root().to_path_buf();
    let (models, materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path = root.join(p);
            async move {
                let mat_text = load_string(&mtl_path)
                    .await
                    .map_err(|_| tobj::LoadError::OpenFileFailed)?;
                tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text)))
            }
        },
    )
    .await
    .map_err(|e| RenderError::malformed(&path, e.to_string()))?;

    // Materials are not used for wireframes, a broken library is not fatal.
    if let Err(e) = materials {
        log::warn!("Materials of {file_name} could not be loaded: {e}");
    }

    mesh::build_mesh(device, &path, file_name, &packing, descriptor, &models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::recording::RecordingDevice,
        data_structures::vertex_layout::{Semantic, VertexFormat, VertexLayout},
        error::FailureKind,
    };

    fn assets() -> AssetConfig {
        AssetConfig::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"), "cube.obj")
    }

    fn fixtures() -> AssetConfig {
        AssetConfig::new(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("assets"),
            "no_faces.obj",
        )
    }

    fn position_descriptor() -> MeshVertexDescriptor {
        MeshVertexDescriptor::from_layout(&VertexLayout::position_only(), &[Semantic::Position])
            .unwrap()
    }

    #[tokio::test]
    async fn loads_the_cube() {
        let device = RecordingDevice::default();
        let mesh = load_mesh(&device, &assets(), "cube.obj", &position_descriptor())
            .await
            .unwrap();
        assert_eq!(mesh.vertex_count, 8);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(mesh.submeshes[0].triangle_count(), 12);
        assert_eq!(mesh.submeshes[0].index_format, wgpu::IndexFormat::Uint16);
        assert_eq!(mesh.vertex_buffers[0].length, 96);
        assert_eq!(mesh.vertex_descriptor(), &position_descriptor());
        assert_eq!(
            device.log().buffers,
            vec![
                "\"cube.obj\" Vertex Buffer",
                "\"cube.obj\" Index Buffer (cube)"
            ]
        );
    }

    #[tokio::test]
    async fn train_has_a_submesh_per_object() {
        let device = RecordingDevice::default();
        let mesh = load_mesh(&device, &assets(), "train.obj", &position_descriptor())
            .await
            .unwrap();
        assert!(mesh.submeshes.len() > 1);
        assert!(mesh.submeshes.iter().all(|s| s.index_count % 3 == 0));
        assert_eq!(mesh.vertex_buffers.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let device = RecordingDevice::default();
        let err = load_mesh(&device, &assets(), "nope.obj", &position_descriptor())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AssetNotFound);
    }

    #[tokio::test]
    async fn layout_is_checked_before_the_file() {
        let device = RecordingDevice::default();
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x3, 0, 0)
            .stride(0, 16)
            .build()
            .unwrap();
        let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position]).unwrap();
        // The file does not exist, the layout error wins.
        let err = load_mesh(&device, &assets(), "nope.obj", &descriptor)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
    }

    #[tokio::test]
    async fn mesh_without_faces_is_malformed() {
        let device = RecordingDevice::default();
        let err = load_mesh(&device, &fixtures(), "no_faces.obj", &position_descriptor())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AssetMalformed);
        assert!(device.log().buffers.is_empty());
    }

    #[tokio::test]
    async fn missing_normals_are_malformed() {
        let device = RecordingDevice::default();
        let layout = VertexLayout::builder()
            .attribute(0, VertexFormat::Float32x3, 0, 0)
            .attribute(1, VertexFormat::Float32x3, 12, 0)
            .stride(0, 24)
            .build()
            .unwrap();
        let descriptor =
            MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position, Semantic::Normal])
                .unwrap();
        let err = load_mesh(&device, &assets(), "cube.obj", &descriptor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AssetMalformed);
    }

    #[tokio::test]
    async fn missing_material_library_is_tolerated() {
        let device = RecordingDevice::default();
        let mesh = load_mesh(&device, &fixtures(), "missing_mtl.obj", &position_descriptor())
            .await
            .unwrap();
        assert_eq!(mesh.index_count(), 3);
    }
}
