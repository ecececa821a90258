//! The setup sequence as a chain of typestates.
//!
//! ```text
//! Uninitialized -> DeviceReady -> MeshLoaded -> ShaderCompiled -> PipelineReady -> FrameEncoded -> Presented
//! ```
//!
//! Every step consumes the previous state, so steps can only run in order.
//! A failing step logs the transition to [`Stage::Aborted`] and returns the
//! error; nothing is retried. The device, and with it the queue, is injected,
//! which lets the whole chain run on the recording backend.

use std::fmt;

use crate::{
    backend::{CommandQueue, GpuDevice, View},
    config::AssetConfig,
    data_structures::{
        mesh::MeshAsset,
        vertex_layout::{MeshVertexDescriptor, Semantic, VertexLayout},
    },
    error::{RenderError, Result},
    pipelines::{
        shader::{FRAGMENT_ENTRY, ShaderProgram, VERTEX_ENTRY, WIREFRAME_SHADER},
        state::{PipelineBuilder, PipelineState},
    },
    render::{EncodedFrame, FillMode, Frame, FrameReport},
    resources,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Uninitialized,
    DeviceReady,
    MeshLoaded,
    ShaderCompiled,
    PipelineReady,
    FrameEncoded,
    Presented,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn transition<T>(from: Stage, to: Stage, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => log::info!("{from} -> {to}"),
        Err(e) => log::error!("{from} -> {}: {e}", Stage::Aborted),
    }
    result
}

pub struct DeviceReady<D: GpuDevice> {
    device: D,
    queue: D::Queue,
}

impl<D: GpuDevice> DeviceReady<D> {
    /// Takes ownership of the device and opens its command queue.
    pub fn new(device: D) -> Result<Self> {
        let result = device.make_command_queue().map(|queue| {
            log::debug!("command queue on {}", device.name());
            Self { device, queue }
        });
        transition(Stage::Uninitialized, Stage::DeviceReady, result)
    }

    pub fn stage(&self) -> Stage {
        Stage::DeviceReady
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub async fn load_mesh(
        self,
        assets: &AssetConfig,
        file_name: &str,
        descriptor: &MeshVertexDescriptor,
    ) -> Result<MeshLoaded<D>> {
        let result = resources::load_mesh(&self.device, assets, file_name, descriptor)
            .await
            .map(|mesh| MeshLoaded {
                device: self.device,
                queue: self.queue,
                mesh,
            });
        transition(Stage::DeviceReady, Stage::MeshLoaded, result)
    }
}

pub struct MeshLoaded<D: GpuDevice> {
    device: D,
    queue: D::Queue,
    mesh: MeshAsset<D>,
}

impl<D: GpuDevice> MeshLoaded<D> {
    pub fn stage(&self) -> Stage {
        Stage::MeshLoaded
    }

    pub fn mesh(&self) -> &MeshAsset<D> {
        &self.mesh
    }

    pub fn compile_shader(
        self,
        source: &str,
        vertex_entry: &str,
        fragment_entry: &str,
    ) -> Result<ShaderCompiled<D>> {
        let result = ShaderProgram::compile(
            &self.device,
            "Wireframe Shader",
            source,
            vertex_entry,
            fragment_entry,
        )
        .map(|program| ShaderCompiled {
            device: self.device,
            queue: self.queue,
            mesh: self.mesh,
            program,
        });
        transition(Stage::MeshLoaded, Stage::ShaderCompiled, result)
    }
}

pub struct ShaderCompiled<D: GpuDevice> {
    device: D,
    queue: D::Queue,
    mesh: MeshAsset<D>,
    program: ShaderProgram<D>,
}

impl<D: GpuDevice> ShaderCompiled<D> {
    pub fn stage(&self) -> Stage {
        Stage::ShaderCompiled
    }

    pub fn program(&self) -> &ShaderProgram<D> {
        &self.program
    }

    pub fn mesh(&self) -> &MeshAsset<D> {
        &self.mesh
    }

    /// Builds the pipeline with the layout the mesh was loaded with.
    pub fn build_pipeline(self, color_format: wgpu::TextureFormat) -> Result<PipelineReady<D>> {
        let result = self
            .mesh
            .vertex_descriptor()
            .to_vertex_layout()
            .and_then(|layout| {
                PipelineBuilder::new(&self.program)
                    .color_format(color_format)
                    .vertex_layout(&layout)
                    .mesh_descriptor(self.mesh.vertex_descriptor())
                    .build(&self.device)
            });
        let result = result.map(|pipeline| PipelineReady {
            device: self.device,
            queue: self.queue,
            mesh: self.mesh,
            pipeline,
        });
        transition(Stage::ShaderCompiled, Stage::PipelineReady, result)
    }
}

pub struct PipelineReady<D: GpuDevice> {
    device: D,
    queue: D::Queue,
    mesh: MeshAsset<D>,
    pipeline: PipelineState<D>,
}

impl<D: GpuDevice> PipelineReady<D> {
    pub fn stage(&self) -> Stage {
        Stage::PipelineReady
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn mesh(&self) -> &MeshAsset<D> {
        &self.mesh
    }

    pub fn pipeline(&self) -> &PipelineState<D> {
        &self.pipeline
    }

    /// Encodes the first submesh as a wireframe into the view's current
    /// drawable, then commits and presents it.
    pub fn draw_frame<V: View<D>>(&self, view: &mut V) -> Result<FrameReport> {
        let encoded = transition(Stage::PipelineReady, Stage::FrameEncoded, self.encode(view))?;
        let report = FrameReport {
            draw_calls: encoded.draw_calls(),
        };
        transition(
            Stage::FrameEncoded,
            Stage::Presented,
            self.queue.commit(encoded),
        )?;
        Ok(report)
    }

    fn encode<V: View<D>>(&self, view: &mut V) -> Result<EncodedFrame<'_, D>> {
        let submesh = self.mesh.submeshes.first().ok_or_else(|| {
            RenderError::BackendRejected(format!("{} has no submesh to draw", self.mesh.name))
        })?;
        let mut frame = Frame::begin(view)?;
        frame.set_pipeline(&self.pipeline);
        for (slot, vertex_buffer) in self.mesh.vertex_buffers.iter().enumerate() {
            frame.set_vertex_buffer(slot as u32, &vertex_buffer.buffer, vertex_buffer.offset);
        }
        frame.set_fill_mode(FillMode::Lines);
        frame.draw_submesh(submesh)?;
        Ok(frame.finish())
    }
}

/// The position-only layout the playground draws with, named for the loader.
pub fn wireframe_descriptor() -> Result<MeshVertexDescriptor> {
    MeshVertexDescriptor::from_layout(&VertexLayout::position_only(), &[Semantic::Position])
}

/// Runs the whole sequence once: load `assets.model`, compile the wireframe
/// shader, build the pipeline for the view's format and draw one frame.
pub async fn render_once<D, V>(device: D, view: &mut V, assets: &AssetConfig) -> Result<FrameReport>
where
    D: GpuDevice,
    V: View<D>,
{
    let descriptor = wireframe_descriptor()?;
    DeviceReady::new(device)?
        .load_mesh(assets, &assets.model, &descriptor)
        .await?
        .compile_shader(WIREFRAME_SHADER, VERTEX_ENTRY, FRAGMENT_ENTRY)?
        .build_pipeline(view.color_format())?
        .draw_frame(view)
}
