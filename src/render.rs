//! Frame encoding.
//!
//! A [`Frame`] owns one drawable and records render commands against it. The
//! commands borrow the pipeline and mesh buffers they reference, so a frame
//! cannot outlive the resources it draws. Closing a frame with
//! [`Frame::finish`] yields an [`EncodedFrame`] that a
//! [`CommandQueue`](crate::backend::CommandQueue) commits and presents.
//!
//! Encoding validates eagerly: drawing without a pipeline, with an unbound
//! vertex buffer slot, or in a fill mode the pipeline cannot rasterize fails at
//! the draw call instead of on the GPU.

use std::collections::BTreeSet;

use crate::{
    backend::{GpuDevice, View},
    data_structures::mesh::{Submesh, index_size},
    error::{RenderError, Result},
    pipelines::state::PipelineState,
};

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Fill,
    /// Only triangle edges are drawn.
    Lines,
}

impl FillMode {
    pub fn to_wgpu(self) -> wgpu::PolygonMode {
        match self {
            Self::Fill => wgpu::PolygonMode::Fill,
            Self::Lines => wgpu::PolygonMode::Line,
        }
    }
}

/// Attachment setup of the single render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDescriptor {
    pub clear_colour: wgpu::Color,
    pub width: u32,
    pub height: u32,
}

pub enum RenderCommand<'a, D: GpuDevice> {
    SetPipeline(&'a PipelineState<D>),
    SetVertexBuffer {
        index: u32,
        buffer: &'a D::Buffer,
        offset: u64,
    },
    SetFillMode(FillMode),
    DrawIndexed {
        index_count: u32,
        index_format: wgpu::IndexFormat,
        index_buffer: &'a D::Buffer,
        index_buffer_offset: u64,
    },
}

/// Summary of one encoded draw, with the state that was bound at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub index_count: u32,
    pub index_format: wgpu::IndexFormat,
    pub index_buffer_offset: u64,
    pub fill_mode: FillMode,
    pub vertex_buffer_slots: Vec<u32>,
}

/// What happened in a committed frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub draw_calls: Vec<DrawCall>,
}

pub struct Frame<'a, D: GpuDevice> {
    drawable: D::Drawable,
    pass: RenderPassDescriptor,
    commands: Vec<RenderCommand<'a, D>>,
    pipeline: Option<&'a PipelineState<D>>,
    fill_mode: FillMode,
    bound_slots: BTreeSet<u32>,
}

impl<'a, D: GpuDevice> Frame<'a, D> {
    /// Acquires the view's current drawable and starts recording.
    pub fn begin<V: View<D>>(view: &mut V) -> Result<Self> {
        let drawable = view.current_drawable()?;
        Ok(Self {
            drawable,
            pass: view.pass_descriptor(),
            commands: Vec::new(),
            pipeline: None,
            fill_mode: FillMode::default(),
            bound_slots: BTreeSet::new(),
        })
    }

    pub fn set_pipeline(&mut self, pipeline: &'a PipelineState<D>) {
        self.pipeline = Some(pipeline);
        self.commands.push(RenderCommand::SetPipeline(pipeline));
    }

    pub fn set_vertex_buffer(&mut self, index: u32, buffer: &'a D::Buffer, offset: u64) {
        self.bound_slots.insert(index);
        self.commands.push(RenderCommand::SetVertexBuffer {
            index,
            buffer,
            offset,
        });
    }

    pub fn set_fill_mode(&mut self, fill_mode: FillMode) {
        self.fill_mode = fill_mode;
        self.commands.push(RenderCommand::SetFillMode(fill_mode));
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        index_format: wgpu::IndexFormat,
        index_buffer: &'a D::Buffer,
        index_buffer_offset: u64,
    ) -> Result<()> {
        let pipeline = self.pipeline.ok_or_else(|| {
            RenderError::BackendRejected("draw encoded before a pipeline was set".into())
        })?;
        for slot in 0..pipeline.vertex_layout().buffer_count() {
            if !self.bound_slots.contains(&slot) {
                return Err(RenderError::BackendRejected(format!(
                    "pipeline reads vertex buffer slot {slot} but nothing is bound there"
                )));
            }
        }
        if self.fill_mode == FillMode::Lines && !pipeline.supports_wireframe() {
            return Err(RenderError::BackendRejected(
                "device cannot rasterize triangles as lines".into(),
            ));
        }
        if index_buffer_offset % index_size(index_format) != 0 {
            return Err(RenderError::BackendRejected(format!(
                "index buffer offset {index_buffer_offset} is not aligned to {index_format:?}"
            )));
        }
        self.commands.push(RenderCommand::DrawIndexed {
            index_count,
            index_format,
            index_buffer,
            index_buffer_offset,
        });
        Ok(())
    }

    pub fn draw_submesh(&mut self, submesh: &'a Submesh<D>) -> Result<()> {
        self.draw_indexed(
            submesh.index_count,
            submesh.index_format,
            &submesh.index_buffer.buffer,
            submesh.index_buffer.offset,
        )
    }

    /// Closes encoding. No further commands can be recorded.
    pub fn finish(self) -> EncodedFrame<'a, D> {
        EncodedFrame {
            drawable: self.drawable,
            pass: self.pass,
            commands: self.commands,
        }
    }
}

pub struct EncodedFrame<'a, D: GpuDevice> {
    drawable: D::Drawable,
    pass: RenderPassDescriptor,
    commands: Vec<RenderCommand<'a, D>>,
}

impl<'a, D: GpuDevice> EncodedFrame<'a, D> {
    pub fn pass(&self) -> &RenderPassDescriptor {
        &self.pass
    }

    pub fn commands(&self) -> &[RenderCommand<'a, D>] {
        &self.commands
    }

    pub fn drawable(&self) -> &D::Drawable {
        &self.drawable
    }

    pub fn into_parts(self) -> (D::Drawable, RenderPassDescriptor, Vec<RenderCommand<'a, D>>) {
        (self.drawable, self.pass, self.commands)
    }

    /// Replays the recorded state changes and summarises every draw.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        let mut fill_mode = FillMode::default();
        let mut slots = BTreeSet::new();
        let mut draws = Vec::new();
        for command in &self.commands {
            match command {
                RenderCommand::SetPipeline(_) => (),
                RenderCommand::SetVertexBuffer { index, .. } => {
                    slots.insert(*index);
                }
                RenderCommand::SetFillMode(mode) => fill_mode = *mode,
                RenderCommand::DrawIndexed {
                    index_count,
                    index_format,
                    index_buffer_offset,
                    ..
                } => draws.push(DrawCall {
                    index_count: *index_count,
                    index_format: *index_format,
                    index_buffer_offset: *index_buffer_offset,
                    fill_mode,
                    vertex_buffer_slots: slots.iter().copied().collect(),
                }),
            }
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            BufferUsage, GpuDevice,
            recording::{RecordingDevice, RecordingOptions, RecordingView},
        },
        config::ViewConfig,
        data_structures::vertex_layout::VertexLayout,
        error::FailureKind,
        pipelines::{
            shader::{FRAGMENT_ENTRY, ShaderProgram, VERTEX_ENTRY, WIREFRAME_SHADER},
            state::PipelineBuilder,
        },
    };

    fn pipeline(device: &RecordingDevice) -> PipelineState<RecordingDevice> {
        let program = ShaderProgram::compile(
            device,
            "Wireframe Shader",
            WIREFRAME_SHADER,
            VERTEX_ENTRY,
            FRAGMENT_ENTRY,
        )
        .unwrap();
        PipelineBuilder::new(&program)
            .color_format(wgpu::TextureFormat::Bgra8Unorm)
            .vertex_layout(&VertexLayout::position_only())
            .build(device)
            .unwrap()
    }

    #[test]
    fn records_fill_mode_with_the_draw() {
        let device = RecordingDevice::default();
        let state = pipeline(&device);
        let vertices = device.make_buffer("v", &[0; 36], BufferUsage::Vertex);
        let indices = device.make_buffer("i", &[0; 6], BufferUsage::Index);
        let mut view = RecordingView::new(ViewConfig::default());

        let mut frame = Frame::begin(&mut view).unwrap();
        frame.set_pipeline(&state);
        frame.set_vertex_buffer(0, &vertices, 0);
        frame.set_fill_mode(FillMode::Lines);
        frame
            .draw_indexed(3, wgpu::IndexFormat::Uint16, &indices, 0)
            .unwrap();
        let encoded = frame.finish();

        assert_eq!(encoded.commands().len(), 4);
        assert_eq!(
            encoded.draw_calls(),
            vec![DrawCall {
                index_count: 3,
                index_format: wgpu::IndexFormat::Uint16,
                index_buffer_offset: 0,
                fill_mode: FillMode::Lines,
                vertex_buffer_slots: vec![0],
            }]
        );
    }

    #[test]
    fn draw_without_pipeline_is_rejected() {
        let device = RecordingDevice::default();
        let indices = device.make_buffer("i", &[0; 6], BufferUsage::Index);
        let mut view = RecordingView::new(ViewConfig::default());
        let mut frame = Frame::<RecordingDevice>::begin(&mut view).unwrap();
        let err = frame
            .draw_indexed(3, wgpu::IndexFormat::Uint16, &indices, 0)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::BackendRejected);
    }

    #[test]
    fn draw_without_vertex_buffer_is_rejected() {
        let device = RecordingDevice::default();
        let state = pipeline(&device);
        let indices = device.make_buffer("i", &[0; 6], BufferUsage::Index);
        let mut view = RecordingView::new(ViewConfig::default());
        let mut frame = Frame::begin(&mut view).unwrap();
        frame.set_pipeline(&state);
        let err = frame
            .draw_indexed(3, wgpu::IndexFormat::Uint16, &indices, 0)
            .unwrap_err();
        assert!(err.to_string().contains("slot 0"));
    }

    #[test]
    fn wireframe_needs_device_support() {
        let device = RecordingDevice::new(RecordingOptions {
            wireframe: false,
            ..Default::default()
        });
        let state = pipeline(&device);
        let vertices = device.make_buffer("v", &[0; 36], BufferUsage::Vertex);
        let indices = device.make_buffer("i", &[0; 6], BufferUsage::Index);
        let mut view = RecordingView::new(ViewConfig::default());
        let mut frame = Frame::begin(&mut view).unwrap();
        frame.set_pipeline(&state);
        frame.set_vertex_buffer(0, &vertices, 0);
        frame.set_fill_mode(FillMode::Lines);
        let err = frame
            .draw_indexed(3, wgpu::IndexFormat::Uint16, &indices, 0)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::BackendRejected);
    }

    #[test]
    fn unaligned_index_offset_is_rejected() {
        let device = RecordingDevice::default();
        let state = pipeline(&device);
        let vertices = device.make_buffer("v", &[0; 36], BufferUsage::Vertex);
        let indices = device.make_buffer("i", &[0; 12], BufferUsage::Index);
        let mut view = RecordingView::new(ViewConfig::default());
        let mut frame = Frame::begin(&mut view).unwrap();
        frame.set_pipeline(&state);
        frame.set_vertex_buffer(0, &vertices, 0);
        assert!(
            frame
                .draw_indexed(1, wgpu::IndexFormat::Uint32, &indices, 2)
                .is_err()
        );
    }

    #[test]
    fn missing_drawable_fails_before_encoding() {
        let mut view = RecordingView::new(ViewConfig::default()).without_drawables();
        let err = Frame::<RecordingDevice>::begin(&mut view).err().unwrap();
        assert_eq!(err.kind(), FailureKind::NoDrawable);
    }
}
