//! GPU backend abstraction.
//!
//! Every stage of the renderer is written against three small traits so it can
//! run on real hardware or without any GPU at all:
//!
//! - [`GpuDevice`] creates buffers, shader modules and pipelines, and hands out
//!   the command queue
//! - [`CommandQueue`] commits an encoded frame and presents its drawable
//! - [`View`] provides drawables and the clear colour / format they use
//!
//! Two backends implement them:
//!
//! - [`native`] drives wgpu (a window surface or an offscreen texture)
//! - [`recording`] records every request and submitted frame for inspection

pub mod native;
pub mod recording;

use crate::{
    error::Result,
    pipelines::state::PipelineDescriptor,
    render::{EncodedFrame, RenderPassDescriptor},
};

/// What a buffer created through [`GpuDevice::make_buffer`] is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

pub trait GpuDevice: Sized {
    type Buffer: std::fmt::Debug;
    type ShaderModule: std::fmt::Debug;
    type Pipeline: std::fmt::Debug;
    type Drawable;
    type Queue: CommandQueue<Self>;

    /// Human readable adapter name, used in logs.
    fn name(&self) -> String;

    fn make_command_queue(&self) -> Result<Self::Queue>;

    fn make_buffer(&self, label: &str, contents: &[u8], usage: BufferUsage) -> Self::Buffer;

    /// Creates a module from WGSL that has already been parsed and validated.
    fn make_shader_module(&self, label: &str, source: &str) -> Result<Self::ShaderModule>;

    fn make_render_pipeline(&self, desc: &PipelineDescriptor<'_, Self>) -> Result<Self::Pipeline>;

    /// Whether triangles can be rasterized as lines.
    fn supports_wireframe(&self) -> bool;
}

pub trait CommandQueue<D: GpuDevice> {
    /// Submits the frame and presents its drawable. Does not wait for the GPU.
    fn commit(&self, frame: EncodedFrame<'_, D>) -> Result<()>;
}

pub trait View<D: GpuDevice> {
    /// Fails with [`crate::error::RenderError::NoDrawable`] when nothing can be drawn into.
    fn current_drawable(&mut self) -> Result<D::Drawable>;

    fn pass_descriptor(&self) -> RenderPassDescriptor;

    fn color_format(&self) -> wgpu::TextureFormat;
}
