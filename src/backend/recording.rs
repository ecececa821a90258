//! Recording backend for tests and headless inspection.
//!
//! Nothing is sent to a GPU. Every buffer, shader module and pipeline request
//! is written to a shared [`RecordingLog`], and committed frames are kept as
//! [`SubmittedFrame`]s so the encoded render state (fill mode, index counts)
//! can be asserted on directly.

use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use crate::{
    backend::{BufferUsage, CommandQueue, GpuDevice, View},
    config::ViewConfig,
    error::{RenderError, Result},
    pipelines::state::PipelineDescriptor,
    render::{DrawCall, EncodedFrame, RenderPassDescriptor},
};

/// Knobs for simulating devices that lack features or refuse work.
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub wireframe: bool,
    pub queue_unavailable: bool,
    pub reject_pipelines: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            wireframe: true,
            queue_unavailable: false,
            reject_pipelines: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub label: String,
    pub usage: BufferUsage,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedShaderModule {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPipeline {
    pub label: String,
    pub color_format: wgpu::TextureFormat,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedDrawable(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFrame {
    pub drawable: RecordedDrawable,
    pub pass: RenderPassDescriptor,
    pub draw_calls: Vec<DrawCall>,
    pub presented: bool,
}

/// Labels of everything created, in creation order.
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub buffers: Vec<String>,
    pub shader_modules: Vec<String>,
    pub pipelines: Vec<String>,
    pub frames: Vec<SubmittedFrame>,
}

#[derive(Debug, Default, Clone)]
pub struct RecordingDevice {
    options: RecordingOptions,
    log: Rc<RefCell<RecordingLog>>,
}

impl RecordingDevice {
    pub fn new(options: RecordingOptions) -> Self {
        Self {
            options,
            log: Rc::default(),
        }
    }

    pub fn log(&self) -> Ref<'_, RecordingLog> {
        self.log.borrow()
    }
}

impl GpuDevice for RecordingDevice {
    type Buffer = RecordedBuffer;
    type ShaderModule = RecordedShaderModule;
    type Pipeline = RecordedPipeline;
    type Drawable = RecordedDrawable;
    type Queue = RecordingQueue;

    fn name(&self) -> String {
        "Recording Device".to_string()
    }

    fn make_command_queue(&self) -> Result<RecordingQueue> {
        if self.options.queue_unavailable {
            return Err(RenderError::DeviceUnavailable(
                "Could not create a command queue".into(),
            ));
        }
        Ok(RecordingQueue {
            log: self.log.clone(),
        })
    }

    fn make_buffer(&self, label: &str, contents: &[u8], usage: BufferUsage) -> RecordedBuffer {
        log::trace!("RecordingDevice: buffer {label} ({} bytes)", contents.len());
        self.log.borrow_mut().buffers.push(label.to_string());
        RecordedBuffer {
            label: label.to_string(),
            usage,
            contents: contents.to_vec(),
        }
    }

    fn make_shader_module(&self, label: &str, _source: &str) -> Result<RecordedShaderModule> {
        self.log.borrow_mut().shader_modules.push(label.to_string());
        Ok(RecordedShaderModule {
            label: label.to_string(),
        })
    }

    fn make_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_, Self>,
    ) -> Result<RecordedPipeline> {
        if self.options.reject_pipelines {
            return Err(RenderError::BackendRejected(format!(
                "{} refused by the recording device",
                desc.label
            )));
        }
        self.log.borrow_mut().pipelines.push(desc.label.to_string());
        Ok(RecordedPipeline {
            label: desc.label.to_string(),
            color_format: desc.color_format,
            vertex_entry: desc.vertex_entry.to_string(),
            fragment_entry: desc.fragment_entry.to_string(),
        })
    }

    fn supports_wireframe(&self) -> bool {
        self.options.wireframe
    }
}

#[derive(Debug)]
pub struct RecordingQueue {
    log: Rc<RefCell<RecordingLog>>,
}

impl CommandQueue<RecordingDevice> for RecordingQueue {
    fn commit(&self, frame: EncodedFrame<'_, RecordingDevice>) -> Result<()> {
        let submitted = SubmittedFrame {
            drawable: *frame.drawable(),
            pass: *frame.pass(),
            draw_calls: frame.draw_calls(),
            presented: true,
        };
        self.log.borrow_mut().frames.push(submitted);
        Ok(())
    }
}

/// A view that hands out numbered drawables, or none at all.
#[derive(Debug, Clone)]
pub struct RecordingView {
    config: ViewConfig,
    drawables_available: bool,
    next_drawable: u32,
}

impl RecordingView {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            drawables_available: true,
            next_drawable: 0,
        }
    }

    pub fn without_drawables(mut self) -> Self {
        self.drawables_available = false;
        self
    }
}

impl View<RecordingDevice> for RecordingView {
    fn current_drawable(&mut self) -> Result<RecordedDrawable> {
        if !self.drawables_available {
            return Err(RenderError::NoDrawable("view has no drawable".into()));
        }
        let drawable = RecordedDrawable(self.next_drawable);
        self.next_drawable += 1;
        Ok(drawable)
    }

    fn pass_descriptor(&self) -> RenderPassDescriptor {
        RenderPassDescriptor {
            clear_colour: self.config.clear_colour,
            width: self.config.width,
            height: self.config.height,
        }
    }

    fn color_format(&self) -> wgpu::TextureFormat {
        self.config.color_format
    }
}
