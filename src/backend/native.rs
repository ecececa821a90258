//! wgpu backend.
//!
//! [`NativeDevice`] wraps an adapter, device and queue. Frames are replayed into
//! a single render pass targeting either a window surface texture or an
//! offscreen texture owned by [`NativeView`].
//!
//! Wireframe rendering needs `Features::POLYGON_MODE_LINE`. It is requested
//! whenever the adapter offers it; each pipeline is then created twice, once
//! per polygon mode, so the fill mode can be switched while encoding.

use std::{
    borrow::Cow,
    iter, pin,
    task::{Context, Poll, Waker},
    time::Duration,
};

use wgpu::util::DeviceExt;

use crate::{
    backend::{BufferUsage, CommandQueue, GpuDevice, View},
    config::ViewConfig,
    error::{RenderError, Result},
    pipelines::state::PipelineDescriptor,
    render::{EncodedFrame, FillMode, RenderCommand, RenderPassDescriptor},
};

#[derive(Debug, Clone)]
pub struct NativeDevice {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    wireframe: bool,
}

impl NativeDevice {
    /// Picks an adapter (compatible with `surface` when given) and opens a device on it.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::DeviceUnavailable(e.to_string()))?;

        let wireframe = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if wireframe {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Wireframe Device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::DeviceUnavailable(e.to_string()))?;

        log::info!(
            "using {} ({:?}), wireframe supported: {wireframe}",
            adapter.get_info().name,
            adapter.get_info().backend
        );
        Ok(Self {
            adapter,
            device,
            queue,
            wireframe,
        })
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

/// One pipeline per polygon mode.
#[derive(Debug)]
pub struct NativePipeline {
    fill: wgpu::RenderPipeline,
    lines: Option<wgpu::RenderPipeline>,
}

impl NativePipeline {
    fn for_fill_mode(&self, fill_mode: FillMode) -> Result<&wgpu::RenderPipeline> {
        match fill_mode {
            FillMode::Fill => Ok(&self.fill),
            FillMode::Lines => self.lines.as_ref().ok_or_else(|| {
                RenderError::BackendRejected("device cannot rasterize triangles as lines".into())
            }),
        }
    }
}

impl GpuDevice for NativeDevice {
    type Buffer = wgpu::Buffer;
    type ShaderModule = wgpu::ShaderModule;
    type Pipeline = NativePipeline;
    type Drawable = NativeDrawable;
    type Queue = NativeQueue;

    fn name(&self) -> String {
        self.adapter.get_info().name
    }

    fn make_command_queue(&self) -> Result<NativeQueue> {
        Ok(NativeQueue {
            device: self.device.clone(),
            queue: self.queue.clone(),
        })
    }

    fn make_buffer(&self, label: &str, contents: &[u8], usage: BufferUsage) -> wgpu::Buffer {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    fn make_shader_module(&self, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
        validated(&self.device, || {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
                })
        })
    }

    fn make_render_pipeline(&self, desc: &PipelineDescriptor<'_, Self>) -> Result<NativePipeline> {
        let fill = validated(&self.device, || {
            mk_render_pipeline(&self.device, desc, FillMode::Fill.to_wgpu())
        })?;
        let lines = if desc.wireframe {
            Some(validated(&self.device, || {
                mk_render_pipeline(&self.device, desc, FillMode::Lines.to_wgpu())
            })?)
        } else {
            None
        };
        Ok(NativePipeline { fill, lines })
    }

    fn supports_wireframe(&self) -> bool {
        self.wireframe
    }
}

/// Runs `create` inside a validation error scope and turns a captured error
/// into [`RenderError::BackendRejected`].
fn validated<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> Result<T> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let created = create();
    let mut popped = pin::pin!(scope.pop());
    // Native backends resolve the scope synchronously.
    match popped.as_mut().poll(&mut Context::from_waker(Waker::noop())) {
        Poll::Ready(Some(e)) => Err(RenderError::BackendRejected(e.to_string())),
        Poll::Ready(None) => Ok(created),
        Poll::Pending => {
            log::warn!("validation scope did not resolve, assuming success");
            Ok(created)
        }
    }
}

fn mk_render_pipeline(
    device: &wgpu::Device,
    desc: &PipelineDescriptor<'_, NativeDevice>,
    polygon_mode: wgpu::PolygonMode,
) -> wgpu::RenderPipeline {
    let vertex_layout = desc.vertex_layout.to_wgpu();
    let buffers = vertex_layout.buffers();
    let label = format!("{} ({polygon_mode:?})", desc.label);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(&label),
        // The shader has no bindings, so the implicit layout is empty.
        layout: None,
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: Some(desc.vertex_entry),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: Some(desc.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

#[derive(Debug)]
pub struct NativeQueue {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl CommandQueue<NativeDevice> for NativeQueue {
    fn commit(&self, frame: EncodedFrame<'_, NativeDevice>) -> Result<()> {
        let (drawable, pass, commands) = frame.into_parts();
        let view = drawable
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Wireframe Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(pass.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            let mut pipeline = None;
            let mut fill_mode = FillMode::default();
            for command in &commands {
                match command {
                    RenderCommand::SetPipeline(state) => pipeline = Some(state.raw()),
                    RenderCommand::SetFillMode(mode) => fill_mode = *mode,
                    RenderCommand::SetVertexBuffer {
                        index,
                        buffer,
                        offset,
                    } => render_pass.set_vertex_buffer(*index, buffer.slice(*offset..)),
                    RenderCommand::DrawIndexed {
                        index_count,
                        index_format,
                        index_buffer,
                        index_buffer_offset,
                    } => {
                        let pipeline: &NativePipeline = pipeline.ok_or_else(|| {
                            RenderError::BackendRejected(
                                "draw encoded before a pipeline was set".into(),
                            )
                        })?;
                        render_pass.set_pipeline(pipeline.for_fill_mode(fill_mode)?);
                        render_pass
                            .set_index_buffer(index_buffer.slice(*index_buffer_offset..), *index_format);
                        render_pass.draw_indexed(0..*index_count, 0, 0..1);
                    }
                }
            }
        }

        // Fire and forget: completion is never awaited.
        self.queue.submit(iter::once(encoder.finish()));
        drawable.present();
        Ok(())
    }
}

pub enum NativeDrawable {
    Surface(wgpu::SurfaceTexture),
    Offscreen(wgpu::Texture),
}

impl NativeDrawable {
    pub fn texture(&self) -> &wgpu::Texture {
        match self {
            Self::Surface(output) => &output.texture,
            Self::Offscreen(texture) => texture,
        }
    }

    fn present(self) {
        match self {
            Self::Surface(output) => output.present(),
            Self::Offscreen(_) => (),
        }
    }
}

enum ViewTarget {
    Surface(wgpu::Surface<'static>),
    Offscreen(wgpu::Texture),
}

/// The live view: a configured window surface, or an offscreen texture of the
/// same size and format for headless runs.
pub struct NativeView {
    target: ViewTarget,
    config: ViewConfig,
}

impl NativeView {
    pub fn offscreen(device: &NativeDevice, config: ViewConfig) -> Self {
        let texture = device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen View"),
            size: wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self {
            target: ViewTarget::Offscreen(texture),
            config,
        }
    }

    /// Configures `surface` for the view. Falls back to the surface's preferred
    /// format when the configured one is not offered.
    pub fn for_surface(
        device: &NativeDevice,
        surface: wgpu::Surface<'static>,
        mut config: ViewConfig,
    ) -> Result<Self> {
        let caps = surface.get_capabilities(&device.adapter);
        let Some(preferred) = caps.formats.first().copied() else {
            return Err(RenderError::NoDrawable(
                "surface is incompatible with the adapter".into(),
            ));
        };
        if !caps.formats.contains(&config.color_format) {
            log::warn!(
                "{:?} is not supported by the surface, using {preferred:?}",
                config.color_format
            );
            config.color_format = preferred;
        }
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: config.color_format,
            width: config.width.max(1),
            height: config.height.max(1),
            present_mode: caps.present_modes[0],
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device.device, &surface_config);
        Ok(Self {
            target: ViewTarget::Surface(surface),
            config,
        })
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Copies the offscreen texture back into an RGBA image, waiting for the GPU.
    pub async fn read_pixels(&self, device: &NativeDevice) -> Result<image::RgbaImage> {
        let ViewTarget::Offscreen(texture) = &self.target else {
            return Err(RenderError::NoDrawable(
                "only offscreen views can be read back".into(),
            ));
        };
        let width = self.config.width.max(1);
        let height = self.config.height.max(1);
        let unpadded_row = 4 * width;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let output_buffer = device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read Back Buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Back Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        device.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .map_err(|e| RenderError::BackendRejected(e.to_string()))?;
        rx.receive()
            .await
            .ok_or_else(|| RenderError::BackendRejected("read back was cancelled".into()))?
            .map_err(|e| RenderError::BackendRejected(e.to_string()))?;

        let bgra = matches!(
            self.config.color_format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mut pixels = Vec::with_capacity((unpadded_row * height) as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in data.chunks(padded_row as usize) {
                for texel in row[..unpadded_row as usize].chunks_exact(4) {
                    if bgra {
                        pixels.extend_from_slice(&[texel[2], texel[1], texel[0], texel[3]]);
                    } else {
                        pixels.extend_from_slice(texel);
                    }
                }
            }
        }
        output_buffer.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::BackendRejected("read back size mismatch".into()))
    }
}

impl View<NativeDevice> for NativeView {
    fn current_drawable(&mut self) -> Result<NativeDrawable> {
        match &self.target {
            ViewTarget::Surface(surface) => match surface.get_current_texture() {
                wgpu::CurrentSurfaceTexture::Success(texture)
                | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                    Ok(NativeDrawable::Surface(texture))
                }
                other => Err(RenderError::NoDrawable(format!("{other:?}"))),
            },
            ViewTarget::Offscreen(texture) => Ok(NativeDrawable::Offscreen(texture.clone())),
        }
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
