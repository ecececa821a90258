use std::sync::Arc;

use winit::window::Window;

use crate::{
    backend::native::{NativeDevice, NativeView},
    config::ViewConfig,
    error::{RenderError, Result},
};

pub fn mk_instance() -> wgpu::Instance {
    // PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    })
}

/// GPU state bound to a window.
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub device: NativeDevice,
    pub view: NativeView,
}

impl Context {
    pub async fn new(window: Arc<Window>, mut config: ViewConfig) -> Result<Self> {
        let size = window.inner_size();
        if size.width > 0 && size.height > 0 {
            config.width = size.width;
            config.height = size.height;
        }

        log::info!("WGPU setup");
        let instance = mk_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::NoDrawable(e.to_string()))?;
        let device = NativeDevice::new(&instance, Some(&surface)).await?;
        let view = NativeView::for_surface(&device, surface, config)?;

        Ok(Self {
            window,
            device,
            view,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

/// Device plus an offscreen view, for rendering without a window.
pub async fn headless(config: ViewConfig) -> Result<(NativeDevice, NativeView)> {
    let instance = mk_instance();
    let device = NativeDevice::new(&instance, None).await?;
    let view = NativeView::offscreen(&device, config);
    Ok((device, view))
}
