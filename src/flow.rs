//! Application event loop.
//!
//! Opens a fixed-size window, sets up the GPU against it and renders the
//! wireframe exactly once, on the first redraw. The window then stays open
//! until it is closed. Any failure ends the event loop and is returned from
//! [`run`].

use std::sync::Arc;

use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{config::Config, context::Context, playground::render_once};

struct App {
    async_runtime: Runtime,
    config: Config,
    context: Option<Context>,
    presented: bool,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: Runtime::new()?,
            config,
            context: None,
            presented: false,
            failure: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.failure = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.context.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title("wire-ngin")
            .with_inner_size(PhysicalSize::new(
                self.config.view.width,
                self.config.view.height,
            ))
            .with_resizable(false);
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match self
            .async_runtime
            .block_on(Context::new(window, self.config.view))
        {
            Ok(context) => {
                context.window().request_redraw();
                self.context = Some(context);
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested if !self.presented => {
                let Some(context) = self.context.as_mut() else {
                    return;
                };
                self.presented = true;
                let result = self.async_runtime.block_on(render_once(
                    context.device.clone(),
                    &mut context.view,
                    &self.config.assets,
                ));
                match result {
                    Ok(report) => {
                        for draw in &report.draw_calls {
                            log::info!(
                                "drew {} indices ({:?}) with fill mode {:?}",
                                draw.index_count,
                                draw.index_format,
                                draw.fill_mode
                            );
                        }
                    }
                    Err(e) => self.fail(event_loop, e.into()),
                }
            }
            _ => (),
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let config = Config::from_env();
    log::info!(
        "rendering {:?} from {:?}",
        config.assets.model,
        config.assets.root()
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
