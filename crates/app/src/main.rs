//! inflight - renders one spinning textured mesh with Vulkan.
//!
//! Loads `inflight.toml` (or the file given with `--config`), applies
//! command-line overrides, and runs the winit event loop. Any renderer
//! error ends the process with a non-zero exit status.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use inflight_core::{Config, GeometryKind};
use inflight_platform::{FramebufferSignal, Window, is_degenerate};
use inflight_renderer::{FrameStatus, Renderer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file. Missing files fall back to defaults.
    #[arg(long, default_value = "inflight.toml")]
    config: PathBuf,

    /// Geometry to draw.
    #[arg(long)]
    geometry: Option<CliGeometry>,

    /// OBJ model to load. Implies `--geometry model`.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Number of frames the CPU may record ahead of the GPU.
    #[arg(long)]
    frames_in_flight: Option<usize>,

    /// Render without multisampling.
    #[arg(long)]
    no_msaa: bool,

    /// Enable the Vulkan validation layer.
    #[arg(long)]
    validation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliGeometry {
    /// Built-in textured quad.
    Quad,
    /// OBJ model from `--model` or the config file.
    Model,
}

impl From<CliGeometry> for GeometryKind {
    fn from(value: CliGeometry) -> Self {
        match value {
            CliGeometry::Quad => GeometryKind::Quad,
            CliGeometry::Model => GeometryKind::Model,
        }
    }
}

impl Args {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.model {
            config.scene.model_path = path.clone();
            config.scene.geometry = GeometryKind::Model;
        }
        if let Some(geometry) = self.geometry {
            config.scene.geometry = geometry.into();
        }
        if let Some(frames) = self.frames_in_flight {
            config.renderer.frames_in_flight = frames;
        }
        if self.no_msaa {
            config.renderer.msaa = false;
        }
        if self.validation {
            config.renderer.validation = true;
        }
    }
}

struct App {
    config: Config,
    size: FramebufferSignal,
    // Dropped before the window it presents to
    renderer: Option<Renderer>,
    window: Option<Window>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let size = FramebufferSignal::new((config.window.width, config.window.height));
        Self {
            config,
            size,
            renderer: None,
            window: None,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        error!("{:#}", error);
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match renderer.draw_frame() {
            Ok(FrameStatus::Suspended) => {
                // Nothing to draw until the next Resized event
                event_loop.set_control_flow(ControlFlow::Wait);
            }
            Ok(_) => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            Err(e) => self.fail(event_loop, anyhow!(e).context("Frame failed")),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        ) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, anyhow!(e).context("Failed to create window")),
        };

        let (width, height) = window.framebuffer_size();
        self.size.notify(width, height);

        match Renderer::new(&window, self.size.clone(), &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                window.request_redraw();
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, anyhow!(e).context("Failed to create renderer")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                info!("Escape pressed, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                self.size.notify(size.width, size.height);

                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.request_resize();
                }
                if !is_degenerate((size.width, size.height)) {
                    event_loop.set_control_flow(ControlFlow::Poll);
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = &self.renderer {
            info!("Rendered {} frames", renderer.frame_counter());
            renderer.wait_idle();
        }
        self.renderer = None;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    inflight_core::init_logging(&config.logging.filter);
    info!("Starting inflight");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
