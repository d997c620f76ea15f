// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use orbit_assets::{MeshData, TextureData};
use orbit_core::{as_millis_f32, init_tracing, FrameClock};
use orbit_render::{FrameOutcome, RenderSize};
use orbit_render_vk::VkFrameDevice;
use tracing::{debug, error, info};

use orbit_platform::translate;
use orbit_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::{AppConfig, DEFAULT_CONFIG};
use crate::session::{LoopControl, Session};

const CHECKER_SIZE: u32 = 256;
const CHECKER_CELLS: u32 = 8;

#[derive(Parser, Debug)]
#[command(author, version, about = "Orbit a textured mesh with the mouse", long_about = None)]
struct Args {
    /// Config file; missing means built-in defaults
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Wavefront OBJ to display instead of the built-in quad
    #[arg(long)]
    mesh: Option<PathBuf>,
    /// PNG/JPEG or KTX2 texture instead of the built-in checkerboard
    #[arg(long)]
    texture: Option<PathBuf>,
    /// MSAA sample count (clamped to what the GPU supports)
    #[arg(long)]
    msaa: Option<u32>,
    /// Present without waiting for vertical blank
    #[arg(long)]
    no_vsync: bool,
}

impl Args {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(mesh) = self.mesh {
            cfg.assets.mesh = Some(mesh);
        }
        if let Some(texture) = self.texture {
            cfg.assets.texture = Some(texture);
        }
        if let Some(msaa) = self.msaa {
            cfg.render.msaa_samples = msaa;
        }
        if self.no_vsync {
            cfg.render.vsync = false;
        }
    }
}

fn load_assets(cfg: &AppConfig) -> Result<(MeshData, TextureData)> {
    let mesh = match &cfg.assets.mesh {
        Some(path) => MeshData::load_obj(path)?,
        None => MeshData::quad(),
    };
    let mut texture = match &cfg.assets.texture {
        Some(path) => TextureData::load(path)?,
        None => TextureData::checker(CHECKER_SIZE, CHECKER_CELLS)?,
    };
    // A container that ships its own chain is uploaded as is.
    if texture.mip_levels() == 1 {
        texture.generate_mips();
    }
    info!(
        "assets: {} vertices, {} indices, texture {}x{} ({} mips)",
        mesh.vertices.len(),
        mesh.index_count(),
        texture.width(),
        texture.height(),
        texture.mip_levels()
    );
    Ok((mesh, texture))
}

struct App {
    cfg: AppConfig,
    // Declaration order is drop order: the session (and its surface) must go
    // before the window it renders into.
    session: Option<Session<VkFrameDevice>>,
    window: Option<Window>,
    clock: FrameClock,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            session: None,
            window: None,
            clock: FrameClock::new(),
            failure: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = event_loop.create_window(attrs).context("create_window")?;

        let size = window.inner_size();
        let (mesh, texture) = load_assets(&self.cfg)?;
        let device = VkFrameDevice::new(
            &window,
            RenderSize::new(size.width, size.height),
            self.cfg.render.into(),
            &mesh,
            &texture,
        )?;
        self.session = Some(Session::new(device)?);
        self.window = Some(window);
        self.clock = FrameClock::new();
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Dropping the session idles the device and releases everything in
        // reverse creation order.
        if let Some(session) = self.session.take() {
            info!(
                "shutting down after {} frames presented over {} loop iterations",
                session.frame_loop().presented(),
                self.clock.frames()
            );
        }
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.failure = Some(e);
        self.shutdown(event_loop);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = &mut self.session else {
            return;
        };
        let ms = as_millis_f32(self.clock.tick());
        match session.iterate(ms) {
            Ok((outcome, control)) => {
                if let FrameOutcome::Skipped(reason) = outcome {
                    debug!("frame skipped: {reason:?}");
                }
                if control == LoopControl::Exit {
                    self.shutdown(event_loop);
                }
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &self.window {
            Some(window) if window.id() == window_id => {}
            _ => return,
        }

        if let WindowEvent::RedrawRequested = event {
            self.redraw(event_loop);
            return;
        }
        if let (Some(session), Some(input)) = (&mut self.session, translate(&event)) {
            session.push_event(input);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = AppConfig::load(&args.config)?;
    args.apply(&mut cfg);
    debug!("config: {cfg:?}");

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
