// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::Parser;
use framelink_core::init_tracing;
use framelink_platform::framebuffer_size;
use framelink_present::{FrameStatus, RenderSize};
use framelink_vk::VkRenderer;
use tracing::{debug, error, info};

use framelink_platform::winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowId},
};

use config::{load_cfg, AppCfg, VsyncCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_PATH)]
    config: PathBuf,

    /// Present-mode preference; overrides the config file
    #[arg(long, value_enum)]
    vsync_mode: Option<VsyncCfg>,
}

struct App {
    cfg: AppCfg,
    // dropped before the window: the surface must not outlive it
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    fatal: Option<anyhow::Error>,
    exiting: bool,
    // surface reported no usable size; wait for the next resize
    deferred: bool,

    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn size(&self) -> RenderSize {
        self.window
            .as_ref()
            .map(|w| {
                let (width, height) = framebuffer_size(w);
                RenderSize::new(width, height)
            })
            .unwrap_or_default()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("fatal: {err:#}");
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let wcfg = &self.cfg.window;
        let attrs = Window::default_attributes()
            .with_title(wcfg.title.clone())
            .with_inner_size(LogicalSize::new(wcfg.width, wcfg.height));
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| anyhow!("create_window: {e}"))?;

        let (width, height) = framebuffer_size(&window);
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("window_handle: {e}"))?;
        let dh = window
            .display_handle()
            .map_err(|e| anyhow!("display_handle: {e}"))?;

        let settings = self.cfg.render.settings();
        let renderer = VkRenderer::new(&wh, &dh, RenderSize::new(width, height), &settings)?;
        info!(
            "vsync mode = {:?}, validation = {}",
            settings.vsync,
            cfg!(debug_assertions) && settings.validation
        );

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Wait);
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
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                debug!("Resized → {}x{}", new_size.width, new_size.height);
                self.deferred = false;
                if let Some(r) = &mut self.renderer {
                    r.notify_resized();
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                let size = self.size();
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                match renderer.render(size) {
                    Ok(FrameStatus::Presented | FrameStatus::Recreated) => {
                        self.frames = self.frames.saturating_add(1);
                    }
                    Ok(FrameStatus::Skipped) => {}
                    Ok(FrameStatus::Deferred) => self.deferred = true,
                    Err(e) => self.fail(event_loop, e),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if keep_drawing(self.deferred, self.size()) {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            debug!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

/// Minimized or no usable surface size: sleep until a resize wakes us.
fn keep_drawing(deferred: bool, size: RenderSize) -> bool {
    !deferred && !size.is_empty()
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = load_cfg(&args.config);
    if let Some(mode) = args.vsync_mode {
        cfg.render.vsync_mode = mode;
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        renderer: None,
        window: None,
        fatal: None,
        exiting: false,
        deferred: false,
        frames: 0,
        last_fps_instant: Instant::now(),
    };

    event_loop.run_app(&mut app)?;
    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
