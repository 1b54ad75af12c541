// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device setup plus the `ash` implementation of
//! [`PresentDevice`](framelink_present::PresentDevice).
#![deny(unsafe_op_in_unsafe_fn)]

mod context;
mod device;
mod pipeline;

use anyhow::{Context, Result};
use framelink_present::{FrameStatus, Presenter, RenderSize, VsyncMode};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

pub use device::AshDevice;
pub use framelink_present::vk;

/// Startup options for [`VkRenderer::new`].
#[derive(Clone, Copy, Debug)]
pub struct RenderSettings {
    pub clear_color: [f32; 4],
    pub vsync: VsyncMode,
    /// Honored in debug builds only.
    pub validation: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: VsyncMode::default(),
            validation: true,
        }
    }
}

pub struct VkRenderer {
    presenter: Presenter<AshDevice>,
}

impl VkRenderer {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let validation = cfg!(debug_assertions) && settings.validation;
        let device = AshDevice::new(window, display, validation, settings.clear_color)?;
        let presenter =
            Presenter::new(device, size, settings.vsync).context("initial swapchain")?;

        match presenter.extent() {
            Some(e) => info!("Vulkan presenter ready ({}x{})", e.width, e.height),
            None => info!("Vulkan presenter ready (swapchain deferred until the window has a size)"),
        }
        Ok(Self { presenter })
    }

    /// Draws and presents one frame. `size` is the window's current
    /// framebuffer size, used if the swapchain has to be rebuilt.
    pub fn render(&mut self, size: RenderSize) -> Result<FrameStatus> {
        let status = self.presenter.draw_frame(size)?;
        Ok(status)
    }

    pub fn notify_resized(&mut self) {
        self.presenter.notify_resized();
    }

    pub fn set_vsync_mode(&mut self, mode: VsyncMode) {
        self.presenter.set_vsync_mode(mode);
    }

    /// Applies from the next recorded frame.
    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.presenter.device().set_clear_color(rgba);
    }

    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.presenter.extent()
    }

    pub fn format(&self) -> Option<vk::Format> {
        self.presenter.format()
    }
}
