// SPDX-License-Identifier: CEPL-1.0
//! In-place swapchain rebuild.

use tracing::{debug, info};

use crate::caps;
use crate::device::PresentDevice;
use crate::error::{PresentError, PresentResult};
use crate::present::Presenter;
use crate::select::{choose_extent, is_degenerate};
use crate::swapchain::SwapchainState;
use crate::RenderSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rebuild {
    Rebuilt,
    /// Surface extent is degenerate; the old swapchain (if any) is kept and
    /// the rebuild is retried on the next cycle.
    Deferred,
}

impl<D: PresentDevice> Presenter<D> {
    /// Rebuilds the swapchain and everything derived from it. Frame slots and
    /// the command pool are untouched.
    ///
    /// Safe to call repeatedly: each call leaves exactly one live swapchain,
    /// or none only if no usable extent has ever been seen.
    pub fn recreate_swapchain(&mut self, window: RenderSize) -> PresentResult<Rebuild> {
        let caps = caps::probe(&self.device);
        let extent = choose_extent(&caps.limits, window);
        if window.is_empty() || is_degenerate(extent) {
            if !self.rebuild_deferred {
                info!(
                    "surface extent {}x{} (window {}x{}), swapchain rebuild deferred",
                    extent.width, extent.height, window.width, window.height
                );
            }
            self.rebuild_deferred = true;
            return Ok(Rebuild::Deferred);
        }

        // STRICT ORDER: drain → framebuffers → views → swapchain → rebuild.
        self.device
            .wait_idle()
            .map_err(PresentError::vk("device_wait_idle"))?;
        if let Some(old) = self.swapchain.take() {
            old.destroy(&self.device);
        }
        self.resize_pending = false;

        let mut state = SwapchainState::build(&self.device, &caps, window, self.vsync)?;
        if let Err(e) = state.create_framebuffers(&self.device) {
            state.destroy(&self.device);
            return Err(e);
        }

        debug!(
            width = state.extent().width,
            height = state.extent().height,
            images = state.image_count(),
            "swapchain rebuilt"
        );
        self.swapchain = Some(state);
        self.rebuild_deferred = false;
        Ok(Rebuild::Rebuilt)
    }
}
