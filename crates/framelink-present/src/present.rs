// SPDX-License-Identifier: CEPL-1.0
//! The per-frame driver.

use ash::vk;
use tracing::{debug, trace, warn};

use crate::device::PresentDevice;
use crate::error::{FrameStatus, PresentError, PresentResult};
use crate::frame::{FrameCounter, FrameResourceSet, MAX_FRAMES_IN_FLIGHT};
use crate::recreate::Rebuild;
use crate::select::VsyncMode;
use crate::swapchain::SwapchainState;
use crate::RenderSize;

/// Rendering context for one surface: the device, the live swapchain and the
/// per-frame resources. Every component works on it by reference; there is no
/// other shared state.
pub struct Presenter<D: PresentDevice> {
    pub(crate) device: D,
    pub(crate) swapchain: Option<SwapchainState>,
    pub(crate) frames: FrameResourceSet,
    pub(crate) counter: FrameCounter,
    pub(crate) vsync: VsyncMode,
    /// Raised by the window's resize notification.
    pub(crate) resize_pending: bool,
    /// A rebuild was requested but the surface extent was degenerate.
    pub(crate) rebuild_deferred: bool,
}

impl<D: PresentDevice> Presenter<D> {
    /// Allocates frame resources and builds the first swapchain. A window that
    /// starts minimized leaves the swapchain unbuilt until it has a size.
    pub fn new(device: D, window: RenderSize, vsync: VsyncMode) -> PresentResult<Self> {
        let frames = FrameResourceSet::new(&device, MAX_FRAMES_IN_FLIGHT)?;
        let mut presenter = Self {
            device,
            swapchain: None,
            frames,
            counter: FrameCounter::new(MAX_FRAMES_IN_FLIGHT),
            vsync,
            resize_pending: false,
            rebuild_deferred: false,
        };
        // on error `presenter` drops here and releases the frame resources
        presenter.recreate_swapchain(window)?;
        Ok(presenter)
    }

    /// Resize notification from the window. Consumed by the next
    /// [`Self::draw_frame`].
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// Changes the present-mode preference; takes effect on the next rebuild,
    /// which this schedules.
    pub fn set_vsync_mode(&mut self, vsync: VsyncMode) {
        if self.vsync != vsync {
            self.vsync = vsync;
            self.resize_pending = true;
        }
    }

    /// Runs one acquire → record → submit → present cycle.
    ///
    /// `window` is the live framebuffer size, used if the swapchain has to be
    /// rebuilt during this cycle.
    pub fn draw_frame(&mut self, window: RenderSize) -> PresentResult<FrameStatus> {
        if self.swapchain.is_none() || self.rebuild_deferred {
            if let Rebuild::Deferred = self.recreate_swapchain(window)? {
                return Ok(FrameStatus::Deferred);
            }
        }
        let resize_observed = self.resize_pending;

        let slot = *self.frames.slot(self.counter.index());
        let Some((swapchain, extent)) = self
            .swapchain
            .as_ref()
            .map(|sc| (sc.handle(), sc.extent()))
        else {
            return Ok(FrameStatus::Deferred);
        };

        // 1) WaitPrevious. Bounds the CPU to MAX_FRAMES_IN_FLIGHT frames ahead.
        self.device
            .wait_for_fence(slot.in_flight)
            .map_err(PresentError::vk("wait_for_fences"))?;

        // 2) Acquire
        let (image_index, acquire_suboptimal) =
            match self.device.acquire_next_image(swapchain, slot.image_acquired) {
                Ok(pair) => pair,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("acquire: swapchain out of date, frame skipped");
                    self.recreate_swapchain(window)?;
                    return Ok(FrameStatus::Skipped);
                }
                Err(e) => return Err(PresentError::vk("acquire_next_image")(e)),
            };
        let framebuffer = self
            .swapchain
            .as_ref()
            .and_then(|sc| sc.framebuffer(image_index))
            .ok_or(PresentError::Vk {
                stage: "acquire_next_image",
                result: vk::Result::ERROR_UNKNOWN,
            })?;

        // 3) Record, then reset the fence. A failed recording leaves the fence
        // signaled so a later wait on it still returns.
        self.device
            .reset_command_buffer(slot.cmd)
            .map_err(PresentError::vk("reset_command_buffer"))?;
        self.device
            .record_draw(slot.cmd, framebuffer, extent)
            .map_err(PresentError::vk("record_command_buffer"))?;
        self.device
            .reset_fence(slot.in_flight)
            .map_err(PresentError::vk("reset_fences"))?;

        // 4) Submit
        self.device
            .submit(
                slot.cmd,
                slot.image_acquired,
                slot.render_finished,
                slot.in_flight,
            )
            .map_err(PresentError::vk("queue_submit"))?;

        // 5) Present
        let stale = match self
            .device
            .present(swapchain, image_index, slot.render_finished)
        {
            Ok(suboptimal) => suboptimal || acquire_suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(PresentError::vk("queue_present")(e)),
        };

        // 6) Advance
        self.counter.advance();
        trace!(image_index, frame = self.counter.index(), "frame presented");

        if stale || resize_observed {
            debug!(stale, resize_observed, "present: rebuilding swapchain");
            self.recreate_swapchain(window)?;
            return Ok(FrameStatus::Recreated);
        }
        Ok(FrameStatus::Presented)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.swapchain.as_ref()
    }

    /// Extent of the live swapchain, if one is built.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(SwapchainState::extent)
    }

    /// Color format of the live swapchain, if one is built.
    pub fn format(&self) -> Option<vk::Format> {
        self.swapchain.as_ref().map(SwapchainState::format)
    }

    pub fn frame_index(&self) -> usize {
        self.counter.index()
    }

    pub fn frames(&self) -> &FrameResourceSet {
        &self.frames
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }
}

// Shutdown drains the device before releasing anything in-flight work may use.
impl<D: PresentDevice> Drop for Presenter<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("device_wait_idle on shutdown: {e:?}");
        }
        if let Some(sc) = self.swapchain.take() {
            sc.destroy(&self.device);
        }
        std::mem::take(&mut self.frames).destroy(&self.device);
        debug!("presenter destroyed");
    }
}
