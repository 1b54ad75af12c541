// SPDX-License-Identifier: CEPL-1.0
//! The live swapchain and everything derived from its images.

use ash::vk;
use tracing::{debug, info};

use crate::caps::SurfaceCapabilities;
use crate::device::{PresentDevice, SwapchainDesc};
use crate::error::{PresentError, PresentResult};
use crate::select::{cs_name, fmt_name, pm_name, SwapchainConfig, VsyncMode};
use crate::RenderSize;

/// Owns the swapchain handle, one image view and one framebuffer per image.
/// Images belong to the swapchain and are released with it.
///
/// There is no `Drop`: destruction needs the device, so it goes through
/// [`SwapchainState::destroy`], the only teardown path.
#[derive(Debug)]
pub struct SwapchainState {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    config: SwapchainConfig,
}

impl SwapchainState {
    /// Selects a configuration from `caps`, creates the swapchain and one
    /// view per image. Framebuffers come later via [`Self::create_framebuffers`].
    pub fn build<D: PresentDevice + ?Sized>(
        device: &D,
        caps: &SurfaceCapabilities,
        window: RenderSize,
        vsync: VsyncMode,
    ) -> PresentResult<Self> {
        let config = SwapchainConfig::derive(caps, window, vsync)?;
        let desc = SwapchainDesc {
            config,
            sharing: device.queue_families().sharing(),
            pre_transform: caps.limits.current_transform,
        };

        info!(
            "swapchain: format {} / {}, present_mode {}, extent {}x{}, images(min={} max={} → picked={}), sharing {:?}",
            fmt_name(config.format),
            cs_name(config.color_space),
            pm_name(config.present_mode),
            config.extent.width,
            config.extent.height,
            caps.min_image_count(),
            caps.max_image_count(),
            config.image_count,
            desc.sharing,
        );

        let handle = device
            .create_swapchain(&desc)
            .map_err(PresentError::vk("create_swapchain"))?;

        let mut state = Self {
            handle,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            config,
        };

        if let Err(e) = state.create_views(device) {
            state.destroy(device);
            return Err(e);
        }

        debug!(images = state.images.len(), "swapchain images ready");
        Ok(state)
    }

    fn create_views<D: PresentDevice + ?Sized>(&mut self, device: &D) -> PresentResult<()> {
        self.images = device
            .swapchain_images(self.handle)
            .map_err(PresentError::vk("get_swapchain_images"))?;

        self.image_views.reserve(self.images.len());
        for &image in &self.images {
            let view = device
                .create_image_view(image, self.config.format)
                .map_err(PresentError::vk("create_image_view"))?;
            self.image_views.push(view);
        }
        Ok(())
    }

    /// One framebuffer per image view, sized to the swapchain extent.
    pub fn create_framebuffers<D: PresentDevice + ?Sized>(
        &mut self,
        device: &D,
    ) -> PresentResult<()> {
        debug_assert!(self.framebuffers.is_empty());
        device
            .swapchain_extent_changed(self.config.extent)
            .map_err(PresentError::vk("rebuild_pipeline"))?;

        self.framebuffers.reserve(self.image_views.len());
        for &view in &self.image_views {
            let fb = device
                .create_framebuffer(view, self.config.extent)
                .map_err(PresentError::vk("create_framebuffer"))?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    /// Destroys framebuffers, then views, then the swapchain. The caller must
    /// guarantee no GPU work still references them.
    pub fn destroy<D: PresentDevice + ?Sized>(self, device: &D) {
        for fb in self.framebuffers {
            device.destroy_framebuffer(fb);
        }
        for view in self.image_views {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.handle);
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    pub fn format(&self) -> vk::Format {
        self.config.format
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }
}
