// SPDX-License-Identifier: CEPL-1.0
//! The device seam used by the presentation subsystem.
//!
//! Methods mirror the Vulkan entry points they wrap and return raw
//! [`vk::Result`] codes so callers can tell `ERROR_OUT_OF_DATE_KHR` apart
//! from fatal failures. Acquire and present report "suboptimal" through the
//! `bool` in their `Ok` value, as `ash` does.

use ash::prelude::VkResult;
use ash::vk;

use crate::caps::SurfaceCapabilities;
use crate::select::SwapchainConfig;

/// Queue families serving graphics and presentation. Often the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn sharing(&self) -> ImageSharing {
        if self.graphics == self.present {
            ImageSharing::Exclusive
        } else {
            ImageSharing::Concurrent([self.graphics, self.present])
        }
    }
}

/// How swapchain images are shared between queue families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSharing {
    /// One family owns the images; no ownership transfer needed.
    Exclusive,
    /// Images are used concurrently by the listed families.
    Concurrent([u32; 2]),
}

/// Everything a backend needs to create a swapchain.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub config: SwapchainConfig,
    pub sharing: ImageSharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

pub trait PresentDevice {
    /// Queries the presentation surface. Query failures are reported as empty
    /// format/mode sets, never as errors.
    fn surface_capabilities(&self) -> SurfaceCapabilities;

    fn queue_families(&self) -> QueueFamilies;

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;

    /// Images are owned by the swapchain and must not be destroyed individually.
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// 2D color view with identity swizzle, one mip level and one layer.
    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    /// Framebuffer for the fixed render pass with `view` as its only attachment.
    fn create_framebuffer(
        &self,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Called after a swapchain (re)build, before framebuffers are created.
    /// Backends with extent-dependent pipeline state rebuild it here.
    fn swapchain_extent_changed(&self, _extent: vk::Extent2D) -> VkResult<()> {
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;

    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;

    fn destroy_fence(&self, fence: vk::Fence);

    /// Allocates primary command buffers from the backend's command pool.
    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]);

    /// Blocks without timeout until `fence` is signaled.
    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()>;

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// Blocks without timeout for the next presentable image and signals
    /// `signal` once it is ready for rendering.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    /// Records the fixed frame: begin render pass on `framebuffer`, bind the
    /// pipeline, draw the triangle, end render pass.
    fn record_draw(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> VkResult<()>;

    /// Submits `cmd` to the graphics queue. The submission waits on `wait` at
    /// COLOR_ATTACHMENT_OUTPUT and signals `signal` and `fence` on completion.
    fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// Queues `image_index` for presentation after `wait` is signaled.
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;

    fn wait_idle(&self) -> VkResult<()>;
}
