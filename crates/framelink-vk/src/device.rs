// SPDX-License-Identifier: CEPL-1.0
//! `PresentDevice` over `ash`.

use std::cell::Cell;

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry, Instance};
use framelink_present::select::choose_surface_format;
use framelink_present::{
    ImageSharing, PresentDevice, QueueFamilies, SurfaceCapabilities, SwapchainDesc,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};

use crate::context::{self, DebugMessenger};
use crate::pipeline::{self, TriangleShaders};

/// Instance-level objects created before the logical device. Dropping this
/// releases them in reverse creation order, so a setup step that fails after
/// the instance exists leaks nothing.
struct InstanceObjects {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for InstanceObjects {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some(dbg) = self.debug.take() {
                dbg.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Every device-level object the presentation subsystem draws with, plus the
/// instance and surface they hang off.
///
/// Swapchain resources and frame slots are owned by the presenter and must be
/// destroyed before this is dropped.
pub struct AshDevice {
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: swapchain::Device,

    render_pass: vk::RenderPass,
    shaders: TriangleShaders,
    pipeline_layout: vk::PipelineLayout,
    pipeline: Cell<vk::Pipeline>,
    pipeline_extent: Cell<vk::Extent2D>,

    cmd_pool: vk::CommandPool,
    clear: Cell<[f32; 4]>,

    // released by its own Drop, after `Drop for AshDevice` destroyed the device
    base: InstanceObjects,
}

impl AshDevice {
    /// Runs the one-shot setup against the given window: instance, surface,
    /// device selection, logical device, render pass and command pool. The
    /// pipeline is built later, once the first swapchain extent is known.
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        // STRICT ORDER:
        // 1) instance
        // 2) surface from that instance
        // 3) physical device + queue families checked against that surface
        // 4) logical device, then everything created from it
        let dh = display
            .display_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::linked();
        let (instance, validation) = unsafe { context::create_instance(&entry, dh, validation) }?;
        let surface_loader = surface::Instance::new(&entry, &instance);
        let mut base = InstanceObjects {
            entry,
            instance,
            debug: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        if validation {
            match unsafe { DebugMessenger::new(&base.entry, &base.instance) } {
                Ok(m) => base.debug = Some(m),
                Err(e) => warn!("debug messenger unavailable: {e:#}"),
            }
        }

        base.surface =
            unsafe { ash_window::create_surface(&base.entry, &base.instance, dh, wh, None) }
                .context("ash_window::create_surface")?;

        let (phys, families) = unsafe {
            context::pick_physical_device(&base.instance, &base.surface_loader, base.surface)
        }?;
        let (device, graphics_queue, present_queue) =
            unsafe { context::create_logical_device(&base.instance, phys, families) }?;

        let (render_pass, shaders, pipeline_layout, cmd_pool) =
            match unsafe { create_device_objects(&base, phys, &device, families.graphics) } {
                Ok(objects) => objects,
                Err(e) => {
                    unsafe { device.destroy_device(None) };
                    return Err(e);
                }
            };
        let swapchain_loader = swapchain::Device::new(&base.instance, &device);

        debug!("vulkan device ready");
        Ok(Self {
            phys,
            families,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
            render_pass,
            shaders,
            pipeline_layout,
            pipeline: Cell::new(vk::Pipeline::null()),
            pipeline_extent: Cell::new(vk::Extent2D::default()),
            cmd_pool,
            clear: Cell::new(clear_color),
            base,
        })
    }

    pub fn set_clear_color(&self, rgba: [f32; 4]) {
        self.clear.set(rgba);
    }
}

/// Render pass, shaders, pipeline layout and command pool. On failure every
/// object created here is destroyed again; the device itself is the caller's.
unsafe fn create_device_objects(
    base: &InstanceObjects,
    phys: vk::PhysicalDevice,
    device: &ash::Device,
    graphics_family: u32,
) -> Result<(vk::RenderPass, TriangleShaders, vk::PipelineLayout, vk::CommandPool)> {
    // The render pass is fixed for the process lifetime, so its color
    // format is chosen once with the same rule the swapchain uses.
    let formats = unsafe {
        base.surface_loader
            .get_physical_device_surface_formats(phys, base.surface)
    }
    .context("get_physical_device_surface_formats")?;
    let color_format = choose_surface_format(&formats)
        .context("select_surface_format")?
        .format;

    let render_pass = unsafe { pipeline::create_render_pass(device, color_format) }?;
    let shaders = match unsafe { TriangleShaders::load(device) } {
        Ok(s) => s,
        Err(e) => {
            unsafe { device.destroy_render_pass(render_pass, None) };
            return Err(e);
        }
    };
    let pipeline_layout = match unsafe { pipeline::create_pipeline_layout(device) } {
        Ok(l) => l,
        Err(e) => {
            unsafe {
                shaders.destroy(device);
                device.destroy_render_pass(render_pass, None);
            }
            return Err(e);
        }
    };

    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: graphics_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    match unsafe { device.create_command_pool(&pool_info, None) } {
        Ok(cmd_pool) => Ok((render_pass, shaders, pipeline_layout, cmd_pool)),
        Err(e) => {
            unsafe {
                device.destroy_pipeline_layout(pipeline_layout, None);
                shaders.destroy(device);
                device.destroy_render_pass(render_pass, None);
            }
            Err(e).context("create_command_pool")
        }
    }
}

impl PresentDevice for AshDevice {
    fn surface_capabilities(&self) -> SurfaceCapabilities {
        let (sl, surf) = (&self.base.surface_loader, self.base.surface);
        let limits =
            match unsafe { sl.get_physical_device_surface_capabilities(self.phys, surf) } {
                Ok(caps) => caps,
                Err(e) => {
                    // all-zero extent bounds make the caller defer the rebuild
                    warn!("get_physical_device_surface_capabilities: {e:?}");
                    vk::SurfaceCapabilitiesKHR::default()
                }
            };
        let formats = unsafe { sl.get_physical_device_surface_formats(self.phys, surf) }
            .unwrap_or_default();
        let present_modes =
            unsafe { sl.get_physical_device_surface_present_modes(self.phys, surf) }
                .unwrap_or_default();
        SurfaceCapabilities {
            limits,
            formats,
            present_modes,
        }
    }

    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let cfg = &desc.config;
        let (sharing_mode, indices): (vk::SharingMode, &[u32]) = match &desc.sharing {
            ImageSharing::Exclusive => (vk::SharingMode::EXCLUSIVE, &[]),
            ImageSharing::Concurrent(families) => (vk::SharingMode::CONCURRENT, &families[..]),
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.base.surface,
            min_image_count: cfg.image_count,
            image_format: cfg.format,
            image_color_space: cfg.color_space,
            image_extent: cfg.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: indices.len() as u32,
            p_queue_family_indices: indices.as_ptr(),
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: cfg.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        unsafe { self.swapchain_loader.create_swapchain(&swap_info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: sub,
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&iv_info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_framebuffer(
        &self,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: self.render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&fb_info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    // Runs between the device-idle drain and framebuffer creation, so the
    // old pipeline is no longer referenced by any command buffer.
    fn swapchain_extent_changed(&self, extent: vk::Extent2D) -> VkResult<()> {
        let old = self.pipeline.get();
        if old != vk::Pipeline::null() && self.pipeline_extent.get() == extent {
            return Ok(());
        }
        let new = unsafe {
            pipeline::create_pipeline(
                &self.device,
                &self.shaders,
                self.pipeline_layout,
                self.render_pass,
                extent,
            )
        }?;
        if old != vk::Pipeline::null() {
            unsafe { self.device.destroy_pipeline(old, None) };
        }
        self.pipeline.set(new);
        self.pipeline_extent.set(extent);
        debug!(width = extent.width, height = extent.height, "pipeline rebuilt");
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device.create_semaphore(&ci, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        unsafe { self.device.create_fence(&ci, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&alloc_info) }
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(self.cmd_pool, buffers) };
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())
        }
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn record_draw(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> VkResult<()> {
        let d = &self.device;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear.get(),
            },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };

        unsafe {
            d.begin_command_buffer(cmd, &begin)?;
            d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.get());
            d.cmd_draw(cmd, 3, 1, 0, 0);
            d.cmd_end_render_pass(cmd);
            d.end_command_buffer(cmd)
        }
    }

    fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(&submit), fence)
        }
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present)
        }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

// STRICT TEARDOWN ORDER:
// - device_wait_idle()
// - pipeline, layout, shader modules, render pass
// - command pool (its buffers were freed by the presenter)
// - device
// - then `base` drops: surface, debug messenger, instance last
impl Drop for AshDevice {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();

            let pipeline = self.pipeline.get();
            if pipeline != vk::Pipeline::null() {
                d.destroy_pipeline(pipeline, None);
            }
            d.destroy_pipeline_layout(self.pipeline_layout, None);
            self.shaders.destroy(d);
            d.destroy_render_pass(self.render_pass, None);
            d.destroy_command_pool(self.cmd_pool, None);

            d.destroy_device(None);
        }
        debug!("vulkan device destroyed");
    }
}
