// SPDX-License-Identifier: CEPL-1.0
//! In-memory `PresentDevice` that simulates the GPU just enough to check
//! ordering and ownership rules.
//!
//! Submitted work stays pending until its fence is waited on or the device is
//! drained, so the number of pending fences is the number of frames in flight.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use framelink_present::select::PREFERRED_FORMAT;
use framelink_present::{PresentDevice, QueueFamilies, SurfaceCapabilities, SwapchainDesc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    WaitIdle,
    CreateSwapchain(u64),
    DestroySwapchain(u64),
    CreateImageView(u64),
    DestroyImageView(u64),
    CreateFramebuffer(u64),
    DestroyFramebuffer(u64),
    WaitFence(u64),
    ResetFence(u64),
    Acquire,
    Record,
    Submit(u64),
    Present(u32),
}

pub struct MockState {
    next_handle: u64,
    pub caps: SurfaceCapabilities,
    pub families: QueueFamilies,
    pub swapchains: HashMap<u64, u32>,
    pub views: HashSet<u64>,
    pub framebuffers: HashSet<u64>,
    pub semaphores: HashSet<u64>,
    /// Semaphores signaled and not yet waited on.
    pub signaled: HashSet<u64>,
    last_acquire_signal: Option<u64>,
    last_submit_signal: Option<u64>,
    /// Acquire → submit → present chains whose semaphores lined up.
    pub chained_presents: usize,
    pub fences: HashMap<u64, FenceState>,
    pub cmds: HashSet<u64>,
    pub acquire_script: VecDeque<VkResult<(u32, bool)>>,
    pub present_script: VecDeque<VkResult<bool>>,
    pub fail_create_swapchain: Option<vk::Result>,
    pub fail_record: Option<vk::Result>,
    next_image: u32,
    pub descs: Vec<SwapchainDesc>,
    pub calls: Vec<Call>,
    pub max_pending: usize,
    pub violations: Vec<String>,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn pending(&self) -> usize {
        self.fences
            .values()
            .filter(|s| **s == FenceState::Pending)
            .count()
    }

    fn complete_all(&mut self) {
        for s in self.fences.values_mut() {
            if *s == FenceState::Pending {
                *s = FenceState::Signaled;
            }
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    /// Sets a fixed `current_extent`, as a window system that dictates the size.
    pub fn set_current_extent(&mut self, width: u32, height: u32) {
        self.caps.limits.current_extent = vk::Extent2D { width, height };
    }
}

#[derive(Clone)]
pub struct MockDevice {
    pub state: Rc<RefCell<MockState>>,
}

pub fn default_caps() -> SurfaceCapabilities {
    SurfaceCapabilities {
        limits: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        },
        formats: vec![PREFERRED_FORMAT],
        present_modes: vec![vk::PresentModeKHR::FIFO],
    }
}

impl MockDevice {
    pub fn new(caps: SurfaceCapabilities) -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                next_handle: 0,
                caps,
                families: QueueFamilies {
                    graphics: 0,
                    present: 0,
                },
                swapchains: HashMap::new(),
                views: HashSet::new(),
                framebuffers: HashSet::new(),
                semaphores: HashSet::new(),
                signaled: HashSet::new(),
                last_acquire_signal: None,
                last_submit_signal: None,
                chained_presents: 0,
                fences: HashMap::new(),
                cmds: HashSet::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                fail_create_swapchain: None,
                fail_record: None,
                next_image: 0,
                descs: Vec::new(),
                calls: Vec::new(),
                max_pending: 0,
                violations: Vec::new(),
            })),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_caps())
    }
}

impl PresentDevice for MockDevice {
    fn surface_capabilities(&self) -> SurfaceCapabilities {
        self.state.borrow().caps.clone()
    }

    fn queue_families(&self) -> QueueFamilies {
        self.state.borrow().families
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state.borrow_mut();
        if let Some(err) = s.fail_create_swapchain {
            return Err(err);
        }
        if desc.config.extent.width == 0 || desc.config.extent.height == 0 {
            s.violations.push("swapchain created with zero extent".into());
        }
        if !s.swapchains.is_empty() {
            s.violations
                .push("new swapchain while another is still live".into());
        }
        let h = s.handle();
        s.swapchains.insert(h, desc.config.image_count);
        s.descs.push(*desc);
        s.calls.push(Call::CreateSwapchain(h));
        Ok(vk::SwapchainKHR::from_raw(h))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let mut s = self.state.borrow_mut();
        let count = *s
            .swapchains
            .get(&swapchain.as_raw())
            .ok_or(vk::Result::ERROR_UNKNOWN)?;
        Ok((0..count).map(|_| vk::Image::from_raw(s.handle())).collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state.borrow_mut();
        let h = swapchain.as_raw();
        if s.swapchains.remove(&h).is_none() {
            s.violations.push(format!("destroy of unknown swapchain {h}"));
        }
        if !s.views.is_empty() || !s.framebuffers.is_empty() {
            s.violations
                .push("swapchain destroyed before its views/framebuffers".into());
        }
        if s.pending() > 0 {
            s.violations
                .push("swapchain destroyed with work in flight".into());
        }
        s.calls.push(Call::DestroySwapchain(h));
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        let mut s = self.state.borrow_mut();
        let h = s.handle();
        s.views.insert(h);
        s.calls.push(Call::CreateImageView(h));
        Ok(vk::ImageView::from_raw(h))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut s = self.state.borrow_mut();
        let h = view.as_raw();
        if !s.views.remove(&h) {
            s.violations.push(format!("destroy of unknown view {h}"));
        }
        if !s.framebuffers.is_empty() {
            s.violations
                .push("image view destroyed before framebuffers".into());
        }
        s.calls.push(Call::DestroyImageView(h));
    }

    fn create_framebuffer(
        &self,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let mut s = self.state.borrow_mut();
        if !s.views.contains(&view.as_raw()) {
            s.violations.push("framebuffer over unknown view".into());
        }
        let h = s.handle();
        s.framebuffers.insert(h);
        s.calls.push(Call::CreateFramebuffer(h));
        Ok(vk::Framebuffer::from_raw(h))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut s = self.state.borrow_mut();
        let h = framebuffer.as_raw();
        if !s.framebuffers.remove(&h) {
            s.violations.push(format!("destroy of unknown framebuffer {h}"));
        }
        s.calls.push(Call::DestroyFramebuffer(h));
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut s = self.state.borrow_mut();
        let h = s.handle();
        s.semaphores.insert(h);
        Ok(vk::Semaphore::from_raw(h))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut s = self.state.borrow_mut();
        let h = semaphore.as_raw();
        if !s.semaphores.remove(&h) {
            s.violations.push("destroy of unknown semaphore".into());
        }
        s.signaled.remove(&h);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state.borrow_mut();
        let h = s.handle();
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        s.fences.insert(h, state);
        Ok(vk::Fence::from_raw(h))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state.borrow_mut();
        match s.fences.remove(&fence.as_raw()) {
            None => s.violations.push("destroy of unknown fence".into()),
            Some(FenceState::Pending) => s.violations.push("fence destroyed while pending".into()),
            Some(_) => {}
        }
    }

    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut s = self.state.borrow_mut();
        Ok((0..count)
            .map(|_| {
                let h = s.handle();
                s.cmds.insert(h);
                vk::CommandBuffer::from_raw(h)
            })
            .collect())
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        let mut s = self.state.borrow_mut();
        for b in buffers {
            if !s.cmds.remove(&b.as_raw()) {
                s.violations.push("free of unknown command buffer".into());
            }
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let h = fence.as_raw();
        s.calls.push(Call::WaitFence(h));
        match s.fences.get(&h).copied() {
            Some(FenceState::Pending) | Some(FenceState::Signaled) => {
                s.fences.insert(h, FenceState::Signaled);
                Ok(())
            }
            Some(FenceState::Unsignaled) => {
                s.violations
                    .push(format!("wait on fence {h} that nothing will signal"));
                Err(vk::Result::ERROR_DEVICE_LOST)
            }
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let h = fence.as_raw();
        s.calls.push(Call::ResetFence(h));
        match s.fences.get(&h).copied() {
            Some(FenceState::Pending) => {
                s.violations.push(format!("fence {h} reset while in flight"));
            }
            None => return Err(vk::Result::ERROR_UNKNOWN),
            _ => {}
        }
        s.fences.insert(h, FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state.borrow_mut();
        s.calls.push(Call::Acquire);
        let count = *s
            .swapchains
            .get(&swapchain.as_raw())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)?;
        let result = match s.acquire_script.pop_front() {
            Some(scripted) => scripted,
            None => {
                let index = s.next_image % count;
                s.next_image = s.next_image.wrapping_add(1);
                Ok((index, false))
            }
        };
        // only a successful acquire signals
        if result.is_ok() {
            let h = signal.as_raw();
            s.signaled.insert(h);
            s.last_acquire_signal = Some(h);
        }
        result
    }

    fn reset_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn record_draw(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        if let Some(err) = s.fail_record {
            return Err(err);
        }
        if !s.cmds.contains(&cmd.as_raw()) || !s.framebuffers.contains(&framebuffer.as_raw()) {
            s.violations.push("record with unknown handles".into());
        }
        s.calls.push(Call::Record);
        Ok(())
    }

    fn submit(
        &self,
        _cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let (wait, signal) = (wait.as_raw(), signal.as_raw());
        if s.last_acquire_signal != Some(wait) || !s.signaled.remove(&wait) {
            s.violations
                .push(format!("submit waits on {wait}, not the latest acquire"));
        }
        if wait == signal {
            s.violations
                .push(format!("submit waits on and signals {wait}"));
        }
        s.signaled.insert(signal);
        s.last_submit_signal = Some(signal);

        let h = fence.as_raw();
        if s.fences.get(&h) != Some(&FenceState::Unsignaled) {
            s.violations
                .push(format!("submit with fence {h} not in unsignaled state"));
        }
        s.fences.insert(h, FenceState::Pending);
        s.calls.push(Call::Submit(h));
        let pending = s.pending();
        s.max_pending = s.max_pending.max(pending);
        Ok(())
    }

    fn present(
        &self,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut s = self.state.borrow_mut();
        let wait = wait.as_raw();
        if s.last_submit_signal == Some(wait) && s.signaled.remove(&wait) {
            s.chained_presents += 1;
        } else {
            s.violations
                .push(format!("present waits on {wait}, not the preceding submit"));
        }
        s.calls.push(Call::Present(image_index));
        s.present_script.pop_front().unwrap_or(Ok(false))
    }

    fn wait_idle(&self) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.complete_all();
        s.calls.push(Call::WaitIdle);
        Ok(())
    }
}
