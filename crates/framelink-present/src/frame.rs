// SPDX-License-Identifier: CEPL-1.0
//! Per-frame command buffers and synchronization objects.

use ash::vk;
use tracing::debug;

use crate::device::PresentDevice;
use crate::error::{PresentError, PresentResult};

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Resources owned by one in-flight frame index. Created once and reused every
/// cycle; a swapchain rebuild does not touch them.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    /// Signaled by acquire, waited on by submit.
    pub image_acquired: vk::Semaphore,
    /// Signaled by submit, waited on by present.
    pub render_finished: vk::Semaphore,
    /// Signaled when this slot's submission completes. Created signaled.
    pub in_flight: vk::Fence,
    pub cmd: vk::CommandBuffer,
}

#[derive(Debug, Default)]
pub struct FrameResourceSet {
    slots: Vec<FrameSlot>,
}

impl FrameResourceSet {
    /// Allocates `count` command buffers and slots. Fences start signaled so
    /// the first wait on each slot returns immediately.
    pub fn new<D: PresentDevice + ?Sized>(device: &D, count: usize) -> PresentResult<Self> {
        let cmds = device
            .allocate_command_buffers(count as u32)
            .map_err(PresentError::vk("allocate_command_buffers"))?;

        let mut set = Self {
            slots: Vec::with_capacity(count),
        };
        for &cmd in &cmds {
            match create_slot(device, cmd) {
                Ok(slot) => set.slots.push(slot),
                Err(e) => {
                    // free every buffer, including those not yet in a slot
                    set.destroy_sync(device);
                    device.free_command_buffers(&cmds);
                    return Err(e);
                }
            }
        }

        debug!(frames = count, "frame resources ready");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Caller must have drained the device first.
    pub fn destroy<D: PresentDevice + ?Sized>(mut self, device: &D) {
        let cmds: Vec<_> = self.slots.iter().map(|s| s.cmd).collect();
        self.destroy_sync(device);
        if !cmds.is_empty() {
            device.free_command_buffers(&cmds);
        }
    }

    fn destroy_sync<D: PresentDevice + ?Sized>(&mut self, device: &D) {
        for s in self.slots.drain(..) {
            device.destroy_fence(s.in_flight);
            device.destroy_semaphore(s.render_finished);
            device.destroy_semaphore(s.image_acquired);
        }
    }
}

fn create_slot<D: PresentDevice + ?Sized>(
    device: &D,
    cmd: vk::CommandBuffer,
) -> PresentResult<FrameSlot> {
    let image_acquired = device
        .create_semaphore()
        .map_err(PresentError::vk("create_semaphore"))?;
    let render_finished = match device.create_semaphore() {
        Ok(s) => s,
        Err(e) => {
            device.destroy_semaphore(image_acquired);
            return Err(PresentError::vk("create_semaphore")(e));
        }
    };
    let in_flight = match device.create_fence(true) {
        Ok(f) => f,
        Err(e) => {
            device.destroy_semaphore(render_finished);
            device.destroy_semaphore(image_acquired);
            return Err(PresentError::vk("create_fence")(e));
        }
    };
    Ok(FrameSlot {
        image_acquired,
        render_finished,
        in_flight,
        cmd,
    })
}

/// Index of the frame slot in use, advancing modulo the slot count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCounter {
    index: usize,
    len: usize,
}

impl FrameCounter {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "frame counter needs at least one slot");
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.len;
    }
}
