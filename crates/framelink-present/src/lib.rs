// SPDX-License-Identifier: CEPL-1.0
//! Presentation and frame synchronization.
//!
//! Everything here is backend-agnostic: the GPU is reached only through
//! [`PresentDevice`]. The Vulkan implementation lives in `framelink-vk`.
#![deny(unsafe_op_in_unsafe_fn)]

mod error;

pub mod caps;
pub mod device;
pub mod frame;
pub mod present;
pub mod recreate;
pub mod select;
pub mod swapchain;

pub use caps::SurfaceCapabilities;
pub use device::{ImageSharing, PresentDevice, QueueFamilies, SwapchainDesc};
pub use error::{FrameStatus, PresentError, PresentResult};
pub use frame::{FrameCounter, FrameResourceSet, FrameSlot, MAX_FRAMES_IN_FLIGHT};
pub use present::Presenter;
pub use recreate::Rebuild;
pub use select::{SwapchainConfig, VsyncMode};
pub use swapchain::SwapchainState;

pub use ash::vk;

/// Framebuffer size of the host window in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (minimized window).
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
