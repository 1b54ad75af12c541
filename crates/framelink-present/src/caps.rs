// SPDX-License-Identifier: CEPL-1.0
//! Surface capability probe.

use ash::vk;
use tracing::trace;

use crate::device::PresentDevice;

/// `current_extent` value meaning "the swapchain decides the extent".
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Snapshot of what the surface supports. Taken fresh for every swapchain
/// build; never cached across builds.
#[derive(Clone, Debug, Default)]
pub struct SurfaceCapabilities {
    pub limits: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilities {
    pub fn min_image_count(&self) -> u32 {
        self.limits.min_image_count
    }

    /// Zero means unbounded.
    pub fn max_image_count(&self) -> u32 {
        self.limits.max_image_count
    }

    /// True when the surface leaves the extent up to the swapchain.
    pub fn extent_is_undefined(&self) -> bool {
        self.limits.current_extent.width == UNDEFINED_EXTENT
    }
}

pub fn probe<D: PresentDevice + ?Sized>(device: &D) -> SurfaceCapabilities {
    let caps = device.surface_capabilities();
    trace!(
        formats = caps.formats.len(),
        present_modes = caps.present_modes.len(),
        min_images = caps.limits.min_image_count,
        max_images = caps.limits.max_image_count,
        "probed surface"
    );
    caps
}
