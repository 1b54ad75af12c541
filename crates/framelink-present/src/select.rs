// SPDX-License-Identifier: CEPL-1.0
//! Swapchain parameter selection.
//!
//! Fixed preference orders, no scoring: the first acceptable candidate wins.

use ash::vk;

use crate::caps::SurfaceCapabilities;
use crate::error::{PresentError, PresentResult};
use crate::RenderSize;

/// Preferred surface format: 8-bit BGRA, sRGB non-linear color space.
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VsyncMode {
    /// Always FIFO.
    Fifo,
    /// MAILBOX when available, FIFO otherwise.
    #[default]
    Mailbox,
}

/// Concrete parameters chosen for one swapchain build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainConfig {
    pub fn derive(
        caps: &SurfaceCapabilities,
        window: RenderSize,
        vsync: VsyncMode,
    ) -> PresentResult<Self> {
        let surface_format = choose_surface_format(&caps.formats)?;
        Ok(Self {
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode: choose_present_mode(&caps.present_modes, vsync),
            extent: choose_extent(&caps.limits, window),
            image_count: choose_image_count(&caps.limits),
        })
    }
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> PresentResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
        .ok_or(PresentError::NoSurfaceFormats)
}

/// FIFO is the only mode every implementation must support, so it is the
/// fallback even when the surface did not list it.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: VsyncMode) -> vk::PresentModeKHR {
    match vsync {
        VsyncMode::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// A defined `current_extent` is authoritative. Otherwise the window's
/// framebuffer size is clamped into the surface bounds.
pub fn choose_extent(limits: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if limits.current_extent.width != crate::caps::UNDEFINED_EXTENT {
        return limits.current_extent;
    }
    vk::Extent2D {
        width: clamp(
            want.width,
            limits.min_image_extent.width,
            limits.max_image_extent.width,
        ),
        height: clamp(
            want.height,
            limits.min_image_extent.height,
            limits.max_image_extent.height,
        ),
    }
}

// `Ord::clamp` panics on min > max; a misbehaving surface must not abort us.
fn clamp(v: u32, min: u32, max: u32) -> u32 {
    v.max(min).min(max)
}

/// One image above the minimum, capped by the maximum (0 means no maximum).
pub fn choose_image_count(limits: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = limits.min_image_count.saturating_add(1);
    if limits.max_image_count > 0 {
        want.min(limits.max_image_count)
    } else {
        want
    }
}

pub fn is_degenerate(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

// Info only
pub(crate) fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        _ => "OTHER",
    }
}

pub(crate) fn cs_name(cs: vk::ColorSpaceKHR) -> &'static str {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => "SRGB_NONLINEAR",
        _ => "OTHER",
    }
}

pub(crate) fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        _ => "OTHER",
    }
}
