// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

/// Unrecoverable presentation failure. Stale or suboptimal swapchains are not
/// errors; they surface as a [`FrameStatus`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentError {
    #[error("{stage} failed: {result:?}")]
    Vk {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,
}

impl PresentError {
    pub fn vk(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vk { stage, result }
    }

    /// Name of the failing stage, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Vk { stage, .. } => stage,
            Self::NoSurfaceFormats => "select_surface_format",
        }
    }
}

pub type PresentResult<T> = Result<T, PresentError>;

/// What one call to [`Presenter::draw_frame`](crate::Presenter::draw_frame) did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame submitted and presented.
    Presented,
    /// Frame submitted and presented, then the swapchain was rebuilt (or the
    /// rebuild deferred) because present reported it stale/suboptimal or a
    /// resize was pending.
    Recreated,
    /// Acquire reported the swapchain out of date. Nothing was drawn; the
    /// swapchain was rebuilt (or the rebuild deferred).
    Skipped,
    /// The surface has a degenerate extent. No swapchain work was done.
    Deferred,
}
