// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use winit::window::Window;

/// Live framebuffer size of `window` in physical pixels. Either side is zero
/// while the window is minimized on most platforms.
pub fn framebuffer_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}
