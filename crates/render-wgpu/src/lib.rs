//! wgpu backend for the forward renderer.
//!
//! [`WgpuDevice`] implements [`GraphicsDevice`](prism_gpu::GraphicsDevice)
//! so the renderer in `prism-render` can draw to a window surface.
//!
//! # Invariants
//! - WGSL `@group(0) @binding(n)` is uniform slot `n`.
//! - Each draw sees the uniform contents current when it was issued.
//! - Shader and pipeline validation failures surface as `DeviceError`s or
//!   logged errors, never as panics from the uncaptured-error handler.

mod arena;
mod convert;
mod device;

pub use device::WgpuDevice;

pub fn crate_info() -> &'static str {
    "prism-render-wgpu v0.1.0"
}
