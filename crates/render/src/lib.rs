//! Forward renderer.
//!
//! A [`Renderer`] draws a [`Scene`](prism_scene::Scene) once per camera
//! through a [`GraphicsDevice`](prism_gpu::GraphicsDevice). Each camera
//! render runs the [`LightPass`], which packs every light into the `Lights`
//! block, then the [`ForwardPass`], which uploads the `Camera` block and
//! draws every model with its own `Model` block.
//!
//! Block layouts follow std140 and are shared by the WGSL program in
//! [`shaders`] and the CPU evaluation in [`shading`]. [`SoftwareDevice`]
//! rasterizes with the latter, so frames can be inspected without a GPU.
//!
//! # Invariants
//! - `Camera` is bound at slot 0, `Model` at 1 and `Lights` at 2.
//! - At most 8 lights of each kind are uploaded per frame; extras are
//!   dropped in store order.
//! - Every draw observes the `Model` block uploaded immediately before it.
//! - Rendering never mutates the store.

pub mod buffers;
mod pass;
mod program;
mod renderer;
mod settings;
pub mod shaders;
pub mod shading;
pub mod software;
mod uniform;

pub use buffers::{
    CameraBuffer, DirectionalLightEntry, LightBuffer, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
    MAX_SPOT_LIGHTS, MaterialBlock, ModelBuffer, PointLightEntry, SpotLightEntry, UniformBlock,
};
pub use pass::{ForwardPass, ForwardStats, LightPass, LightStats};
pub use program::Program;
pub use renderer::{FrameReport, Renderer};
pub use settings::{RenderSettings, SettingsError};
pub use software::{DeviceCommand, SoftwareDevice};
pub use uniform::UniformRegistry;

pub fn crate_info() -> &'static str {
    "prism-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }

    #[test]
    fn block_sizes_match_the_wgsl_layouts() {
        assert_eq!(UniformBlock::Camera.size(), 256);
        assert_eq!(UniformBlock::Model.size(), 224);
        assert_eq!(UniformBlock::Lights.size(), 1696);
        assert_eq!(std::mem::size_of::<CameraBuffer>(), 256);
        assert_eq!(std::mem::size_of::<ModelBuffer>(), 224);
    }
}
