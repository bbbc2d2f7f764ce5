//! Scene components and the scene lifecycle.
//!
//! Components are plain data plus the derivations the renderer needs:
//! transforms produce object/world matrices, cameras their projection,
//! lights their radiance and light-space projection. A [`Scene`] owns an
//! [`Ecs`](prism_ecs::Ecs) and drives it frame by frame.
//!
//! # Invariants
//! - `Transform` matrices always equal `T * R * S` of the stored parameters,
//!   and `world_to_object` is their inverse.
//! - `0.01 <= z_near < z_far` holds for every `Camera`; rejected setter
//!   values leave the camera unchanged.
//! - `cos_penumbra < cos_umbra` holds for every `SpotLight`.
//! - A `Model`'s vertex buffer is released exactly once.

pub mod components;
mod scene;
#[cfg(test)]
mod test_device;

pub use components::{
    AmbientLight, Camera, DirectionalLight, Light, LightKind, Material, Model, PointLight,
    Projection, SpotLight, Transform,
};
pub use scene::{
    Scene, Spin, SpinSystem, TestScene, destroy_entity, fit_cameras, release_models, set_model,
};

pub fn crate_info() -> &'static str {
    "prism-scene v0.1.0"
}
