//! Graphics device boundary.
//!
//! The renderer never talks to a graphics API directly. It drives a
//! [`GraphicsDevice`]: programs, vertex and uniform buffers, uniform block
//! binding points and non-indexed draws. Backends (the headless software
//! device, wgpu) implement the trait.
//!
//! # Invariants
//! - Handles are opaque and never zero.
//! - Failed resource creation is reported as [`DeviceError`]; operations on
//!   handles a device does not know are no-ops.

mod device;
pub mod vertex;

pub use device::{
    BufferHandle, BufferKind, DeviceError, GraphicsDevice, HandleAllocator, PrimitiveTopology,
    ProgramDesc, ProgramHandle, ShaderStage,
};
pub use vertex::{
    Vertex, VertexAttribute, VertexFormat, VertexLayout, VertexPosition, VertexPositionColor,
    VertexPositionNormalColor, calculate_normals, vertex_bytes,
};

pub fn crate_info() -> &'static str {
    "prism-gpu v0.1.0"
}
