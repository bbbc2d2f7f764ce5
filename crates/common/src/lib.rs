//! Shared types for the prism renderer.
//!
//! # Invariants
//! - Entity ids are globally unique (uuid v4) and never reused.
//! - A `Viewport` always has a non-zero size.

mod types;
mod viewport;

pub use types::{ConfigError, EntityId};
pub use viewport::Viewport;

pub fn crate_info() -> &'static str {
    "prism-common v0.1.0"
}
