//! Render passes. Each pass reads the store, fills its uniform blocks and
//! issues draws; none of them mutate the store.

mod forward;
mod light;

pub use forward::{ForwardPass, ForwardStats};
pub use light::{LightPass, LightStats};
