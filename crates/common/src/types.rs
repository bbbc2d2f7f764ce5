use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an entity in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rejected property assignment. The previous value is always retained.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("z_near must be >= {min}, got {value}")]
    NearTooSmall { value: f32, min: f32 },
    #[error("z_near must be < z_far ({z_far}), got {value}")]
    NearNotBeforeFar { value: f32, z_far: f32 },
    #[error("z_far must be > {min}, got {value}")]
    FarTooSmall { value: f32, min: f32 },
    #[error("z_far must be > z_near ({z_near}), got {value}")]
    FarNotBeyondNear { value: f32, z_near: f32 },
    #[error("viewport size must be non-zero, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
}
