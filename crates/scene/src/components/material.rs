use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Surface parameters read by the forward program.
///
/// The rendered albedo is `base_color.rgb` times the vertex color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub base_color: Vec4,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            roughness: 0.5,
            metalness: 0.0,
        }
    }
}

impl Material {
    /// Rough dielectric: no specular lobe worth speaking of.
    pub fn lambertian() -> Self {
        Self {
            roughness: 1.0,
            metalness: 0.0,
            ..Self::default()
        }
    }

    pub fn with_base_color(mut self, base_color: Vec4) -> Self {
        self.base_color = base_color;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }
}
