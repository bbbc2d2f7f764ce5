use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Rectangle of the render target a camera draws into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub top_left: [u32; 2],
    size: [u32; 2],
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_left: [0, 0],
            size: [640, 480],
        }
    }
}

impl Viewport {
    /// Create a viewport. Zero sizes fall back to 1 pixel.
    pub fn new(top_left: [u32; 2], size: [u32; 2]) -> Self {
        Self {
            top_left,
            size: [size[0].max(1), size[1].max(1)],
        }
    }

    pub fn width(&self) -> u32 {
        self.size[0]
    }

    pub fn height(&self) -> u32 {
        self.size[1]
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    /// Resize the viewport. Zero-sized viewports are rejected.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            let err = ConfigError::EmptyViewport { width, height };
            tracing::error!("viewport resize rejected: {err}");
            return Err(err);
        }
        self.size = [width, height];
        Ok(())
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.size[0] as f32 / self.size[1] as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_640_by_480() {
        let vp = Viewport::default();
        assert_eq!(vp.width(), 640);
        assert_eq!(vp.height(), 480);
        assert!((vp.aspect_ratio() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn zero_size_is_rejected_and_retained() {
        let mut vp = Viewport::default();
        assert!(vp.set_size(0, 100).is_err());
        assert_eq!(vp.size(), [640, 480]);
        assert!(vp.set_size(1280, 720).is_ok());
        assert_eq!(vp.size(), [1280, 720]);
    }

    #[test]
    fn constructor_clamps_zero_dimensions() {
        let vp = Viewport::new([0, 0], [0, 10]);
        assert_eq!(vp.size(), [1, 10]);
    }
}
