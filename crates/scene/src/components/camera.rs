use glam::Mat4;
use prism_common::{ConfigError, Viewport};
use prism_ecs::Component;
use serde::{Deserialize, Serialize};

pub const MIN_Z_NEAR: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Vertical field of view in radians; aspect comes from the viewport.
    Perspective { fov_y: f32 },
    /// Symmetric box centred on the view axis.
    Orthographic { width: f32, height: f32 },
}

/// A view into the scene. Paired with a [`Transform`](super::Transform)
/// that places it; the camera looks down its local -Z axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub viewport: Viewport,
    pub projection: Projection,
    z_near: f32,
    z_far: f32,
}

impl Component for Camera {}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(std::f32::consts::FRAC_PI_4)
    }
}

impl Camera {
    pub fn perspective(fov_y: f32) -> Self {
        Self {
            viewport: Viewport::default(),
            projection: Projection::Perspective { fov_y },
            z_near: 0.1,
            z_far: 100.0,
        }
    }

    pub fn orthographic(width: f32, height: f32) -> Self {
        Self {
            viewport: Viewport::default(),
            projection: Projection::Orthographic { width, height },
            z_near: 0.1,
            z_far: 100.0,
        }
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    /// Set the near plane. Rejected (and logged) unless
    /// `MIN_Z_NEAR <= value < z_far`.
    pub fn set_z_near(&mut self, value: f32) -> Result<(), ConfigError> {
        let check = if value.is_nan() || value < MIN_Z_NEAR {
            Err(ConfigError::NearTooSmall {
                value,
                min: MIN_Z_NEAR,
            })
        } else if value >= self.z_far {
            Err(ConfigError::NearNotBeforeFar {
                value,
                z_far: self.z_far,
            })
        } else {
            Ok(())
        };
        match check {
            Ok(()) => {
                self.z_near = value;
                Ok(())
            }
            Err(err) => {
                tracing::error!("camera z_near rejected: {err}");
                Err(err)
            }
        }
    }

    /// Set the far plane. Rejected (and logged) unless
    /// `value > MIN_Z_NEAR` and `value > z_near`.
    pub fn set_z_far(&mut self, value: f32) -> Result<(), ConfigError> {
        let check = if value.is_nan() || value <= MIN_Z_NEAR {
            Err(ConfigError::FarTooSmall {
                value,
                min: MIN_Z_NEAR,
            })
        } else if value <= self.z_near {
            Err(ConfigError::FarNotBeyondNear {
                value,
                z_near: self.z_near,
            })
        } else {
            Ok(())
        };
        match check {
            Ok(()) => {
                self.z_far = value;
                Ok(())
            }
            Err(err) => {
                tracing::error!("camera z_far rejected: {err}");
                Err(err)
            }
        }
    }

    /// Right-handed view-to-clip matrix with depth mapped to `[0, 1]`.
    pub fn camera_to_projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::perspective_rh(
                fov_y,
                self.viewport.aspect_ratio(),
                self.z_near,
                self.z_far,
            ),
            Projection::Orthographic { width, height } => Mat4::orthographic_rh(
                -width / 2.0,
                width / 2.0,
                -height / 2.0,
                height / 2.0,
                self.z_near,
                self.z_far,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn near_at_or_beyond_far_is_rejected() {
        let mut cam = Camera::default();
        assert!(cam.set_z_near(100.0).is_err());
        assert!(cam.set_z_near(250.0).is_err());
        assert_eq!(cam.z_near(), 0.1);
        assert!(cam.set_z_near(0.005).is_err());
        assert_eq!(cam.z_near(), 0.1);
        cam.set_z_near(1.0).unwrap();
        assert_eq!(cam.z_near(), 1.0);
    }

    #[test]
    fn far_at_or_before_near_is_rejected() {
        let mut cam = Camera::default();
        cam.set_z_near(2.0).unwrap();
        assert!(matches!(
            cam.set_z_far(2.0),
            Err(ConfigError::FarNotBeyondNear { .. })
        ));
        assert!(cam.set_z_far(1.0).is_err());
        assert_eq!(cam.z_far(), 100.0);
        // Shrinking the far plane while it stays beyond near is allowed.
        cam.set_z_far(50.0).unwrap();
        assert_eq!(cam.z_far(), 50.0);
    }

    #[test]
    fn nan_planes_are_rejected() {
        let mut cam = Camera::default();
        assert!(cam.set_z_near(f32::NAN).is_err());
        assert!(cam.set_z_far(f32::NAN).is_err());
        assert_eq!((cam.z_near(), cam.z_far()), (0.1, 100.0));
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let cam = Camera::default();
        let proj = cam.camera_to_projection_matrix();
        let near = proj * Vec4::new(0.0, 0.0, -cam.z_near(), 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -cam.z_far(), 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn orthographic_box_is_centred() {
        let cam = Camera::orthographic(4.0, 2.0);
        let proj = cam.camera_to_projection_matrix();
        let corner = proj.project_point3(Vec3::new(2.0, 1.0, -1.0));
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
        let centre = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!(centre.x.abs() < 1e-6 && centre.y.abs() < 1e-6);
    }
}
