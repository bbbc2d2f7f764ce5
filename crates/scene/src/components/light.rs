//! Light sources.
//!
//! A single [`Light`] component covers every kind, so the light pass can
//! query it once and dispatch on the variant. Every kind but ambient is
//! placed by the entity's `Transform`. Emitted radiance is always
//! `base_color * intensity`.

use glam::{Mat4, Vec3, Vec4};
use prism_ecs::Component;
use serde::{Deserialize, Serialize};

/// Smallest gap kept between the spot umbra and penumbra cosines, and the
/// smallest cosine either may take.
pub const SPOT_COS_EPSILON: f32 = 0.001;

/// Parallel light shining along its transform's local +Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub base_color: Vec3,
    pub intensity: f32,
    /// Width and height of the light-space box.
    pub proj_size: [f32; 2],
    /// Near and far extent of the light-space box along +Z.
    pub start: f32,
    pub range: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            base_color: Vec3::ZERO,
            intensity: 0.0,
            proj_size: [1.0, 1.0],
            start: 0.1,
            range: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(base_color: Vec3, intensity: f32) -> Self {
        Self {
            base_color,
            intensity,
            ..Self::default()
        }
    }

    /// Left-handed orthographic box: light space looks along +Z and maps
    /// `[start, range]` to depth `[0, 1]`.
    pub fn light_to_projection_matrix(&self) -> Mat4 {
        let [w, h] = self.proj_size;
        Mat4::orthographic_lh(-w / 2.0, w / 2.0, -h / 2.0, h / 2.0, self.start, self.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub base_color: Vec3,
    pub intensity: f32,
    /// Constant, linear and quadratic falloff coefficients.
    pub attenuation: Vec3,
    pub start: f32,
    /// Points farther than this receive nothing.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            base_color: Vec3::ZERO,
            intensity: 0.0,
            attenuation: Vec3::new(0.0, 0.0, 1.0),
            start: 0.1,
            range: 1.0,
        }
    }
}

impl PointLight {
    pub fn new(base_color: Vec3, intensity: f32) -> Self {
        Self {
            base_color,
            intensity,
            ..Self::default()
        }
    }

    /// Depth-only projection along +Z; x and y pass through unchanged.
    pub fn light_to_projection_matrix(&self) -> Mat4 {
        let m22 = self.range / (self.range - self.start);
        let m32 = -self.start * m22;
        Mat4::from_cols(
            Vec4::X,
            Vec4::Y,
            Vec4::new(0.0, 0.0, m22, 1.0),
            Vec4::new(0.0, 0.0, m32, 0.0),
        )
    }
}

/// Cone light along local +Z.
///
/// Full intensity inside the umbra cone, smooth falloff to zero at the
/// penumbra cone. `cos_penumbra < cos_umbra` always holds, including for
/// deserialized lights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpotLightParams", into = "SpotLightParams")]
pub struct SpotLight {
    pub base_color: Vec3,
    pub intensity: f32,
    pub attenuation: Vec3,
    pub start: f32,
    pub range: f32,
    cos_umbra: f32,
    cos_penumbra: f32,
}

/// The serialized form. Cosines are clamped on the way in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SpotLightParams {
    base_color: Vec3,
    intensity: f32,
    attenuation: Vec3,
    start: f32,
    range: f32,
    cos_umbra: f32,
    cos_penumbra: f32,
}

impl From<SpotLightParams> for SpotLight {
    fn from(p: SpotLightParams) -> Self {
        let cos_umbra = p.cos_umbra.min(1.0).max(2.0 * SPOT_COS_EPSILON);
        Self {
            base_color: p.base_color,
            intensity: p.intensity,
            attenuation: p.attenuation,
            start: p.start,
            range: p.range,
            cos_umbra,
            cos_penumbra: p
                .cos_penumbra
                .min(cos_umbra - SPOT_COS_EPSILON)
                .max(SPOT_COS_EPSILON),
        }
    }
}

impl From<SpotLight> for SpotLightParams {
    fn from(l: SpotLight) -> Self {
        Self {
            base_color: l.base_color,
            intensity: l.intensity,
            attenuation: l.attenuation,
            start: l.start,
            range: l.range,
            cos_umbra: l.cos_umbra,
            cos_penumbra: l.cos_penumbra,
        }
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            base_color: Vec3::ZERO,
            intensity: 0.0,
            attenuation: Vec3::new(0.0, 0.0, 1.0),
            start: 0.1,
            range: 1.0,
            cos_umbra: 1.0,
            cos_penumbra: 0.1,
        }
    }
}

impl SpotLight {
    pub fn new(base_color: Vec3, intensity: f32) -> Self {
        Self {
            base_color,
            intensity,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_attenuation(mut self, attenuation: Vec3) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn cos_umbra(&self) -> f32 {
        self.cos_umbra
    }

    pub fn cos_penumbra(&self) -> f32 {
        self.cos_penumbra
    }

    /// Clamped to at least `cos_penumbra + SPOT_COS_EPSILON`.
    pub fn set_cos_umbra(&mut self, cos_angle: f32) {
        self.cos_umbra = cos_angle
            .max(self.cos_penumbra + SPOT_COS_EPSILON)
            .max(SPOT_COS_EPSILON);
    }

    /// Clamped to at most `cos_umbra - SPOT_COS_EPSILON`, and never below
    /// `SPOT_COS_EPSILON`.
    pub fn set_cos_penumbra(&mut self, cos_angle: f32) {
        self.cos_penumbra = cos_angle
            .min(self.cos_umbra - SPOT_COS_EPSILON)
            .max(SPOT_COS_EPSILON);
    }

    pub fn umbra_angle(&self) -> f32 {
        self.cos_umbra.acos()
    }

    pub fn set_umbra_angle(&mut self, radians: f32) {
        self.set_cos_umbra(radians.cos());
    }

    pub fn penumbra_angle(&self) -> f32 {
        self.cos_penumbra.acos()
    }

    pub fn set_penumbra_angle(&mut self, radians: f32) {
        self.set_cos_penumbra(radians.cos());
    }

    /// Left-handed perspective covering the penumbra cone.
    pub fn light_to_projection_matrix(&self) -> Mat4 {
        let fov = self.cos_penumbra.acos() * 2.0;
        Mat4::perspective_lh(fov, 1.0, self.start, self.range)
    }
}

/// Direction-less light added to every surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AmbientLight {
    pub base_color: Vec3,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn new(base_color: Vec3, intensity: f32) -> Self {
        Self {
            base_color,
            intensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
    Ambient,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
    Ambient(AmbientLight),
}

impl Component for Light {}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

impl From<SpotLight> for Light {
    fn from(light: SpotLight) -> Self {
        Light::Spot(light)
    }
}

impl From<AmbientLight> for Light {
    fn from(light: AmbientLight) -> Self {
        Light::Ambient(light)
    }
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self {
            Light::Directional(_) => LightKind::Directional,
            Light::Point(_) => LightKind::Point,
            Light::Spot(_) => LightKind::Spot,
            Light::Ambient(_) => LightKind::Ambient,
        }
    }

    pub fn base_color(&self) -> Vec3 {
        match self {
            Light::Directional(l) => l.base_color,
            Light::Point(l) => l.base_color,
            Light::Spot(l) => l.base_color,
            Light::Ambient(l) => l.base_color,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self {
            Light::Directional(l) => l.intensity,
            Light::Point(l) => l.intensity,
            Light::Spot(l) => l.intensity,
            Light::Ambient(l) => l.intensity,
        }
    }

    /// Emitted radiance, `base_color * intensity`.
    pub fn radiance(&self) -> Vec3 {
        self.base_color() * self.intensity()
    }

    /// Light-space projection. Ambient light has none.
    pub fn light_to_projection_matrix(&self) -> Option<Mat4> {
        match self {
            Light::Directional(l) => Some(l.light_to_projection_matrix()),
            Light::Point(l) => Some(l.light_to_projection_matrix()),
            Light::Spot(l) => Some(l.light_to_projection_matrix()),
            Light::Ambient(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radiance_is_color_times_intensity() {
        let light = Light::from(DirectionalLight::new(Vec3::new(1.0, 0.5, 0.0), 3.0));
        assert_eq!(light.radiance(), Vec3::new(3.0, 1.5, 0.0));
        assert_eq!(light.kind(), LightKind::Directional);
    }

    #[test]
    fn umbra_clamps_above_penumbra() {
        let mut spot = SpotLight::default();
        spot.set_cos_penumbra(0.5);
        spot.set_cos_umbra(0.2);
        assert!((spot.cos_umbra() - 0.501).abs() < 1e-6);
        assert!(spot.cos_penumbra() < spot.cos_umbra());
    }

    #[test]
    fn penumbra_clamps_below_umbra() {
        let mut spot = SpotLight::default();
        spot.set_cos_umbra(0.8);
        spot.set_cos_penumbra(0.95);
        assert!((spot.cos_penumbra() - 0.799).abs() < 1e-6);
        spot.set_cos_penumbra(-1.0);
        assert_eq!(spot.cos_penumbra(), SPOT_COS_EPSILON);
    }

    #[test]
    fn angle_setters_go_through_cosines() {
        let mut spot = SpotLight::default();
        spot.set_penumbra_angle(1.0);
        spot.set_umbra_angle(0.5);
        assert!((spot.umbra_angle() - 0.5).abs() < 1e-5);
        assert!((spot.penumbra_angle() - 1.0).abs() < 1e-5);
        // A wider umbra than penumbra is pulled back inside.
        spot.set_umbra_angle(1.2);
        assert!(spot.umbra_angle() < spot.penumbra_angle());
    }

    #[test]
    fn directional_box_maps_start_and_range_to_unit_depth() {
        let light = DirectionalLight::default();
        let proj = light.light_to_projection_matrix();
        let near = proj.project_point3(Vec3::new(0.5, -0.5, light.start));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, light.range));
        assert!(near.abs_diff_eq(Vec3::new(1.0, -1.0, 0.0), 1e-5));
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn point_projection_maps_start_to_zero_depth() {
        let light = PointLight::default();
        let proj = light.light_to_projection_matrix();
        let p = proj * Vec4::new(0.0, 0.0, light.start, 1.0);
        assert!((p.z / p.w).abs() < 1e-6);
        let p = proj * Vec4::new(0.0, 0.0, light.range, 1.0);
        assert!((p.z / p.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn spot_projection_covers_penumbra_cone() {
        let mut spot = SpotLight::default();
        spot.set_cos_penumbra(std::f32::consts::FRAC_PI_4.cos());
        let proj = spot.light_to_projection_matrix();
        // A point on the penumbra cone edge lands on the clip boundary.
        let edge = proj.project_point3(Vec3::new(0.5, 0.0, 0.5));
        assert!((edge.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn ambient_has_no_projection() {
        let light = Light::from(AmbientLight::new(Vec3::ONE, 0.2));
        assert!(light.light_to_projection_matrix().is_none());
    }

    #[test]
    fn deserialized_spot_keeps_penumbra_below_umbra() {
        let json = r#"{
            "base_color": [1.0, 1.0, 1.0],
            "intensity": 1.0,
            "attenuation": [1.0, 0.0, 0.0],
            "start": 0.1,
            "range": 5.0,
            "cos_umbra": 0.5,
            "cos_penumbra": 0.9
        }"#;
        let spot: SpotLight = serde_json::from_str(json).unwrap();
        assert_eq!(spot.cos_umbra(), 0.5);
        assert!((spot.cos_penumbra() - 0.499).abs() < 1e-6);
        assert_eq!(spot.range, 5.0);
    }

    #[test]
    fn spot_serde_keeps_valid_cosines() {
        let mut spot = SpotLight::new(Vec3::ONE, 2.0).with_range(3.0);
        spot.set_cos_penumbra(0.7);
        spot.set_cos_umbra(0.9);
        let json = serde_json::to_string(&spot).unwrap();
        let back: SpotLight = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spot);
    }

    #[test]
    fn lights_serialize_with_their_kind() {
        let json = serde_json::to_string(&Light::from(PointLight::default())).unwrap();
        assert!(json.starts_with("{\"Point\""));
    }
}
