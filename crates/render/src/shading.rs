//! Reference evaluation of the forward program's lighting on the CPU.
//!
//! This mirrors `shaders::FORWARD_FS` term for term: a Lambertian ambient
//! term plus, for every active light, a Trowbridge-Reitz/GGX microfacet BRDF
//! with Schlick Fresnel and Smith visibility. The software device shades
//! its fragments with it, and tests use it as ground truth.

use std::f32::consts::PI;

use glam::{Mat4, Vec3, Vec4};

use crate::buffers::{DirectionalLightEntry, LightBuffer, PointLightEntry, SpotLightEntry};

/// Everything the BRDF needs about one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    /// Unit normal.
    pub normal: Vec3,
    pub albedo: Vec3,
    pub roughness: f32,
    pub metalness: f32,
}

/// Distance falloff `1 / max(c0 + c1 d + c2 d², 0.01)`.
pub fn attenuation(distance: f32, coefficients: Vec3) -> f32 {
    let falloff = coefficients.x + coefficients.y * distance + coefficients.z * distance * distance;
    1.0 / falloff.max(0.01)
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Trowbridge-Reitz normal distribution.
pub fn distribution_ggx(n_dot_h: f32, alpha: f32) -> f32 {
    let a2 = alpha * alpha;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d)
}

/// Schlick's Fresnel approximation.
pub fn fresnel_schlick(l_dot_h: f32, f0: Vec3) -> Vec3 {
    f0.lerp(Vec3::ONE, (1.0 - l_dot_h).powi(5))
}

fn smith_g1(n_dot_x: f32, alpha: f32) -> f32 {
    let a2 = alpha * alpha;
    2.0 / (n_dot_x + (a2 + (1.0 - a2) * n_dot_x * n_dot_x).sqrt())
}

/// Separable Smith visibility term, `V1(n·l) V1(n·v)`.
pub fn visibility_smith(n_dot_l: f32, n_dot_v: f32, alpha: f32) -> f32 {
    smith_g1(n_dot_l, alpha) * smith_g1(n_dot_v, alpha)
}

/// Diffuse plus specular reflectance for light arriving along `l`, seen
/// along `v`. Both terms are clamped to `[0, 1]`.
pub fn brdf(surface: &SurfacePoint, l: Vec3, v: Vec3) -> Vec3 {
    let n = surface.normal;
    let h = (l + v).normalize_or_zero();
    let alpha = (surface.roughness * surface.roughness).max(0.01);
    let f0 = Vec3::splat(0.04).lerp(surface.albedo, surface.metalness);

    let n_dot_h = n.dot(h).max(0.0);
    let n_dot_l = n.dot(l).max(0.0);
    let n_dot_v = n.dot(v).max(0.0);
    let l_dot_h = l.dot(h).max(0.0);

    let d = distribution_ggx(n_dot_h, alpha);
    let f = fresnel_schlick(l_dot_h, f0);
    let vis = visibility_smith(n_dot_l, n_dot_v, alpha);

    let diffuse = (Vec3::ONE - f) * (1.0 - surface.metalness) * surface.albedo / PI;
    let specular = d * f * vis / 4.0;
    diffuse.clamp(Vec3::ZERO, Vec3::ONE) + specular.clamp(Vec3::ZERO, Vec3::ONE)
}

/// Whether `p` lies inside the light's box: x and y within `[-1, 1]` and
/// depth within `[0, 1]` after projection.
pub fn directional_visible(world_to_projection: &Mat4, p: Vec3) -> bool {
    let clip = *world_to_projection * Vec4::new(p.x, p.y, p.z, 1.0);
    if clip.w <= 0.0 {
        return false;
    }
    let ndc = clip.truncate() / clip.w;
    ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && (0.0..=1.0).contains(&ndc.z)
}

/// Unit vector toward the light and the irradiance it delivers at `p`.
pub fn directional_incidence(light: &DirectionalLightEntry, p: Vec3) -> (Vec3, Vec3) {
    let to_light = -Vec3::from(light.direction).normalize_or_zero();
    let m = Mat4::from_cols_array_2d(&light.world_to_projection);
    let irradiance = if directional_visible(&m, p) {
        Vec3::from(light.intensity)
    } else {
        Vec3::ZERO
    };
    (to_light, irradiance)
}

pub fn point_incidence(light: &PointLightEntry, p: Vec3) -> (Vec3, Vec3) {
    let offset = Vec3::from(light.position) - p;
    let d = offset.length();
    let to_light = offset.normalize_or_zero();
    if d > light.range {
        return (to_light, Vec3::ZERO);
    }
    let falloff = attenuation(d, Vec3::from(light.attenuation));
    (to_light, Vec3::from(light.intensity) * falloff)
}

pub fn spot_incidence(light: &SpotLightEntry, p: Vec3) -> (Vec3, Vec3) {
    let offset = Vec3::from(light.position) - p;
    let d = offset.length();
    let to_light = offset.normalize_or_zero();
    if d > light.range {
        return (to_light, Vec3::ZERO);
    }
    let direction = Vec3::from(light.direction).normalize_or_zero();
    let cone = smoothstep(light.cos_penumbra, light.cos_umbra, (-to_light).dot(direction));
    let falloff = attenuation(d, Vec3::from(light.attenuation));
    (to_light, Vec3::from(light.intensity) * falloff * cone)
}

/// Lambertian response to the ambient radiance.
pub fn ambient_term(surface: &SurfacePoint, ambient: Vec3) -> Vec3 {
    (1.0 - surface.metalness) * surface.albedo / PI * ambient
}

/// Outgoing radiance at `surface` seen from `eye`, clamped to `[0, 1]`.
pub fn shade(surface: &SurfacePoint, eye: Vec3, lights: &LightBuffer) -> Vec3 {
    let v = (eye - surface.position).normalize_or_zero();
    let mut radiance = ambient_term(surface, lights.ambient());

    let incidences = lights
        .directional_lights()
        .iter()
        .map(|l| directional_incidence(l, surface.position))
        .chain(
            lights
                .point_lights()
                .iter()
                .map(|l| point_incidence(l, surface.position)),
        )
        .chain(
            lights
                .spot_lights()
                .iter()
                .map(|l| spot_incidence(l, surface.position)),
        );

    for (to_light, irradiance) in incidences {
        if irradiance == Vec3::ZERO {
            continue;
        }
        let n_dot_l = surface.normal.dot(to_light).max(0.0);
        radiance += brdf(surface, to_light, v) * irradiance * n_dot_l;
    }

    radiance.clamp(Vec3::ZERO, Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use prism_scene::{DirectionalLight, PointLight, SpotLight, Transform};

    fn lambert_surface(albedo: Vec3) -> SurfacePoint {
        SurfacePoint {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            albedo,
            roughness: 1.0,
            metalness: 0.0,
        }
    }

    #[test]
    fn attenuation_is_one_at_the_source_with_constant_falloff() {
        assert_eq!(attenuation(0.0, Vec3::new(1.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn quadratic_attenuation_decreases_with_distance() {
        let c = Vec3::new(0.0, 0.0, 1.0);
        let mut previous = attenuation(0.2, c);
        for i in 3..50 {
            let d = i as f32 * 0.1;
            let a = attenuation(d, c);
            assert!(a < previous, "attenuation rose at d = {d}");
            previous = a;
        }
    }

    #[test]
    fn attenuation_denominator_is_floored() {
        assert!((attenuation(0.0, Vec3::ZERO) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn ggx_integrates_projected_to_one() {
        // ∫ D(h) (n·h) dω = 1 over the hemisphere.
        let alpha = 0.5;
        let steps = 4000;
        let mut sum = 0.0;
        for i in 0..steps {
            let theta = (i as f32 + 0.5) / steps as f32 * PI / 2.0;
            let cos_t = theta.cos();
            let d_omega = 2.0 * PI * theta.sin() * (PI / 2.0 / steps as f32);
            sum += distribution_ggx(cos_t, alpha) * cos_t * d_omega;
        }
        assert!((sum - 1.0).abs() < 1e-2, "integral was {sum}");
    }

    #[test]
    fn fresnel_is_f0_head_on_and_one_at_grazing() {
        let f0 = Vec3::splat(0.04);
        assert!(fresnel_schlick(1.0, f0).abs_diff_eq(f0, 1e-6));
        assert!(fresnel_schlick(0.0, f0).abs_diff_eq(Vec3::ONE, 1e-6));
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.1, 0.9, 0.0), 0.0);
        assert_eq!(smoothstep(0.1, 0.9, 1.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn diffuse_only_surface_matches_lambert_at_normal_incidence() {
        let albedo = Vec3::new(0.8, 0.6, 0.4);
        let surface = lambert_surface(albedo);
        let irradiance = 3.0;

        let mut lights = LightBuffer::default();
        let sun = DirectionalLight {
            proj_size: [4.0, 4.0],
            range: 10.0,
            ..DirectionalLight::new(Vec3::ONE, irradiance)
        };
        let placement = Transform::from_trs(
            Vec3::new(0.0, 0.0, 5.0),
            Quat::from_rotation_y(PI),
            Vec3::ONE,
        );
        lights.push_directional(DirectionalLightEntry::new(&sun, &placement));

        // Viewed off-axis so the specular lobe of the rough dielectric is small.
        let eye = Vec3::new(2.0, 0.0, 2.0);
        let color = shade(&surface, eye, &lights);
        let v = eye.normalize();
        assert!(color.abs_diff_eq(brdf(&surface, Vec3::Z, v) * irradiance, 1e-5));
        // The diffuse term dominates: within a few percent of pure Lambert.
        assert!(color.abs_diff_eq(albedo / PI * irradiance, 0.05));
    }

    #[test]
    fn directional_light_outside_its_box_contributes_nothing() {
        let mut lights = LightBuffer::default();
        let sun = DirectionalLight::new(Vec3::ONE, 3.0);
        let placement = Transform::from_trs(
            Vec3::new(0.0, 0.0, 5.0),
            Quat::from_rotation_y(PI),
            Vec3::ONE,
        );
        // Default box reaches one unit along +Z; the origin is five away.
        lights.push_directional(DirectionalLightEntry::new(&sun, &placement));
        let color = shade(&lambert_surface(Vec3::ONE), Vec3::new(0.0, 0.0, 3.0), &lights);
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn point_light_beyond_range_is_dark() {
        let light = PointLight {
            range: 1.0,
            ..PointLight::new(Vec3::ONE, 1.0)
        };
        let entry = PointLightEntry::new(&light, &Transform::from_translation(Vec3::Z * 2.0));
        let (to_light, irradiance) = point_incidence(&entry, Vec3::ZERO);
        assert_eq!(irradiance, Vec3::ZERO);
        assert!(to_light.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn spot_cone_falls_off_between_umbra_and_penumbra() {
        let mut light = SpotLight::new(Vec3::ONE, 1.0)
            .with_range(10.0)
            .with_attenuation(Vec3::new(1.0, 0.0, 0.0));
        light.set_cos_penumbra(0.5);
        light.set_cos_umbra(0.9);
        let placement = Transform::from_trs(Vec3::Z, Quat::from_rotation_y(PI), Vec3::ONE);
        let entry = SpotLightEntry::new(&light, &placement);

        let (_, on_axis) = spot_incidence(&entry, Vec3::ZERO);
        assert!(on_axis.abs_diff_eq(Vec3::ONE, 1e-5));
        // 80 degrees off axis is outside the penumbra.
        let off = Vec3::new(80f32.to_radians().tan(), 0.0, 0.0);
        let (_, outside) = spot_incidence(&entry, off);
        assert_eq!(outside, Vec3::ZERO);
    }

    #[test]
    fn ambient_only_scene_is_lambertian() {
        let mut lights = LightBuffer::default();
        lights.add_ambient(Vec3::splat(0.5));
        let surface = lambert_surface(Vec3::ONE);
        let color = shade(&surface, Vec3::Z, &lights);
        assert!(color.abs_diff_eq(Vec3::splat(0.5 / PI), 1e-6));
    }
}
