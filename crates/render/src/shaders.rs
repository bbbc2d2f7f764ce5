//! WGSL text of the forward program.
//!
//! Block layouts here must match `buffers`: `Camera` at binding 0, `Model`
//! at binding 1, `Lights` at binding 2, all in group 0. The fragment stage
//! evaluates the same lighting as `shading::shade`.

use prism_gpu::{ProgramDesc, Vertex, VertexLayout, VertexPositionNormalColor};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub static FORWARD_VERTEX_LAYOUT: VertexLayout = VertexPositionNormalColor::LAYOUT;

pub const FORWARD_UNIFORM_BLOCKS: [&str; 3] = ["Camera", "Model", "Lights"];

macro_rules! forward_blocks {
    () => {
        r#"
struct Camera {
    camera_to_world: mat4x4<f32>,
    world_to_camera: mat4x4<f32>,
    camera_to_projection: mat4x4<f32>,
    projection_to_camera: mat4x4<f32>,
};

struct Material {
    base_color: vec4<f32>,
    roughness: f32,
    metalness: f32,
    _pad: vec2<f32>,
};

struct Model {
    world: mat4x4<f32>,
    world_inv_transpose: mat4x4<f32>,
    tex_transform: mat4x4<f32>,
    material: Material,
};

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> model: Model;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec3<f32>,
};
"#
    };
}

pub const FORWARD_VS: &str = concat!(
    forward_blocks!(),
    r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world_position = model.world * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = camera.camera_to_projection * camera.world_to_camera * world_position;
    out.world_position = world_position.xyz;
    out.world_normal = (model.world_inv_transpose * vec4<f32>(in.normal, 0.0)).xyz;
    out.color = in.color;
    return out;
}
"#
);

pub const FORWARD_FS: &str = concat!(
    forward_blocks!(),
    r#"
const PI: f32 = 3.14159265;
const MAX_LIGHTS: u32 = 8u;

struct DirectionalLight {
    intensity: vec3<f32>,
    direction: vec3<f32>,
    world_to_projection: mat4x4<f32>,
};

struct PointLight {
    intensity: vec3<f32>,
    range: f32,
    position: vec3<f32>,
    attenuation: vec3<f32>,
};

struct SpotLight {
    intensity: vec3<f32>,
    range: f32,
    position: vec3<f32>,
    cos_umbra: f32,
    direction: vec3<f32>,
    cos_penumbra: f32,
    attenuation: vec3<f32>,
};

struct Lights {
    directional: array<DirectionalLight, 8>,
    point: array<PointLight, 8>,
    spot: array<SpotLight, 8>,
    counts: vec4<u32>,
    ambient: vec3<f32>,
};

@group(0) @binding(2) var<uniform> lights: Lights;

struct Surface {
    position: vec3<f32>,
    normal: vec3<f32>,
    albedo: vec3<f32>,
    roughness: f32,
    metalness: f32,
};

fn attenuation(d: f32, c: vec3<f32>) -> f32 {
    return 1.0 / max(c.x + c.y * d + c.z * d * d, 0.01);
}

fn distribution_ggx(n_dot_h: f32, alpha: f32) -> f32 {
    let a2 = alpha * alpha;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

fn fresnel_schlick(l_dot_h: f32, f0: vec3<f32>) -> vec3<f32> {
    return mix(f0, vec3<f32>(1.0), pow(1.0 - l_dot_h, 5.0));
}

fn smith_g1(n_dot_x: f32, alpha: f32) -> f32 {
    let a2 = alpha * alpha;
    return 2.0 / (n_dot_x + sqrt(a2 + (1.0 - a2) * n_dot_x * n_dot_x));
}

fn brdf(s: Surface, l: vec3<f32>, v: vec3<f32>) -> vec3<f32> {
    let h = normalize(l + v);
    let alpha = max(s.roughness * s.roughness, 0.01);
    let f0 = mix(vec3<f32>(0.04), s.albedo, s.metalness);

    let n_dot_h = max(dot(s.normal, h), 0.0);
    let n_dot_l = max(dot(s.normal, l), 0.0);
    let n_dot_v = max(dot(s.normal, v), 0.0);
    let l_dot_h = max(dot(l, h), 0.0);

    let d = distribution_ggx(n_dot_h, alpha);
    let f = fresnel_schlick(l_dot_h, f0);
    let vis = smith_g1(n_dot_l, alpha) * smith_g1(n_dot_v, alpha);

    let diffuse = (vec3<f32>(1.0) - f) * (1.0 - s.metalness) * s.albedo / PI;
    let specular = d * f * vis / 4.0;
    return clamp(diffuse, vec3<f32>(0.0), vec3<f32>(1.0))
        + clamp(specular, vec3<f32>(0.0), vec3<f32>(1.0));
}

fn directional_visible(m: mat4x4<f32>, p: vec3<f32>) -> bool {
    let clip = m * vec4<f32>(p, 1.0);
    if (clip.w <= 0.0) {
        return false;
    }
    let ndc = clip.xyz / clip.w;
    return abs(ndc.x) <= 1.0 && abs(ndc.y) <= 1.0 && ndc.z >= 0.0 && ndc.z <= 1.0;
}

fn contribution(s: Surface, v: vec3<f32>, to_light: vec3<f32>, irradiance: vec3<f32>) -> vec3<f32> {
    if (all(irradiance == vec3<f32>(0.0))) {
        return vec3<f32>(0.0);
    }
    return brdf(s, to_light, v) * irradiance * max(dot(s.normal, to_light), 0.0);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var s: Surface;
    s.position = in.world_position;
    s.normal = normalize(in.world_normal);
    s.albedo = model.material.base_color.rgb * in.color;
    s.roughness = model.material.roughness;
    s.metalness = model.material.metalness;

    let eye = camera.camera_to_world[3].xyz;
    let v = normalize(eye - s.position);

    var radiance = (1.0 - s.metalness) * s.albedo / PI * lights.ambient;

    for (var i = 0u; i < min(lights.counts.x, MAX_LIGHTS); i = i + 1u) {
        let light = lights.directional[i];
        var irradiance = vec3<f32>(0.0);
        if (directional_visible(light.world_to_projection, s.position)) {
            irradiance = light.intensity;
        }
        radiance += contribution(s, v, -normalize(light.direction), irradiance);
    }

    for (var i = 0u; i < min(lights.counts.y, MAX_LIGHTS); i = i + 1u) {
        let light = lights.point[i];
        let offset = light.position - s.position;
        let d = length(offset);
        var irradiance = vec3<f32>(0.0);
        if (d <= light.range) {
            irradiance = light.intensity * attenuation(d, light.attenuation);
        }
        radiance += contribution(s, v, normalize(offset), irradiance);
    }

    for (var i = 0u; i < min(lights.counts.z, MAX_LIGHTS); i = i + 1u) {
        let light = lights.spot[i];
        let offset = light.position - s.position;
        let d = length(offset);
        let to_light = normalize(offset);
        var irradiance = vec3<f32>(0.0);
        if (d <= light.range) {
            let cone = smoothstep(
                light.cos_penumbra,
                light.cos_umbra,
                dot(-to_light, normalize(light.direction)),
            );
            irradiance = light.intensity * attenuation(d, light.attenuation) * cone;
        }
        radiance += contribution(s, v, to_light, irradiance);
    }

    return vec4<f32>(clamp(radiance, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#
);

/// Everything a device needs to build the forward program.
pub fn forward_program_desc() -> ProgramDesc<'static> {
    ProgramDesc {
        label: "forward",
        vertex_source: FORWARD_VS,
        fragment_source: FORWARD_FS,
        vertex_layout: &FORWARD_VERTEX_LAYOUT,
        uniform_blocks: &FORWARD_UNIFORM_BLOCKS,
    }
}
