//! Fixed-layout uniform blocks shared with the forward program.
//!
//! Every block is `#[repr(C)]` plain data laid out by std140 rules: each
//! `vec3` is followed by one scalar (a real field or padding) so that the
//! next member starts on a 16-byte boundary, and every struct is a multiple
//! of 16 bytes. Serialization is a byte cast, so a block's serialized size is
//! always its declared size.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use prism_scene::{Camera, DirectionalLight, Material, PointLight, SpotLight, Transform};
use serde::Serialize;

pub const MAX_DIRECTIONAL_LIGHTS: usize = 8;
pub const MAX_POINT_LIGHTS: usize = 8;
pub const MAX_SPOT_LIGHTS: usize = 8;

/// The closed set of uniform blocks the forward program reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum UniformBlock {
    Camera,
    Model,
    Lights,
}

impl UniformBlock {
    pub const ALL: [UniformBlock; 3] = [
        UniformBlock::Camera,
        UniformBlock::Model,
        UniformBlock::Lights,
    ];

    /// Block name as declared in program text.
    pub const fn name(self) -> &'static str {
        match self {
            UniformBlock::Camera => "Camera",
            UniformBlock::Model => "Model",
            UniformBlock::Lights => "Lights",
        }
    }

    /// Binding point the block's buffer is attached to.
    pub const fn slot(self) -> u32 {
        match self {
            UniformBlock::Camera => 0,
            UniformBlock::Model => 1,
            UniformBlock::Lights => 2,
        }
    }

    /// Declared size in bytes.
    pub const fn size(self) -> usize {
        match self {
            UniformBlock::Camera => std::mem::size_of::<CameraBuffer>(),
            UniformBlock::Model => std::mem::size_of::<ModelBuffer>(),
            UniformBlock::Lights => std::mem::size_of::<LightBuffer>(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// `Camera` block: 4 × mat4.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CameraBuffer {
    pub camera_to_world: [[f32; 4]; 4],
    pub world_to_camera: [[f32; 4]; 4],
    pub camera_to_projection: [[f32; 4]; 4],
    pub projection_to_camera: [[f32; 4]; 4],
}

impl CameraBuffer {
    pub fn new(camera: &Camera, transform: &Transform) -> Self {
        let projection = camera.camera_to_projection_matrix();
        Self {
            camera_to_world: transform.object_to_world_matrix().to_cols_array_2d(),
            world_to_camera: transform.world_to_object_matrix().to_cols_array_2d(),
            camera_to_projection: projection.to_cols_array_2d(),
            projection_to_camera: projection.inverse().to_cols_array_2d(),
        }
    }

    pub fn world_to_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.camera_to_projection)
            * Mat4::from_cols_array_2d(&self.world_to_camera)
    }

    /// The camera's world-space position.
    pub fn eye(&self) -> Vec3 {
        Vec3::from_slice(&self.camera_to_world[3][..3])
    }
}

/// Surface parameters inside the `Model` block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MaterialBlock {
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub _pad: [f32; 2],
}

impl From<&Material> for MaterialBlock {
    fn from(m: &Material) -> Self {
        Self {
            base_color: m.base_color.to_array(),
            roughness: m.roughness,
            metalness: m.metalness,
            _pad: [0.0; 2],
        }
    }
}

/// `Model` block: 3 × mat4 plus the material.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ModelBuffer {
    pub world: [[f32; 4]; 4],
    /// `transpose(inverse(world))`; transforms normals under non-uniform scale.
    pub world_inv_transpose: [[f32; 4]; 4],
    pub tex_transform: [[f32; 4]; 4],
    pub material: MaterialBlock,
}

impl ModelBuffer {
    pub fn new(transform: &Transform, material: &Material) -> Self {
        Self {
            world: transform.object_to_world_matrix().to_cols_array_2d(),
            world_inv_transpose: transform
                .world_to_object_matrix()
                .transpose()
                .to_cols_array_2d(),
            tex_transform: Mat4::IDENTITY.to_cols_array_2d(),
            material: MaterialBlock::from(material),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable, Serialize)]
pub struct DirectionalLightEntry {
    pub intensity: [f32; 3],
    #[serde(skip)]
    pub _pad0: f32,
    pub direction: [f32; 3],
    #[serde(skip)]
    pub _pad1: f32,
    /// Light-space projection composed with the inverse placement.
    pub world_to_projection: [[f32; 4]; 4],
}

impl DirectionalLightEntry {
    pub fn new(light: &DirectionalLight, transform: &Transform) -> Self {
        let world_to_projection =
            light.light_to_projection_matrix() * transform.world_to_object_matrix();
        Self {
            intensity: (light.base_color * light.intensity).to_array(),
            _pad0: 0.0,
            direction: transform.world_axis_z().to_array(),
            _pad1: 0.0,
            world_to_projection: world_to_projection.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable, Serialize)]
pub struct PointLightEntry {
    pub intensity: [f32; 3],
    pub range: f32,
    pub position: [f32; 3],
    #[serde(skip)]
    pub _pad0: f32,
    pub attenuation: [f32; 3],
    #[serde(skip)]
    pub _pad1: f32,
}

impl PointLightEntry {
    pub fn new(light: &PointLight, transform: &Transform) -> Self {
        Self {
            intensity: (light.base_color * light.intensity).to_array(),
            range: light.range,
            position: transform.world_origin().to_array(),
            _pad0: 0.0,
            attenuation: light.attenuation.to_array(),
            _pad1: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable, Serialize)]
pub struct SpotLightEntry {
    pub intensity: [f32; 3],
    pub range: f32,
    pub position: [f32; 3],
    pub cos_umbra: f32,
    pub direction: [f32; 3],
    pub cos_penumbra: f32,
    pub attenuation: [f32; 3],
    #[serde(skip)]
    pub _pad0: f32,
}

impl SpotLightEntry {
    pub fn new(light: &SpotLight, transform: &Transform) -> Self {
        Self {
            intensity: (light.base_color * light.intensity).to_array(),
            range: light.range,
            position: transform.world_origin().to_array(),
            cos_umbra: light.cos_umbra(),
            direction: transform.world_axis_z().to_array(),
            cos_penumbra: light.cos_penumbra(),
            attenuation: light.attenuation.to_array(),
            _pad0: 0.0,
        }
    }
}

/// `Lights` block: bounded arrays per light type, then the active counts
/// and the summed ambient radiance.
///
/// Slots past each count are zero.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LightBuffer {
    pub directional: [DirectionalLightEntry; MAX_DIRECTIONAL_LIGHTS],
    pub point: [PointLightEntry; MAX_POINT_LIGHTS],
    pub spot: [SpotLightEntry; MAX_SPOT_LIGHTS],
    /// Directional, point and spot counts; the fourth lane is padding.
    pub counts: [u32; 4],
    pub ambient: [f32; 3],
    pub _pad0: f32,
}

impl Default for LightBuffer {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightBuffer {
    pub const SIZE: usize = std::mem::size_of::<LightBuffer>();

    pub fn clear(&mut self) {
        *self = Self::zeroed();
    }

    pub fn directional_count(&self) -> usize {
        self.counts[0] as usize
    }

    pub fn point_count(&self) -> usize {
        self.counts[1] as usize
    }

    pub fn spot_count(&self) -> usize {
        self.counts[2] as usize
    }

    pub fn directional_lights(&self) -> &[DirectionalLightEntry] {
        &self.directional[..self.directional_count().min(MAX_DIRECTIONAL_LIGHTS)]
    }

    pub fn point_lights(&self) -> &[PointLightEntry] {
        &self.point[..self.point_count().min(MAX_POINT_LIGHTS)]
    }

    pub fn spot_lights(&self) -> &[SpotLightEntry] {
        &self.spot[..self.spot_count().min(MAX_SPOT_LIGHTS)]
    }

    pub fn ambient(&self) -> Vec3 {
        Vec3::from(self.ambient)
    }

    /// Append a directional light. Returns false, leaving the buffer as it
    /// was, once all slots are taken.
    pub fn push_directional(&mut self, entry: DirectionalLightEntry) -> bool {
        push_bounded(&mut self.directional, &mut self.counts[0], entry)
    }

    pub fn push_point(&mut self, entry: PointLightEntry) -> bool {
        push_bounded(&mut self.point, &mut self.counts[1], entry)
    }

    pub fn push_spot(&mut self, entry: SpotLightEntry) -> bool {
        push_bounded(&mut self.spot, &mut self.counts[2], entry)
    }

    pub fn add_ambient(&mut self, radiance: Vec3) {
        self.ambient = (self.ambient() + radiance).to_array();
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

fn push_bounded<T: Copy>(slots: &mut [T], count: &mut u32, entry: T) -> bool {
    let index = *count as usize;
    match slots.get_mut(index) {
        Some(slot) => {
            *slot = entry;
            *count += 1;
            true
        }
        None => false,
    }
}

const _: () = assert!(std::mem::size_of::<CameraBuffer>() == 256);
const _: () = assert!(std::mem::size_of::<MaterialBlock>() == 32);
const _: () = assert!(std::mem::size_of::<ModelBuffer>() == 224);
const _: () = assert!(std::mem::size_of::<DirectionalLightEntry>() == 24 * 4);
const _: () = assert!(std::mem::size_of::<PointLightEntry>() == 12 * 4);
const _: () = assert!(std::mem::size_of::<SpotLightEntry>() == 16 * 4);
const _: () = assert!(std::mem::size_of::<LightBuffer>() == 1696);

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec4};

    #[test]
    fn empty_light_buffer_is_all_zero_at_declared_size() {
        let lights = LightBuffer::default();
        let bytes = lights.as_bytes();
        assert_eq!(bytes.len(), LightBuffer::SIZE);
        assert_eq!(bytes.len(), UniformBlock::Lights.size());
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(lights.counts, [0, 0, 0, 0]);
    }

    #[test]
    fn counts_follow_the_light_arrays() {
        let offset = std::mem::offset_of!(LightBuffer, counts);
        assert_eq!(offset, 8 * 96 + 8 * 48 + 8 * 64);
        assert_eq!(std::mem::offset_of!(LightBuffer, ambient), offset + 16);
    }

    #[test]
    fn vec3_members_start_on_16_byte_boundaries() {
        assert_eq!(std::mem::offset_of!(DirectionalLightEntry, direction), 16);
        assert_eq!(std::mem::offset_of!(DirectionalLightEntry, world_to_projection), 32);
        assert_eq!(std::mem::offset_of!(PointLightEntry, position), 16);
        assert_eq!(std::mem::offset_of!(PointLightEntry, attenuation), 32);
        assert_eq!(std::mem::offset_of!(SpotLightEntry, direction), 32);
        assert_eq!(std::mem::offset_of!(SpotLightEntry, attenuation), 48);
        assert_eq!(std::mem::offset_of!(ModelBuffer, material), 192);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut lights = LightBuffer::default();
        let entry = PointLightEntry::new(&PointLight::new(Vec3::ONE, 1.0), &Transform::new());
        for _ in 0..MAX_POINT_LIGHTS {
            assert!(lights.push_point(entry));
        }
        assert!(!lights.push_point(entry));
        assert_eq!(lights.point_count(), MAX_POINT_LIGHTS);
        assert_eq!(lights.point_lights().len(), MAX_POINT_LIGHTS);
    }

    #[test]
    fn camera_buffer_inverts_placement_and_projection() {
        let camera = Camera::default();
        let transform = Transform::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let buf = CameraBuffer::new(&camera, &transform);
        let c2w = Mat4::from_cols_array_2d(&buf.camera_to_world);
        let w2c = Mat4::from_cols_array_2d(&buf.world_to_camera);
        let c2p = Mat4::from_cols_array_2d(&buf.camera_to_projection);
        let p2c = Mat4::from_cols_array_2d(&buf.projection_to_camera);
        assert!((c2w * w2c).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        assert!((c2p * p2c).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert_eq!(buf.eye(), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn model_buffer_normal_matrix_undoes_non_uniform_scale() {
        let transform = Transform::from_trs(Vec3::ZERO, Quat::IDENTITY, Vec3::new(4.0, 1.0, 1.0));
        let buf = ModelBuffer::new(&transform, &Material::default());
        let n = Mat4::from_cols_array_2d(&buf.world_inv_transpose);
        // Normal of the plane x = y under the x-stretch.
        let normal = n.transform_vector3(Vec3::new(1.0, -1.0, 0.0)).normalize();
        let tangent = transform
            .object_to_world_matrix()
            .transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(normal.dot(tangent).abs() < 1e-6);
        assert_eq!(buf.tex_transform, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(buf.material.base_color, Vec4::ONE.to_array());
        assert_eq!(buf.material.roughness, 0.5);
    }

    #[test]
    fn directional_entry_uses_forward_axis() {
        let light = DirectionalLight::new(Vec3::ONE, 3.0);
        let transform = Transform::from_trs(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::PI),
            Vec3::ONE,
        );
        let entry = DirectionalLightEntry::new(&light, &transform);
        assert_eq!(entry.intensity, [3.0, 3.0, 3.0]);
        assert!(Vec3::from(entry.direction).abs_diff_eq(-Vec3::Z, 1e-6));
    }

    #[test]
    fn block_names_round_trip() {
        for block in UniformBlock::ALL {
            assert_eq!(UniformBlock::from_name(block.name()), Some(block));
        }
        assert_eq!(UniformBlock::from_name("Shadows"), None);
    }
}
