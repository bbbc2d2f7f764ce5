use glam::{EulerRot, Mat4, Quat, Vec3};
use prism_ecs::Component;
use serde::{Deserialize, Serialize};

/// Placement of an entity: translation, rotation and non-uniform scale.
///
/// The derived matrices are recomputed on every mutation, so readers never
/// observe a stale `object_to_world`. Getters return copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformParams", into = "TransformParams")]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
    object_to_world: Mat4,
    world_to_object: Mat4,
}

/// The serialized form: the matrices are derived, not stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TransformParams {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl From<TransformParams> for Transform {
    fn from(p: TransformParams) -> Self {
        Transform::from_trs(p.translation, p.rotation, p.scale)
    }
}

impl From<Transform> for TransformParams {
    fn from(t: Transform) -> Self {
        Self {
            translation: t.translation,
            rotation: t.rotation,
            scale: t.scale,
        }
    }
}

impl Component for Transform {}

impl Default for Transform {
    fn default() -> Self {
        Self::from_trs(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_trs(translation, Quat::IDENTITY, Vec3::ONE)
    }

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut t = Self {
            translation,
            rotation,
            scale,
            object_to_world: Mat4::IDENTITY,
            world_to_object: Mat4::IDENTITY,
        };
        t.recompute();
        t
    }

    // --- Translation ---

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.recompute();
    }

    pub fn translate(&mut self, units: Vec3) {
        self.translation += units;
        self.recompute();
    }

    pub fn translate_x(&mut self, units: f32) {
        self.translate(Vec3::new(units, 0.0, 0.0));
    }

    pub fn translate_y(&mut self, units: f32) {
        self.translate(Vec3::new(0.0, units, 0.0));
    }

    pub fn translate_z(&mut self, units: f32) {
        self.translate(Vec3::new(0.0, 0.0, units));
    }

    // --- Rotation ---

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.recompute();
    }

    /// Apply `rotation` in the local frame (right-multiplied).
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = (self.rotation * rotation).normalize();
        self.recompute();
    }

    pub fn rotate_x(&mut self, radians: f32) {
        self.rotate(Quat::from_rotation_x(radians));
    }

    pub fn rotate_y(&mut self, radians: f32) {
        self.rotate(Quat::from_rotation_y(radians));
    }

    pub fn rotate_z(&mut self, radians: f32) {
        self.rotate(Quat::from_rotation_z(radians));
    }

    /// Replace the rotation with one built from Euler angles in degrees,
    /// applied about X, then Y, then Z.
    pub fn set_euler_angles(&mut self, degrees: Vec3) {
        let r = degrees * (std::f32::consts::PI / 180.0);
        self.set_rotation(Quat::from_euler(EulerRot::ZYX, r.z, r.y, r.x));
    }

    // --- Scale ---

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.recompute();
    }

    /// Multiply the current scale component-wise.
    pub fn scale_by(&mut self, factors: Vec3) {
        self.scale *= factors;
        self.recompute();
    }

    pub fn scale_by_x(&mut self, factor: f32) {
        self.scale_by(Vec3::new(factor, 1.0, 1.0));
    }

    pub fn scale_by_y(&mut self, factor: f32) {
        self.scale_by(Vec3::new(1.0, factor, 1.0));
    }

    pub fn scale_by_z(&mut self, factor: f32) {
        self.scale_by(Vec3::new(1.0, 1.0, factor));
    }

    // --- Derived ---

    pub fn object_to_world_matrix(&self) -> Mat4 {
        self.object_to_world
    }

    pub fn world_to_object_matrix(&self) -> Mat4 {
        self.world_to_object
    }

    pub fn world_axis_x(&self) -> Vec3 {
        self.object_to_world.x_axis.truncate()
    }

    pub fn world_axis_y(&self) -> Vec3 {
        self.object_to_world.y_axis.truncate()
    }

    /// Local +Z in world space. Lights shine along it.
    pub fn world_axis_z(&self) -> Vec3 {
        self.object_to_world.z_axis.truncate()
    }

    pub fn world_origin(&self) -> Vec3 {
        self.object_to_world.w_axis.truncate()
    }

    fn recompute(&mut self) {
        self.object_to_world =
            Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation);
        self.world_to_object = self.object_to_world.inverse();
    }
}
