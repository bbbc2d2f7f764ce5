use std::f32::consts::PI;

use glam::{Quat, Vec3};
use prism_common::{EntityId, Viewport};
use prism_ecs::{Component, Ecs, Entity, System};
use prism_gpu::{GraphicsDevice, PrimitiveTopology, VertexPositionNormalColor, calculate_normals};

use crate::components::{
    AmbientLight, Camera, DirectionalLight, Light, Material, Model, PointLight, SpotLight,
    Transform,
};

/// A loadable world: one store plus the logic that populates and ticks it.
///
/// Lifecycle: `initialize` once, `update` every frame, `uninitialize` when
/// the scene is replaced.
pub trait Scene {
    fn name(&self) -> &str;

    fn ecs(&self) -> &Ecs;

    fn ecs_mut(&mut self) -> &mut Ecs;

    /// Populate the store. GPU resources are created on `device`.
    fn initialize(&mut self, device: &mut dyn GraphicsDevice);

    /// Scene-specific per-frame logic, run after the systems.
    fn update_scene(&mut self) {}

    fn update(&mut self) {
        self.ecs_mut().update();
        self.update_scene();
    }

    /// Release scene-owned resources. The default drops every entity and
    /// destroys the vertex buffers of their models.
    fn uninitialize(&mut self, device: &mut dyn GraphicsDevice) {
        let released = release_models(self.ecs_mut(), device);
        tracing::debug!("scene `{}` released {released} model(s)", self.name());
    }
}

/// Remove every entity from `ecs`, destroying model buffers on the way.
/// Returns the number of models released.
pub fn release_models(ecs: &mut Ecs, device: &mut dyn GraphicsDevice) -> usize {
    let mut released = 0;
    for mut entity in ecs.drain_entities() {
        if let Some(mut model) = entity.remove_component::<Model>() {
            model.release(device);
            released += 1;
        }
    }
    released
}

/// Remove one entity, destroying its model's vertex buffer first.
/// Returns whether the entity existed.
pub fn destroy_entity(ecs: &mut Ecs, id: EntityId, device: &mut dyn GraphicsDevice) -> bool {
    let Some(mut entity) = ecs.take_entity(id) else {
        return false;
    };
    if let Some(mut model) = entity.remove_component::<Model>() {
        model.release(device);
    }
    true
}

/// Attach `model` to `entity`, destroying the buffer of the model it
/// replaces.
pub fn set_model(entity: &mut Entity, model: Model, device: &mut dyn GraphicsDevice) {
    if let Some(mut previous) = entity.replace_component(model) {
        previous.release(device);
    }
}

/// Point every camera in `ecs` at `viewport`.
pub fn fit_cameras(ecs: &mut Ecs, viewport: Viewport) {
    ecs.for_each_mut::<&mut Camera>(|_, camera| camera.viewport = viewport);
}

/// Continuous rotation about a local axis, advanced by [`SpinSystem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub axis: Vec3,
    pub radians_per_tick: f32,
}

impl Component for Spin {}

impl Spin {
    pub fn about_z(radians_per_tick: f32) -> Self {
        Self {
            axis: Vec3::Z,
            radians_per_tick,
        }
    }
}

/// Rotates every entity carrying both `Spin` and `Transform`.
#[derive(Debug, Default)]
pub struct SpinSystem;

impl System for SpinSystem {
    fn update(&mut self, ecs: &mut Ecs) {
        ecs.for_each_mut::<(&Spin, &mut Transform)>(|_, (spin, transform)| {
            let axis = spin.axis.normalize_or_zero();
            transform.rotate(Quat::from_axis_angle(axis, spin.radians_per_tick));
        });
    }
}

/// Demo content: a camera at (0, 0, 3) facing -Z, two colored triangles
/// forming a diamond at the origin, and one light of each kind.
#[derive(Debug, Default)]
pub struct TestScene {
    ecs: Ecs,
    /// Spin rate of the diamond; zero keeps it still.
    pub spin: f32,
}

impl TestScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spin(mut self, radians_per_tick: f32) -> Self {
        self.spin = radians_per_tick;
        self
    }

    pub fn diamond_vertices() -> Vec<VertexPositionNormalColor> {
        let mut vertices = vec![
            VertexPositionNormalColor::new([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            VertexPositionNormalColor::new([-0.5, 0.0, 0.0], [0.0, 1.0, 0.0]),
            VertexPositionNormalColor::new([0.5, 0.0, 0.0], [0.0, 0.0, 1.0]),
            VertexPositionNormalColor::new([0.0, -1.0, 0.0], [0.0, 1.0, 1.0]),
            VertexPositionNormalColor::new([0.5, 0.0, 0.0], [1.0, 1.0, 0.0]),
            VertexPositionNormalColor::new([-0.5, 0.0, 0.0], [1.0, 0.0, 1.0]),
        ];
        calculate_normals(&mut vertices);
        vertices
    }
}

impl Scene for TestScene {
    fn name(&self) -> &str {
        "test"
    }

    fn ecs(&self) -> &Ecs {
        &self.ecs
    }

    fn ecs_mut(&mut self) -> &mut Ecs {
        &mut self.ecs
    }

    fn initialize(&mut self, device: &mut dyn GraphicsDevice) {
        let cam = self.ecs.create_entity();
        cam.add_component(Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)));
        cam.add_component(Camera::default());

        let diamond = self.ecs.create_entity();
        diamond.add_component(Transform::new());
        diamond.add_component(
            Model::new(
                device,
                &Self::diamond_vertices(),
                PrimitiveTopology::TriangleList,
            )
            .with_material(Material::default().with_roughness(0.4)),
        );
        if self.spin != 0.0 {
            diamond.add_component(Spin::about_z(self.spin));
        }

        // Lights shine along local +Z; turn them around to face the diamond.
        let facing_origin = Quat::from_rotation_y(PI);

        let sun = self.ecs.create_entity();
        sun.add_component(Transform::from_trs(
            Vec3::new(0.0, 0.0, 5.0),
            facing_origin,
            Vec3::ONE,
        ));
        sun.add_component(Light::from(DirectionalLight {
            proj_size: [4.0, 4.0],
            range: 10.0,
            ..DirectionalLight::new(Vec3::new(1.0, 0.95, 0.9), 2.0)
        }));

        let bulb = self.ecs.create_entity();
        bulb.add_component(Transform::from_translation(Vec3::new(0.8, 0.8, 1.0)));
        bulb.add_component(Light::from(PointLight {
            range: 4.0,
            attenuation: Vec3::new(1.0, 0.0, 1.0),
            ..PointLight::new(Vec3::new(1.0, 0.6, 0.3), 1.5)
        }));

        let mut cone = SpotLight::new(Vec3::new(0.3, 0.5, 1.0), 2.0)
            .with_range(5.0)
            .with_attenuation(Vec3::new(1.0, 0.5, 0.0));
        cone.set_penumbra_angle(0.6);
        cone.set_umbra_angle(0.3);
        let spot = self.ecs.create_entity();
        spot.add_component(Transform::from_trs(
            Vec3::new(-0.5, 0.0, 2.0),
            facing_origin,
            Vec3::ONE,
        ));
        spot.add_component(Light::from(cone));

        self.ecs
            .create_entity()
            .add_component(Light::from(AmbientLight::new(Vec3::ONE, 0.1)));

        self.ecs.add_system(SpinSystem);
        tracing::info!(
            "scene `{}` initialized with {} entities",
            self.name(),
            self.ecs.entity_count()
        );
    }
}
