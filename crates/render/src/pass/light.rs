use prism_ecs::Ecs;
use prism_gpu::GraphicsDevice;
use prism_scene::{Light, Transform};
use serde::Serialize;

use crate::buffers::{
    DirectionalLightEntry, LightBuffer, PointLightEntry, SpotLightEntry, UniformBlock,
};
use crate::uniform::UniformRegistry;

/// Per-frame light counts, including lights dropped for lack of slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LightStats {
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
    pub ambient: usize,
    pub dropped: usize,
}

/// Gathers every placed `(Light, Transform)` entity into the `Lights` block,
/// plus every ambient light whether placed or not.
#[derive(Debug, Default)]
pub struct LightPass {
    lights: LightBuffer,
}

impl LightPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// The block as last collected.
    pub fn lights(&self) -> &LightBuffer {
        &self.lights
    }

    /// Rebuild the block from `ecs`, in store order.
    ///
    /// Lights past a type's capacity are dropped. Ambient lights have no
    /// slots and need no `Transform`; their radiance is summed.
    pub fn collect(&mut self, ecs: &Ecs) -> LightStats {
        self.lights.clear();
        let mut stats = LightStats::default();
        let lights = &mut self.lights;
        ecs.for_each::<(&Light, &Transform)>(|id, (light, transform)| {
            let stored = match light {
                Light::Directional(l) => {
                    stats.directional += 1;
                    lights.push_directional(DirectionalLightEntry::new(l, transform))
                }
                Light::Point(l) => {
                    stats.point += 1;
                    lights.push_point(PointLightEntry::new(l, transform))
                }
                Light::Spot(l) => {
                    stats.spot += 1;
                    lights.push_spot(SpotLightEntry::new(l, transform))
                }
                Light::Ambient(_) => true,
            };
            if !stored {
                stats.dropped += 1;
                tracing::debug!("{:?} light on {id} dropped: no free slot", light.kind());
            }
        });
        ecs.for_each::<&Light>(|_, light| {
            if let Light::Ambient(_) = light {
                stats.ambient += 1;
                lights.add_ambient(light.radiance());
            }
        });
        stats
    }

    pub fn upload(&self, device: &mut dyn GraphicsDevice, registry: &UniformRegistry) {
        registry.update(device, UniformBlock::Lights, self.lights.as_bytes());
    }

    /// Collect, then upload.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &UniformRegistry,
        ecs: &Ecs,
    ) -> LightStats {
        let stats = self.collect(ecs);
        self.upload(device, registry);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::MAX_DIRECTIONAL_LIGHTS;
    use crate::software::SoftwareDevice;
    use glam::Vec3;
    use prism_scene::{AmbientLight, DirectionalLight, PointLight, SpotLight};

    fn spawn(ecs: &mut Ecs, light: impl Into<Light>, at: Vec3) {
        let entity = ecs.create_entity();
        entity.add_component(light.into());
        entity.add_component(Transform::from_translation(at));
    }

    #[test]
    fn overflowing_lights_are_dropped_in_store_order() {
        let mut ecs = Ecs::new();
        for i in 0..9 {
            spawn(
                &mut ecs,
                DirectionalLight::new(Vec3::ONE, i as f32 + 1.0),
                Vec3::ZERO,
            );
        }
        let mut pass = LightPass::new();
        let stats = pass.collect(&ecs);

        assert_eq!(stats.directional, 9);
        assert_eq!(stats.dropped, 1);
        assert_eq!(pass.lights().directional_count(), MAX_DIRECTIONAL_LIGHTS);
        let last = pass.lights().directional_lights()[MAX_DIRECTIONAL_LIGHTS - 1];
        assert_eq!(last.intensity, [8.0; 3]);
    }

    #[test]
    fn every_kind_lands_in_its_own_array() {
        let mut ecs = Ecs::new();
        spawn(&mut ecs, PointLight::new(Vec3::X, 1.0), Vec3::new(1.0, 2.0, 3.0));
        spawn(&mut ecs, SpotLight::new(Vec3::Y, 1.0), Vec3::ZERO);
        spawn(&mut ecs, AmbientLight::new(Vec3::ONE, 0.25), Vec3::ZERO);
        spawn(&mut ecs, AmbientLight::new(Vec3::ONE, 0.5), Vec3::ZERO);

        let mut pass = LightPass::new();
        let stats = pass.collect(&ecs);
        assert_eq!(stats.point, 1);
        assert_eq!(stats.spot, 1);
        assert_eq!(stats.ambient, 2);
        assert_eq!(pass.lights().directional_count(), 0);
        assert_eq!(pass.lights().point_lights()[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(pass.lights().ambient(), Vec3::splat(0.75));
    }

    #[test]
    fn lights_without_transform_are_ignored() {
        let mut ecs = Ecs::new();
        ecs.create_entity()
            .add_component(Light::from(PointLight::new(Vec3::ONE, 1.0)));
        let mut pass = LightPass::new();
        assert_eq!(pass.collect(&ecs), LightStats::default());
    }

    #[test]
    fn ambient_lights_need_no_transform() {
        let mut ecs = Ecs::new();
        ecs.create_entity()
            .add_component(Light::from(AmbientLight::new(Vec3::ONE, 0.1)));
        spawn(&mut ecs, AmbientLight::new(Vec3::X, 0.2), Vec3::ZERO);

        let mut pass = LightPass::new();
        let stats = pass.collect(&ecs);
        assert_eq!(stats.ambient, 2);
        assert!(
            pass.lights()
                .ambient()
                .abs_diff_eq(Vec3::new(0.3, 0.1, 0.1), 1e-6)
        );
    }

    #[test]
    fn collect_starts_from_an_empty_block() {
        let mut ecs = Ecs::new();
        spawn(&mut ecs, PointLight::new(Vec3::ONE, 1.0), Vec3::ZERO);
        let mut pass = LightPass::new();
        pass.collect(&ecs);
        pass.collect(&ecs);
        assert_eq!(pass.lights().point_count(), 1);
    }

    #[test]
    fn render_uploads_the_block() {
        let mut device = SoftwareDevice::new(4, 4);
        let mut registry = UniformRegistry::new();
        registry.add(&mut device, UniformBlock::Lights);
        let mut ecs = Ecs::new();
        spawn(&mut ecs, AmbientLight::new(Vec3::ONE, 1.0), Vec3::ZERO);

        let mut pass = LightPass::new();
        pass.render(&mut device, &registry, &ecs);
        let buffer = registry.get(UniformBlock::Lights).unwrap();
        assert_eq!(device.buffer_bytes(buffer), Some(pass.lights().as_bytes()));
    }
}
