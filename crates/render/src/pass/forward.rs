use prism_ecs::Ecs;
use prism_gpu::GraphicsDevice;
use prism_scene::{Camera, Model, Transform};
use serde::Serialize;

use crate::buffers::{CameraBuffer, ModelBuffer, UniformBlock};
use crate::pass::light::{LightPass, LightStats};
use crate::program::Program;
use crate::shaders;
use crate::uniform::UniformRegistry;

/// What one forward render of one camera did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwardStats {
    pub models_drawn: usize,
    /// Models whose vertex layout the program cannot read.
    pub models_skipped: usize,
    pub lights: LightStats,
}

/// Shades every `(Model, Transform)` entity in one pass, lit by every light
/// the [`LightPass`] collected.
#[derive(Debug)]
pub struct ForwardPass {
    program: Program,
    light_pass: LightPass,
}

impl ForwardPass {
    /// Build the forward program and register the blocks it reads.
    pub fn new(device: &mut dyn GraphicsDevice, registry: &mut UniformRegistry) -> Self {
        for block in UniformBlock::ALL {
            registry.add(device, block);
        }
        Self {
            program: Program::new(device, &shaders::forward_program_desc()),
            light_pass: LightPass::new(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn light_pass(&self) -> &LightPass {
        &self.light_pass
    }

    /// Render `ecs` as seen by `camera` placed at `camera_transform`.
    ///
    /// Per-model uploads happen between draws, so every draw observes its
    /// own `Model` block.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &UniformRegistry,
        ecs: &Ecs,
        camera: &Camera,
        camera_transform: &Transform,
    ) -> ForwardStats {
        self.program.bind(device);
        device.set_viewport(&camera.viewport);

        let camera_block = CameraBuffer::new(camera, camera_transform);
        registry.update(device, UniformBlock::Camera, bytemuck::bytes_of(&camera_block));
        registry.bind_all(device);

        let lights = self.light_pass.render(device, registry, ecs);

        let mut models_drawn = 0;
        let mut models_skipped = 0;
        for (id, (model, transform)) in ecs.query::<(&Model, &Transform)>() {
            if model.is_inert() {
                continue;
            }
            if model.layout() != self.program.vertex_layout() {
                tracing::warn!(
                    "model on {id} has a {}-byte vertex layout, program `{}` reads {} bytes; skipped",
                    model.layout().stride,
                    self.program.label(),
                    self.program.vertex_layout().stride
                );
                models_skipped += 1;
                continue;
            }
            model.bind(device);
            let block = ModelBuffer::new(transform, &model.material);
            registry.update(device, UniformBlock::Model, bytemuck::bytes_of(&block));
            model.draw(device);
            models_drawn += 1;
        }

        ForwardStats {
            models_drawn,
            models_skipped,
            lights,
        }
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::{DeviceCommand, SoftwareDevice};
    use glam::Vec3;
    use prism_gpu::{BufferHandle, PrimitiveTopology, VertexPositionColor};
    use prism_scene::{Material, TestScene};

    fn spawn_model(device: &mut SoftwareDevice, ecs: &mut Ecs, x: f32) {
        let model = Model::new(device, &TestScene::diamond_vertices(), PrimitiveTopology::TriangleList);
        let entity = ecs.create_entity();
        entity.add_component(model.with_material(Material::default().with_roughness(x.abs())));
        entity.add_component(Transform::from_translation(Vec3::new(x, 0.0, 0.0)));
    }

    #[test]
    fn each_draw_follows_its_own_model_upload() {
        let mut device = SoftwareDevice::new(16, 16);
        let mut registry = UniformRegistry::new();
        let mut pass = ForwardPass::new(&mut device, &mut registry);
        let mut ecs = Ecs::new();
        spawn_model(&mut device, &mut ecs, -0.5);
        spawn_model(&mut device, &mut ecs, 0.5);
        device.take_commands();

        let stats = pass.render(
            &mut device,
            &registry,
            &ecs,
            &Camera::default(),
            &Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)),
        );
        assert_eq!(stats.models_drawn, 2);

        let model_buffer = registry.get(UniformBlock::Model).unwrap();
        let sequence: Vec<&str> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::UploadBuffer { buffer, .. } if *buffer == model_buffer => {
                    Some("model")
                }
                DeviceCommand::Draw { .. } => Some("draw"),
                _ => None,
            })
            .collect();
        assert_eq!(sequence, ["model", "draw", "model", "draw"]);
    }

    #[test]
    fn frame_state_is_set_before_any_draw() {
        let mut device = SoftwareDevice::new(16, 16);
        let mut registry = UniformRegistry::new();
        let mut pass = ForwardPass::new(&mut device, &mut registry);
        let mut ecs = Ecs::new();
        spawn_model(&mut device, &mut ecs, 0.0);
        device.take_commands();

        pass.render(
            &mut device,
            &registry,
            &ecs,
            &Camera::default(),
            &Transform::from_translation(Vec3::Z),
        );
        let commands = device.commands();
        let first_draw = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::Draw { .. }))
            .unwrap();
        let before = &commands[..first_draw];
        assert!(matches!(before[0], DeviceCommand::UseProgram(_)));
        assert!(matches!(before[1], DeviceCommand::SetViewport(_)));
        let bound: Vec<u32> = before
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindUniformBuffer { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![0, 1, 2]);
        let lights = registry.get(UniformBlock::Lights).unwrap();
        assert!(before.iter().any(
            |c| matches!(c, DeviceCommand::UploadBuffer { buffer, .. } if *buffer == lights)
        ));
    }

    #[test]
    fn models_with_a_foreign_vertex_layout_are_not_drawn() {
        let mut device = SoftwareDevice::new(16, 16);
        let mut registry = UniformRegistry::new();
        let mut pass = ForwardPass::new(&mut device, &mut registry);
        let mut ecs = Ecs::new();
        let flat = [[-1.0, -1.0], [1.0, -1.0], [0.0, 1.0]].map(|[x, y]| VertexPositionColor {
            position: [x, y, 0.0],
            color: [1.0; 3],
        });
        let entity = ecs.create_entity();
        entity.add_component(Model::new(&mut device, &flat, PrimitiveTopology::TriangleList));
        entity.add_component(Transform::new());
        spawn_model(&mut device, &mut ecs, 0.0);
        device.take_commands();

        let stats = pass.render(
            &mut device,
            &registry,
            &ecs,
            &Camera::default(),
            &Transform::from_translation(Vec3::Z * 3.0),
        );
        assert_eq!(stats.models_drawn, 1);
        assert_eq!(stats.models_skipped, 1);
        let draws = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn inert_models_are_skipped() {
        let mut device = SoftwareDevice::new(16, 16);
        let mut registry = UniformRegistry::new();
        let mut pass = ForwardPass::new(&mut device, &mut registry);
        let mut ecs = Ecs::new();
        spawn_model(&mut device, &mut ecs, 0.0);
        let id = ecs.entities().next().unwrap().id();
        ecs.get_entity_mut(id)
            .unwrap()
            .get_component_mut::<Model>()
            .unwrap()
            .release(&mut device);

        let stats = pass.render(
            &mut device,
            &registry,
            &ecs,
            &Camera::default(),
            &Transform::new(),
        );
        assert_eq!(stats.models_drawn, 0);
        assert!(
            !device
                .commands()
                .iter()
                .any(|c| matches!(c, DeviceCommand::BindVertexBuffer(BufferHandle(_))))
        );
    }
}
