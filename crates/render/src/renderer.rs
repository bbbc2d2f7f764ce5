use prism_gpu::GraphicsDevice;
use prism_scene::{Camera, Scene, Transform};
use serde::Serialize;

use crate::pass::{ForwardPass, ForwardStats};
use crate::settings::RenderSettings;
use crate::uniform::UniformRegistry;

/// Summary of one [`Renderer::render`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    /// One entry per camera, in store order.
    pub views: Vec<ForwardStats>,
}

impl FrameReport {
    pub fn cameras(&self) -> usize {
        self.views.len()
    }

    pub fn models_drawn(&self) -> usize {
        self.views.iter().map(|v| v.models_drawn).sum()
    }
}

/// Drives one frame: clears the target, then runs the forward pass once
/// for every `(Camera, Transform)` entity of the scene.
///
/// The renderer owns the uniform registry and the passes; it reads the
/// scene but never mutates it.
#[derive(Debug)]
pub struct Renderer {
    settings: RenderSettings,
    uniforms: UniformRegistry,
    forward: ForwardPass,
    frame: u64,
}

impl Renderer {
    pub fn new(device: &mut dyn GraphicsDevice, settings: RenderSettings) -> Self {
        let mut uniforms = UniformRegistry::new();
        let forward = ForwardPass::new(device, &mut uniforms);
        tracing::debug!(
            "renderer ready ({}x{}, forward program {})",
            settings.width,
            settings.height,
            if forward.program().is_inert() { "inert" } else { "live" }
        );
        Self {
            settings,
            uniforms,
            forward,
            frame: 0,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn uniforms(&self) -> &UniformRegistry {
        &self.uniforms
    }

    pub fn forward_pass(&self) -> &ForwardPass {
        &self.forward
    }

    pub fn render(&mut self, device: &mut dyn GraphicsDevice, scene: &dyn Scene) -> FrameReport {
        let ecs = scene.ecs();
        device.begin_frame(self.settings.clear_color);

        let mut views = Vec::new();
        for (_, (camera, transform)) in ecs.query::<(&Camera, &Transform)>() {
            views.push(self.forward.render(device, &self.uniforms, ecs, camera, transform));
        }
        if views.is_empty() {
            tracing::debug!("scene `{}` has no camera; frame left clear", scene.name());
        }

        device.end_frame();
        self.frame += 1;
        FrameReport {
            frame: self.frame,
            views,
        }
    }

    /// Destroy the program and uniform buffers.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.forward.release(device);
        self.uniforms.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::{DeviceCommand, SoftwareDevice};
    use glam::Vec3;
    use prism_ecs::Ecs;
    use prism_scene::TestScene;

    struct Cameras {
        ecs: Ecs,
    }

    impl Scene for Cameras {
        fn name(&self) -> &str {
            "cameras"
        }
        fn ecs(&self) -> &Ecs {
            &self.ecs
        }
        fn ecs_mut(&mut self) -> &mut Ecs {
            &mut self.ecs
        }
        fn initialize(&mut self, _device: &mut dyn GraphicsDevice) {
            for z in [2.0, 4.0] {
                let entity = self.ecs.create_entity();
                entity.add_component(Camera::default());
                entity.add_component(Transform::from_translation(Vec3::new(0.0, 0.0, z)));
            }
        }
    }

    #[test]
    fn renders_once_per_camera_inside_one_frame() {
        let mut device = SoftwareDevice::new(8, 8);
        let mut renderer = Renderer::new(&mut device, RenderSettings::default());
        let mut scene = Cameras { ecs: Ecs::new() };
        scene.initialize(&mut device);
        device.take_commands();

        let report = renderer.render(&mut device, &scene);
        assert_eq!(report.cameras(), 2);
        assert_eq!(report.frame, 1);

        let commands = device.commands();
        assert!(matches!(commands.first(), Some(DeviceCommand::BeginFrame { .. })));
        assert!(matches!(commands.last(), Some(DeviceCommand::EndFrame)));
        let viewports = commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::SetViewport(_)))
            .count();
        assert_eq!(viewports, 2);
    }

    #[test]
    fn scene_without_camera_only_clears() {
        let mut device = SoftwareDevice::new(4, 4);
        let settings = RenderSettings {
            clear_color: [0.2, 0.3, 0.4, 1.0],
            ..Default::default()
        };
        let mut renderer = Renderer::new(&mut device, settings);
        let scene = Cameras { ecs: Ecs::new() };
        device.take_commands();

        let report = renderer.render(&mut device, &scene);
        assert_eq!(report.cameras(), 0);
        assert_eq!(device.commands().len(), 2);
        assert_eq!(device.pixel(1, 1), Some([0.2, 0.3, 0.4, 1.0]));
    }

    #[test]
    fn test_scene_draws_its_model_with_every_light() {
        let mut device = SoftwareDevice::new(32, 32);
        let mut renderer = Renderer::new(&mut device, RenderSettings::default());
        let mut scene = TestScene::new();
        scene.initialize(&mut device);

        let report = renderer.render(&mut device, &scene);
        assert_eq!(report.models_drawn(), 1);
        let lights = report.views[0].lights;
        assert_eq!(
            (lights.directional, lights.point, lights.spot, lights.ambient),
            (1, 1, 1, 1)
        );
    }

    #[test]
    fn release_frees_every_renderer_buffer() {
        let mut device = SoftwareDevice::new(4, 4);
        let mut renderer = Renderer::new(&mut device, RenderSettings::default());
        assert_eq!(device.live_buffer_count(), 3);
        renderer.release(&mut device);
        assert_eq!(device.live_buffer_count(), 0);
        assert!(renderer.forward_pass().program().is_inert());
    }
}
