use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use prism_common::Viewport;
use prism_gpu::GraphicsDevice;
use prism_render::{FrameReport, RenderSettings, Renderer};
use prism_render_wgpu::WgpuDevice;
use prism_scene::{Scene, TestScene, fit_cameras};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "prism-desktop", about = "Forward renderer demo window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render settings (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spin applied to the demo model, radians per frame
    #[arg(long, default_value = "0.01")]
    spin: f32,
}

/// Everything that exists once the window and GPU are up.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: WgpuDevice,
    renderer: Renderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, settings: RenderSettings) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Prism")
            .with_inner_size(PhysicalSize::new(settings.width, settings.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("prism_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_ctx = EguiContext::default();
        let egui_winit = egui_winit::State::new(
            egui_ctx,
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        let mut device = WgpuDevice::new(device, queue, format);
        let renderer = Renderer::new(&mut device, settings);
        Ok(Self {
            window,
            surface,
            config,
            device,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(self.device.device(), &self.config);
    }
}

/// The whole window as a viewport.
fn window_viewport(config: &wgpu::SurfaceConfiguration) -> Viewport {
    Viewport::new([0, 0], [config.width, config.height])
}

struct App {
    settings: RenderSettings,
    spin: f32,
    gpu: Option<Gpu>,
    scene: Option<TestScene>,
    load_requested: bool,
    last_report: FrameReport,
}

impl App {
    fn new(settings: RenderSettings, spin: f32) -> Self {
        Self {
            settings,
            spin,
            gpu: None,
            scene: None,
            load_requested: false,
            last_report: FrameReport::default(),
        }
    }

    fn load_scene(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if let Some(mut old) = self.scene.take() {
            old.uninitialize(&mut gpu.device);
        }
        let mut scene = TestScene::new().with_spin(self.spin);
        scene.initialize(&mut gpu.device);
        fit_cameras(scene.ecs_mut(), window_viewport(&gpu.config));
        tracing::info!("scene `{}` loaded", scene.name());
        self.scene = Some(scene);
    }

    fn redraw(&mut self) {
        if std::mem::take(&mut self.load_requested) {
            self.load_scene();
        }
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.device.device(), &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let (width, height) = (gpu.config.width, gpu.config.height);
        let scene_view = output.texture.create_view(&Default::default());
        let ui_view = output.texture.create_view(&Default::default());

        gpu.device.set_target(scene_view, width, height);
        match &mut self.scene {
            Some(scene) => {
                scene.update();
                self.last_report = gpu.renderer.render(&mut gpu.device, scene);
            }
            None => {
                gpu.device.begin_frame(self.settings.clear_color);
                gpu.device.end_frame();
            }
        }

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let ctx = gpu.egui_winit.egui_ctx().clone();
        let mut clicked = false;
        let report = &self.last_report;
        let loaded = self.scene.is_some();
        let full_output = ctx.run(raw_input, |ctx| {
            egui::Window::new("Prism")
                .resizable(false)
                .show(ctx, |ui| {
                    if ui.button("Load Scene").clicked() {
                        clicked = true;
                    }
                    if loaded {
                        ui.label(format!(
                            "frame {}: {} model(s)",
                            report.frame,
                            report.models_drawn()
                        ));
                    }
                });
        });
        self.load_requested |= clicked;
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: full_output.pixels_per_point,
        };
        let device = gpu.device.device();
        let queue = gpu.device.queue();
        for (id, delta) in &full_output.textures_delta.set {
            gpu.egui_renderer.update_texture(device, queue, *id, delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        gpu.egui_renderer
            .update_buffers(device, queue, &mut encoder, &paint_jobs, &screen);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &ui_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer.render(&mut pass, &paint_jobs, &screen);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, self.settings) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                tracing::error!("GPU initialization failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Some(gpu) = &mut self.gpu {
                    if let Some(mut scene) = self.scene.take() {
                        scene.uninitialize(&mut gpu.device);
                    }
                    gpu.renderer.release(&mut gpu.device);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                    if let Some(scene) = &mut self.scene {
                        fit_cameras(scene.ecs_mut(), window_viewport(&gpu.config));
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(gpu) = &self.gpu {
                    gpu.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let settings = match &cli.config {
        Some(path) => RenderSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => RenderSettings::default(),
    };

    tracing::info!("prism-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(settings, cli.spin);
    event_loop.run_app(&mut app)?;

    Ok(())
}
