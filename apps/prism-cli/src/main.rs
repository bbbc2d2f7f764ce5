use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use prism_render::{
    DeviceCommand, FrameReport, LightBuffer, RenderSettings, Renderer, SoftwareDevice,
    UniformBlock,
};
use prism_scene::{Scene, TestScene, fit_cameras};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prism-cli", about = "Render the demo scene headlessly and inspect the frame")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render settings (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and uniform block sizes
    Info,
    /// Render frames of the demo scene with the software device
    Trace {
        /// Number of frames to render
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// Spin applied to the demo model, radians per frame
        #[arg(long, default_value = "0.0")]
        spin: f32,
        /// Print the last frame as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Write the last frame as a PPM image
        #[arg(long)]
        ppm: Option<PathBuf>,
    },
}

fn command_name(command: &DeviceCommand) -> &'static str {
    match command {
        DeviceCommand::CreateProgram { .. } => "create_program",
        DeviceCommand::DestroyProgram(_) => "destroy_program",
        DeviceCommand::UseProgram(_) => "use_program",
        DeviceCommand::BindUniformBlock { .. } => "bind_uniform_block",
        DeviceCommand::CreateBuffer { .. } => "create_buffer",
        DeviceCommand::UploadBuffer { .. } => "upload_buffer",
        DeviceCommand::BindVertexBuffer(_) => "bind_vertex_buffer",
        DeviceCommand::BindUniformBuffer { .. } => "bind_uniform_buffer",
        DeviceCommand::DestroyBuffer(_) => "destroy_buffer",
        DeviceCommand::SetViewport(_) => "set_viewport",
        DeviceCommand::BeginFrame { .. } => "begin_frame",
        DeviceCommand::Draw { .. } => "draw",
        DeviceCommand::EndFrame => "end_frame",
    }
}

fn light_list(lights: &LightBuffer) -> serde_json::Value {
    json!({
        "directional": lights.directional_lights(),
        "point": lights.point_lights(),
        "spot": lights.spot_lights(),
        "ambient": lights.ambient().to_array(),
    })
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<RenderSettings> {
    match path {
        Some(path) => RenderSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(RenderSettings::default()),
    }
}

fn trace(
    settings: RenderSettings,
    frames: u32,
    spin: f32,
    json: bool,
    ppm: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut device = SoftwareDevice::new(settings.width, settings.height);
    let mut renderer = Renderer::new(&mut device, settings);
    let mut scene = TestScene::new().with_spin(spin);
    scene.initialize(&mut device);
    fit_cameras(scene.ecs_mut(), settings.viewport());

    let mut report = FrameReport::default();
    let mut commands = Vec::new();
    for _ in 0..frames.max(1) {
        device.take_commands();
        scene.update();
        report = renderer.render(&mut device, &scene);
        commands = device.take_commands();
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for command in &commands {
        *counts.entry(command_name(command)).or_default() += 1;
    }
    let lights = renderer.forward_pass().light_pass().lights();
    let centre = device.pixel(device.width() / 2, device.height() / 2);

    if json {
        let out = json!({
            "report": report,
            "commands": counts,
            "lights": light_list(lights),
            "centre_pixel": centre,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "frame {}: {} camera(s), {} model(s) drawn",
            report.frame,
            report.cameras(),
            report.models_drawn()
        );
        for (name, count) in &counts {
            println!("  {name:<20} {count}");
        }
        println!(
            "lights: {} directional, {} point, {} spot, ambient {:?}",
            lights.directional_count(),
            lights.point_count(),
            lights.spot_count(),
            lights.ambient().to_array()
        );
        println!("centre pixel: {centre:?}");
    }

    if let Some(path) = ppm {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        device.write_ppm(&mut BufWriter::new(file))?;
        tracing::info!("wrote {}", path.display());
    }

    scene.uninitialize(&mut device);
    renderer.release(&mut device);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("prism-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", prism_common::crate_info());
            println!("gpu: {}", prism_gpu::crate_info());
            println!("ecs: {}", prism_ecs::crate_info());
            println!("scene: {}", prism_scene::crate_info());
            println!("render: {}", prism_render::crate_info());
            for block in UniformBlock::ALL {
                println!(
                    "  block {:<7} slot {} size {} bytes",
                    block.name(),
                    block.slot(),
                    block.size()
                );
            }
            println!("target: {}x{}", settings.width, settings.height);
        }
        Commands::Trace {
            frames,
            spin,
            json,
            ppm,
        } => trace(settings, frames, spin, json, ppm)?,
    }

    Ok(())
}
