//! Headless [`GraphicsDevice`] that rasterizes on the CPU.
//!
//! Buffers live in host memory and every call is recorded as a
//! [`DeviceCommand`]. Triangle draws of a program that reads the forward
//! blocks are rasterized into an RGBA + depth framebuffer and shaded with
//! [`shading::shade`](crate::shading::shade), so a frame can be checked
//! pixel by pixel without a GPU.

use std::collections::HashMap;
use std::io::Write;

use glam::{Mat4, Vec2, Vec3, Vec4};
use prism_common::Viewport;
use prism_gpu::{
    BufferHandle, BufferKind, DeviceError, GraphicsDevice, HandleAllocator, PrimitiveTopology,
    ProgramDesc, ProgramHandle, ShaderStage, VertexLayout,
};

use crate::buffers::{CameraBuffer, LightBuffer, ModelBuffer, UniformBlock};
use crate::shading::{SurfacePoint, shade};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateProgram { program: ProgramHandle, label: String },
    DestroyProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    BindUniformBlock { program: ProgramHandle, index: u32, slot: u32 },
    CreateBuffer { buffer: BufferHandle, kind: BufferKind, size: usize },
    UploadBuffer { buffer: BufferHandle, offset: usize, len: usize },
    BindVertexBuffer(BufferHandle),
    BindUniformBuffer { slot: u32, buffer: BufferHandle },
    DestroyBuffer(BufferHandle),
    SetViewport(Viewport),
    BeginFrame { clear_color: [f32; 4] },
    Draw { topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32 },
    EndFrame,
}

#[derive(Debug)]
struct SoftProgram {
    layout: VertexLayout,
    blocks: Vec<String>,
    /// Binding point of each entry of `blocks`, once routed.
    block_slots: Vec<Option<u32>>,
}

#[derive(Debug)]
struct SoftBuffer {
    kind: BufferKind,
    bytes: Vec<u8>,
}

/// Uniform state a draw reads, decoded from the bound buffers.
struct DrawUniforms {
    camera: CameraBuffer,
    model: ModelBuffer,
    lights: LightBuffer,
}

/// A transformed vertex, ready for rasterization.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    world: Vec3,
    normal: Vec3,
    color: Vec3,
}

#[derive(Debug)]
pub struct SoftwareDevice {
    handles: HandleAllocator,
    programs: HashMap<ProgramHandle, SoftProgram>,
    buffers: HashMap<BufferHandle, SoftBuffer>,
    current_program: Option<ProgramHandle>,
    vertex_buffer: Option<BufferHandle>,
    uniform_slots: HashMap<u32, BufferHandle>,
    viewport: Viewport,
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
    commands: Vec<DeviceCommand>,
    fragments: u64,
}

impl SoftwareDevice {
    /// A device rendering into a `width` × `height` framebuffer.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let pixels = (width * height) as usize;
        Self {
            handles: HandleAllocator::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            current_program: None,
            vertex_buffer: None,
            uniform_slots: HashMap::new(),
            viewport: Viewport::new([0, 0], [width, height]),
            width,
            height,
            color: vec![[0.0, 0.0, 0.0, 1.0]; pixels],
            depth: vec![1.0; pixels],
            commands: Vec::new(),
            fragments: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Every call since creation (or the last [`take_commands`](Self::take_commands)).
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Current contents of a live buffer.
    pub fn buffer_bytes(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.bytes.as_slice())
    }

    pub fn buffer_kind(&self, buffer: BufferHandle) -> Option<BufferKind> {
        self.buffers.get(&buffer).map(|b| b.kind)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer currently attached to uniform binding point `slot`.
    pub fn uniform_buffer_at(&self, slot: u32) -> Option<BufferHandle> {
        self.uniform_slots.get(&slot).copied()
    }

    /// Fragments written since creation.
    pub fn fragments_shaded(&self) -> u64 {
        self.fragments
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.color.get((y * self.width + x) as usize).copied()
    }

    /// Pixel covering the normalized device coordinate `ndc` under the
    /// current viewport.
    pub fn ndc_to_pixel(&self, ndc: Vec2) -> Option<(u32, u32)> {
        let s = self.to_screen(ndc);
        if s.x < 0.0 || s.y < 0.0 {
            return None;
        }
        let (x, y) = (s.x as u32, s.y as u32);
        (x < self.width && y < self.height).then_some((x, y))
    }

    /// The framebuffer as tightly packed 8-bit RGBA rows, top row first.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.color
            .iter()
            .flat_map(|px| px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }

    /// Write the framebuffer as a binary PPM (P6) image.
    pub fn write_ppm(&self, out: &mut impl Write) -> std::io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let rgb: Vec<u8> = self
            .to_rgba8()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        out.write_all(&rgb)
    }

    fn to_screen(&self, ndc: Vec2) -> Vec2 {
        let [x0, y0] = self.viewport.top_left;
        Vec2::new(
            x0 as f32 + (ndc.x * 0.5 + 0.5) * self.viewport.width() as f32,
            y0 as f32 + (0.5 - ndc.y * 0.5) * self.viewport.height() as f32,
        )
    }

    fn block_bytes(&self, program: &SoftProgram, block: UniformBlock) -> Option<&[u8]> {
        let index = program.blocks.iter().position(|b| b == block.name())?;
        let slot = program.block_slots.get(index).copied().flatten()?;
        let buffer = self.uniform_slots.get(&slot)?;
        self.buffer_bytes(*buffer)
    }

    fn draw_uniforms(&self, program: &SoftProgram) -> Option<DrawUniforms> {
        let camera = bytemuck::try_pod_read_unaligned::<CameraBuffer>(
            self.block_bytes(program, UniformBlock::Camera)?,
        )
        .ok()?;
        let model = bytemuck::try_pod_read_unaligned::<ModelBuffer>(
            self.block_bytes(program, UniformBlock::Model)?,
        )
        .ok()?;
        let lights = self
            .block_bytes(program, UniformBlock::Lights)
            .and_then(|bytes| bytemuck::try_pod_read_unaligned::<LightBuffer>(bytes).ok())
            .unwrap_or_default();
        Some(DrawUniforms {
            camera,
            model,
            lights,
        })
    }

    fn fetch_vertex(
        layout: &VertexLayout,
        data: &[u8],
        index: usize,
        uniforms: &DrawUniforms,
        world_to_projection: &Mat4,
    ) -> Option<ClipVertex> {
        let position = Vec4::from(layout.read(data, index, "position")?).truncate();
        let normal = layout
            .read(data, index, "normal")
            .map(|n| Vec4::from(n).truncate())
            .unwrap_or(Vec3::Z);
        let color = layout
            .read(data, index, "color")
            .map(|c| Vec4::from(c).truncate())
            .unwrap_or(Vec3::ONE);

        let world_m = Mat4::from_cols_array_2d(&uniforms.model.world);
        let normal_m = Mat4::from_cols_array_2d(&uniforms.model.world_inv_transpose);
        let world = world_m.transform_point3(position);
        Some(ClipVertex {
            clip: *world_to_projection * world.extend(1.0),
            world,
            normal: normal_m.transform_vector3(normal),
            color,
        })
    }

    fn rasterize(&mut self, tri: [ClipVertex; 3], uniforms: &DrawUniforms) {
        if tri.iter().any(|v| v.clip.w <= f32::EPSILON) {
            tracing::trace!("triangle crosses the eye plane; skipped");
            return;
        }
        let ndc = tri.map(|v| v.clip.truncate() / v.clip.w);
        let screen = ndc.map(|p| self.to_screen(p.truncate()));
        let area = edge(screen[0], screen[1], screen[2]);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let [vx, vy] = self.viewport.top_left;
        let x_end = (vx + self.viewport.width()).min(self.width);
        let y_end = (vy + self.viewport.height()).min(self.height);
        let min = screen.iter().fold(Vec2::splat(f32::MAX), |m, p| m.min(*p));
        let max = screen.iter().fold(Vec2::splat(f32::MIN), |m, p| m.max(*p));
        let x_start = (min.x.floor().max(vx as f32)) as u32;
        let y_start = (min.y.floor().max(vy as f32)) as u32;
        let x_stop = (max.x.ceil().max(0.0) as u32).min(x_end);
        let y_stop = (max.y.ceil().max(0.0) as u32).min(y_end);

        let eye = uniforms.camera.eye();
        let material = uniforms.model.material;
        let base = Vec4::from(material.base_color).truncate();

        for y in y_start..y_stop {
            for x in x_start..x_stop {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(screen[1], screen[2], p) / area;
                let b1 = edge(screen[2], screen[0], p) / area;
                let b2 = 1.0 - b0 - b1;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }
                let z = b0 * ndc[0].z + b1 * ndc[1].z + b2 * ndc[2].z;
                let index = (y * self.width + x) as usize;
                if !(0.0..=1.0).contains(&z) || z >= self.depth[index] {
                    continue;
                }

                // Perspective-correct weights.
                let w = Vec3::new(
                    b0 / tri[0].clip.w,
                    b1 / tri[1].clip.w,
                    b2 / tri[2].clip.w,
                );
                let w = w / (w.x + w.y + w.z);
                let lerp = |f: fn(&ClipVertex) -> Vec3| {
                    f(&tri[0]) * w.x + f(&tri[1]) * w.y + f(&tri[2]) * w.z
                };

                let surface = SurfacePoint {
                    position: lerp(|v| v.world),
                    normal: lerp(|v| v.normal).normalize_or_zero(),
                    albedo: base * lerp(|v| v.color),
                    roughness: material.roughness,
                    metalness: material.metalness,
                };
                let rgb = shade(&surface, eye, &uniforms.lights);
                self.color[index] = [rgb.x, rgb.y, rgb.z, 1.0];
                self.depth[index] = z;
                self.fragments += 1;
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl GraphicsDevice for SoftwareDevice {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, DeviceError> {
        for (stage, source) in [
            (ShaderStage::Vertex, desc.vertex_source),
            (ShaderStage::Fragment, desc.fragment_source),
        ] {
            if source.trim().is_empty() {
                return Err(DeviceError::ShaderCompile {
                    label: desc.label.to_owned(),
                    stage,
                    log: "empty source".into(),
                });
            }
        }
        let program = self.handles.program();
        self.programs.insert(
            program,
            SoftProgram {
                layout: *desc.vertex_layout,
                blocks: desc.uniform_blocks.iter().map(|b| (*b).to_owned()).collect(),
                block_slots: vec![None; desc.uniform_blocks.len()],
            },
        );
        self.commands.push(DeviceCommand::CreateProgram {
            program,
            label: desc.label.to_owned(),
        });
        Ok(program)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            tracing::warn!("destroy of unknown program {program:?}");
            return;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.commands.push(DeviceCommand::DestroyProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if !self.programs.contains_key(&program) {
            tracing::warn!("use of unknown program {program:?}");
            self.current_program = None;
            return;
        }
        self.current_program = Some(program);
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn uniform_block_index(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let program = self.programs.get(&program)?;
        program
            .blocks
            .iter()
            .position(|b| b == name)
            .map(|i| i as u32)
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block_index: u32, slot: u32) {
        let Some(p) = self.programs.get_mut(&program) else {
            tracing::warn!("uniform block binding on unknown program {program:?}");
            return;
        };
        let Some(entry) = p.block_slots.get_mut(block_index as usize) else {
            tracing::warn!("program {program:?} has no uniform block {block_index}");
            return;
        };
        *entry = Some(slot);
        self.commands.push(DeviceCommand::BindUniformBlock {
            program,
            index: block_index,
            slot,
        });
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferHandle, DeviceError> {
        let buffer = self.handles.buffer();
        self.buffers.insert(
            buffer,
            SoftBuffer {
                kind,
                bytes: vec![0; size],
            },
        );
        self.commands
            .push(DeviceCommand::CreateBuffer { buffer, kind, size });
        Ok(buffer)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownBuffer(buffer))?;
        let size = target.bytes.len();
        let range = offset
            .checked_add(data.len())
            .filter(|end| *end <= size)
            .map(|end| offset..end)
            .ok_or(DeviceError::UploadOutOfRange {
                offset,
                len: data.len(),
                size,
            })?;
        target.bytes[range].copy_from_slice(data);
        self.commands.push(DeviceCommand::UploadBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        if !self.buffers.contains_key(&buffer) {
            tracing::warn!("bind of unknown vertex buffer {buffer:?}");
            return;
        }
        self.vertex_buffer = Some(buffer);
        self.commands.push(DeviceCommand::BindVertexBuffer(buffer));
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        if !self.buffers.contains_key(&buffer) {
            tracing::warn!("bind of unknown uniform buffer {buffer:?}");
            return;
        }
        self.uniform_slots.insert(slot, buffer);
        self.commands
            .push(DeviceCommand::BindUniformBuffer { slot, buffer });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            tracing::warn!("destroy of unknown buffer {buffer:?}");
            return;
        }
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        self.uniform_slots.retain(|_, b| *b != buffer);
        self.commands.push(DeviceCommand::DestroyBuffer(buffer));
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = *viewport;
        self.commands.push(DeviceCommand::SetViewport(*viewport));
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        self.color.fill(clear_color);
        self.depth.fill(1.0);
        self.commands.push(DeviceCommand::BeginFrame { clear_color });
    }

    fn draw(&mut self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32) {
        self.commands.push(DeviceCommand::Draw {
            topology,
            first_vertex,
            vertex_count,
        });

        let Some(program) = self.current_program.and_then(|p| self.programs.get(&p)) else {
            tracing::trace!("draw without a usable program dropped");
            return;
        };
        let Some(uniforms) = self.draw_uniforms(program) else {
            tracing::warn!("draw skipped: camera or model block not bound");
            return;
        };
        let layout = program.layout;
        let Some(data) = self.vertex_buffer.and_then(|b| self.buffer_bytes(b)) else {
            tracing::warn!("draw skipped: no vertex buffer bound");
            return;
        };

        let world_to_projection = uniforms.camera.world_to_projection();
        let first = first_vertex as usize;
        let vertices: Vec<ClipVertex> = (first..first + vertex_count as usize)
            .map_while(|i| {
                Self::fetch_vertex(&layout, data, i, &uniforms, &world_to_projection)
            })
            .collect();

        let triangles: Vec<[ClipVertex; 3]> = match topology {
            PrimitiveTopology::TriangleList => vertices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            PrimitiveTopology::TriangleStrip => vertices
                .windows(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            PrimitiveTopology::PointList
            | PrimitiveTopology::LineList
            | PrimitiveTopology::LineStrip => {
                tracing::trace!("{topology:?} draws are recorded but not rasterized");
                Vec::new()
            }
        };
        for tri in triangles {
            self.rasterize(tri, &uniforms);
        }
    }

    fn end_frame(&mut self) {
        self.commands.push(DeviceCommand::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_gpu::{Vertex, VertexPositionColor, vertex_bytes};

    #[test]
    fn empty_shader_source_fails_to_compile() {
        let mut device = SoftwareDevice::new(2, 2);
        let desc = ProgramDesc {
            vertex_source: "  ",
            ..crate::shaders::forward_program_desc()
        };
        let err = device.create_program(&desc).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn upload_past_the_end_is_rejected() {
        let mut device = SoftwareDevice::new(2, 2);
        let buffer = device.create_buffer(BufferKind::Uniform, 8).unwrap();
        assert!(device.upload_buffer(buffer, 4, &[1; 4]).is_ok());
        assert_eq!(
            device.upload_buffer(buffer, 6, &[1; 4]),
            Err(DeviceError::UploadOutOfRange {
                offset: 6,
                len: 4,
                size: 8
            })
        );
        assert_eq!(device.buffer_bytes(buffer), Some(&[0, 0, 0, 0, 1, 1, 1, 1][..]));
    }

    #[test]
    fn operations_on_unknown_handles_are_no_ops() {
        let mut device = SoftwareDevice::new(2, 2);
        device.bind_vertex_buffer(BufferHandle(99));
        device.use_program(ProgramHandle(99));
        device.destroy_buffer(BufferHandle(99));
        device.draw(PrimitiveTopology::TriangleList, 0, 3);
        assert_eq!(
            device.commands(),
            &[DeviceCommand::Draw {
                topology: PrimitiveTopology::TriangleList,
                first_vertex: 0,
                vertex_count: 3
            }]
        );
        assert_eq!(device.fragments_shaded(), 0);
    }

    #[test]
    fn begin_frame_clears_to_the_requested_color() {
        let mut device = SoftwareDevice::new(3, 2);
        device.begin_frame([0.25, 0.5, 0.75, 1.0]);
        assert_eq!(device.pixel(2, 1), Some([0.25, 0.5, 0.75, 1.0]));
        assert_eq!(device.pixel(3, 0), None);
    }

    #[test]
    fn ppm_has_header_and_rgb_payload() {
        let mut device = SoftwareDevice::new(2, 2);
        device.begin_frame([1.0, 0.0, 0.0, 1.0]);
        let mut out = Vec::new();
        device.write_ppm(&mut out).unwrap();
        let header = b"P6\n2 2\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(&out[header.len()..header.len() + 3], &[255, 0, 0]);
        assert_eq!(out.len(), header.len() + 2 * 2 * 3);
    }

    #[test]
    fn ndc_centre_maps_to_viewport_centre() {
        let mut device = SoftwareDevice::new(64, 64);
        assert_eq!(device.ndc_to_pixel(Vec2::ZERO), Some((32, 32)));
        device.set_viewport(&Viewport::new([32, 0], [32, 32]));
        assert_eq!(device.ndc_to_pixel(Vec2::ZERO), Some((48, 16)));
        assert_eq!(device.ndc_to_pixel(Vec2::new(-1.0, 1.0)), Some((32, 0)));
    }

    #[test]
    fn draw_reads_blocks_through_routed_slots() {
        // A position/color program with identity camera and model blocks,
        // drawing one triangle covering the lower-left half of clip space.
        let mut device = SoftwareDevice::new(8, 8);
        let desc = ProgramDesc {
            label: "flat",
            vertex_source: "vs",
            fragment_source: "fs",
            vertex_layout: &VertexPositionColor::LAYOUT,
            uniform_blocks: &["Camera", "Model", "Lights"],
        };
        let program = device.create_program(&desc).unwrap();
        for (index, block) in UniformBlock::ALL.iter().enumerate() {
            device.bind_uniform_block(program, index as u32, block.slot() + 4);
        }

        let identity = Mat4::IDENTITY.to_cols_array_2d();
        let camera = CameraBuffer {
            camera_to_world: identity,
            world_to_camera: identity,
            camera_to_projection: identity,
            projection_to_camera: identity,
        };
        let model = ModelBuffer::new(
            &prism_scene::Transform::new(),
            &prism_scene::Material::default(),
        );
        let mut lights = LightBuffer::default();
        lights.add_ambient(Vec3::splat(2.0 * std::f32::consts::PI));

        let blocks: [&[u8]; 3] = [
            bytemuck::bytes_of(&camera),
            bytemuck::bytes_of(&model),
            lights.as_bytes(),
        ];
        for (block, bytes) in UniformBlock::ALL.iter().zip(blocks) {
            let buffer = device
                .create_buffer_init(BufferKind::Uniform, bytes)
                .unwrap();
            device.bind_uniform_buffer(block.slot() + 4, buffer);
        }

        let verts = [
            VertexPositionColor {
                position: [-1.0, -1.0, 0.5],
                color: [1.0, 0.0, 0.0],
            },
            VertexPositionColor {
                position: [1.0, -1.0, 0.5],
                color: [1.0, 0.0, 0.0],
            },
            VertexPositionColor {
                position: [-1.0, 1.0, 0.5],
                color: [1.0, 0.0, 0.0],
            },
        ];
        let vb = device
            .create_buffer_init(BufferKind::Vertex, vertex_bytes(&verts))
            .unwrap();

        device.begin_frame([0.0, 0.0, 0.0, 1.0]);
        device.use_program(program);
        device.bind_vertex_buffer(vb);
        device.draw(PrimitiveTopology::TriangleList, 0, 3);
        device.end_frame();

        // Ambient of 2π on a red albedo saturates to pure red.
        assert_eq!(device.pixel(0, 7), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(device.pixel(7, 0), Some([0.0, 0.0, 0.0, 1.0]));
        assert!(device.fragments_shaded() > 0);
    }
}
