use std::collections::HashMap;
use std::num::NonZeroU64;

use prism_common::Viewport;
use prism_gpu::{
    BufferHandle, BufferKind, DeviceError, GraphicsDevice, HandleAllocator, PrimitiveTopology,
    ProgramDesc, ProgramHandle, ShaderStage,
};
use prism_render::UniformBlock;
use prism_render::shaders::{FRAGMENT_ENTRY, VERTEX_ENTRY};

use crate::arena::UniformArena;
use crate::convert;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Uniform binding points; WGSL `@binding(n)` in group 0 is slot `n`.
const UNIFORM_SLOTS: usize = UniformBlock::ALL.len();

struct GpuProgram {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    stride: u64,
    attributes: Vec<wgpu::VertexAttribute>,
    blocks: Vec<String>,
    block_slots: Vec<Option<u32>>,
    /// `None` marks a topology whose pipeline failed to build.
    pipelines: HashMap<PrimitiveTopology, Option<wgpu::RenderPipeline>>,
}

impl GpuProgram {
    fn reads_slot(&self, slot: usize) -> bool {
        self.block_slots.iter().any(|s| *s == Some(slot as u32))
    }
}

struct GpuBuffer {
    kind: BufferKind,
    shadow: Vec<u8>,
    vertex: Option<wgpu::Buffer>,
}

struct RecordedDraw {
    program: ProgramHandle,
    topology: PrimitiveTopology,
    vertex_buffer: BufferHandle,
    first_vertex: u32,
    vertex_count: u32,
    offsets: [u32; UNIFORM_SLOTS],
    viewport: Viewport,
}

struct Target {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct ArenaBuffer {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: usize,
}

/// [`GraphicsDevice`] over wgpu.
///
/// Calls between `begin_frame` and `end_frame` are recorded; `end_frame`
/// replays them into one render pass on the target set with
/// [`set_target`](Self::set_target) and submits it. Uniform blocks are
/// snapshotted per draw into a dynamic-offset arena, so a block rewritten
/// between two draws reaches each draw with the contents it had when the
/// draw was issued.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    handles: HandleAllocator,
    programs: HashMap<ProgramHandle, GpuProgram>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    arena: UniformArena,
    arena_buffer: Option<ArenaBuffer>,
    depth: Option<Target>,
    target: Option<Target>,
    current_program: Option<ProgramHandle>,
    vertex_buffer: Option<BufferHandle>,
    uniform_slots: [Option<BufferHandle>; UNIFORM_SLOTS],
    viewport: Viewport,
    clear_color: [f32; 4],
    draws: Vec<RecordedDraw>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..UNIFORM_SLOTS as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let binding_size = UniformBlock::ALL
            .iter()
            .fold(16, |max, block| max.max(block.size()));
        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;

        Self {
            device,
            queue,
            color_format,
            handles: HandleAllocator::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            bind_group_layout,
            pipeline_layout,
            arena: UniformArena::new(alignment, binding_size),
            arena_buffer: None,
            depth: None,
            target: None,
            current_program: None,
            vertex_buffer: None,
            uniform_slots: [None; UNIFORM_SLOTS],
            viewport: Viewport::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            draws: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Colour attachment for the next `end_frame`. Consumed by it.
    pub fn set_target(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        self.target = Some(Target {
            view,
            width: width.max(1),
            height: height.max(1),
        });
    }

    fn compile(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, DeviceError> {
        if source.trim().is_empty() {
            return Err(DeviceError::ShaderCompile {
                label: label.to_owned(),
                stage,
                log: "empty source".into(),
            });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(format!("{label}_{stage}").as_str()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(DeviceError::ShaderCompile {
                label: label.to_owned(),
                stage,
                log: err.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn ensure_depth(&mut self, width: u32, height: u32) {
        if self
            .depth
            .as_ref()
            .is_some_and(|d| d.width == width && d.height == height)
        {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth = Some(Target {
            view: texture.create_view(&Default::default()),
            width,
            height,
        });
    }

    fn ensure_arena_capacity(&mut self, needed: usize) {
        if self
            .arena_buffer
            .as_ref()
            .is_some_and(|a| a.capacity >= needed)
        {
            return;
        }
        let capacity = needed.next_power_of_two();
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_arena"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let size = NonZeroU64::new(self.arena.binding_size() as u64);
        let entries: Vec<wgpu::BindGroupEntry> = (0..UNIFORM_SLOTS as u32)
            .map(|binding| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size,
                }),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_arena_bind_group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });
        tracing::debug!("uniform arena grown to {capacity} bytes");
        self.arena_buffer = Some(ArenaBuffer {
            buffer,
            bind_group,
            capacity,
        });
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    program: &GpuProgram,
    topology: PrimitiveTopology,
) -> Result<wgpu::RenderPipeline, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(format!("{}_{topology:?}", program.label).as_str()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: program.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &program.attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: convert::topology(topology),
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(pipeline),
    }
}

/// Clamp `viewport` to a `width` × `height` target, as `(x, y, w, h)`.
fn clamp_viewport(viewport: &Viewport, width: u32, height: u32) -> Option<[f32; 4]> {
    let [x, y] = viewport.top_left;
    let x = x.min(width);
    let y = y.min(height);
    let w = viewport.width().min(width - x);
    let h = viewport.height().min(height - y);
    (w > 0 && h > 0).then_some([x as f32, y as f32, w as f32, h as f32])
}

impl GraphicsDevice for WgpuDevice {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, DeviceError> {
        let vertex = self.compile(desc.label, ShaderStage::Vertex, desc.vertex_source)?;
        let fragment = self.compile(desc.label, ShaderStage::Fragment, desc.fragment_source)?;
        let mut program = GpuProgram {
            label: desc.label.to_owned(),
            vertex,
            fragment,
            stride: desc.vertex_layout.stride as u64,
            attributes: convert::vertex_attributes(desc.vertex_layout),
            blocks: desc.uniform_blocks.iter().map(|b| (*b).to_owned()).collect(),
            block_slots: vec![None; desc.uniform_blocks.len()],
            pipelines: HashMap::new(),
        };

        // Link the common case up front so a bad program fails here.
        let topology = PrimitiveTopology::TriangleList;
        let pipeline = build_pipeline(
            &self.device,
            &self.pipeline_layout,
            self.color_format,
            &program,
            topology,
        )
        .map_err(|log| DeviceError::ProgramLink {
            label: desc.label.to_owned(),
            log,
        })?;
        program.pipelines.insert(topology, Some(pipeline));

        let handle = self.handles.program();
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            tracing::warn!("destroy of unknown program {program:?}");
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if self.programs.contains_key(&program) {
            self.current_program = Some(program);
        } else {
            tracing::warn!("use of unknown program {program:?}");
            self.current_program = None;
        }
    }

    fn uniform_block_index(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .blocks
            .iter()
            .position(|b| b == name)
            .map(|i| i as u32)
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block_index: u32, slot: u32) {
        if slot as usize >= UNIFORM_SLOTS {
            tracing::warn!("uniform slot {slot} out of range (max {})", UNIFORM_SLOTS - 1);
            return;
        }
        match self
            .programs
            .get_mut(&program)
            .and_then(|p| p.block_slots.get_mut(block_index as usize))
        {
            Some(entry) => *entry = Some(slot),
            None => tracing::warn!("no uniform block {block_index} on program {program:?}"),
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferHandle, DeviceError> {
        let vertex = match kind {
            BufferKind::Vertex => Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vertex_buffer"),
                size: size.max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })),
            BufferKind::Uniform => {
                if size > self.arena.binding_size() {
                    tracing::warn!(
                        "{size}-byte uniform buffer exceeds the {}-byte binding; tail ignored",
                        self.arena.binding_size()
                    );
                }
                None
            }
        };
        let handle = self.handles.buffer();
        self.buffers.insert(
            handle,
            GpuBuffer {
                kind,
                shadow: vec![0; size],
                vertex,
            },
        );
        Ok(handle)
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
        let size = target.shadow.len();
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= size)
            .ok_or(DeviceError::UploadOutOfRange {
                offset,
                len: data.len(),
                size,
            })?;
        target.shadow[offset..end].copy_from_slice(data);

        if let Some(gpu) = &target.vertex {
            // Copies must be 4-byte aligned; widen to aligned bounds from the shadow.
            let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
            let start = offset / align * align;
            let stop = end.next_multiple_of(align);
            let mut bytes = target.shadow[start..end].to_vec();
            bytes.resize(stop - start, 0);
            self.queue.write_buffer(gpu, start as u64, &bytes);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.get(&buffer).map(|b| b.kind) {
            Some(BufferKind::Vertex) => self.vertex_buffer = Some(buffer),
            Some(BufferKind::Uniform) => {
                tracing::warn!("uniform buffer {buffer:?} bound as vertex buffer")
            }
            None => tracing::warn!("bind of unknown vertex buffer {buffer:?}"),
        }
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        if !self.buffers.contains_key(&buffer) {
            tracing::warn!("bind of unknown uniform buffer {buffer:?}");
            return;
        }
        match self.uniform_slots.get_mut(slot as usize) {
            Some(entry) => *entry = Some(buffer),
            None => tracing::warn!("uniform slot {slot} out of range"),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let Some(removed) = self.buffers.remove(&buffer) else {
            tracing::warn!("destroy of unknown buffer {buffer:?}");
            return;
        };
        if let Some(gpu) = removed.vertex {
            gpu.destroy();
        }
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        for entry in &mut self.uniform_slots {
            if *entry == Some(buffer) {
                *entry = None;
            }
        }
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = *viewport;
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        self.clear_color = clear_color;
        self.draws.clear();
        self.arena.reset();
    }

    fn draw(&mut self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32) {
        let Some(handle) = self.current_program else {
            tracing::trace!("draw without a usable program dropped");
            return;
        };
        let Some(vertex_buffer) = self.vertex_buffer else {
            tracing::warn!("draw skipped: no vertex buffer bound");
            return;
        };
        let Some(program) = self.programs.get_mut(&handle) else {
            return;
        };

        if !program.pipelines.contains_key(&topology) {
            let built = build_pipeline(
                &self.device,
                &self.pipeline_layout,
                self.color_format,
                program,
                topology,
            )
            .inspect_err(|log| {
                tracing::error!("pipeline `{}` for {topology:?} failed: {log}", program.label)
            })
            .ok();
            program.pipelines.insert(topology, built);
        }
        if !matches!(program.pipelines.get(&topology), Some(Some(_))) {
            return;
        }

        let mut offsets = [self.arena.zero_offset(); UNIFORM_SLOTS];
        for (slot, offset) in offsets.iter_mut().enumerate() {
            if !program.reads_slot(slot) {
                continue;
            }
            let bytes = self.uniform_slots[slot]
                .and_then(|b| self.buffers.get(&b))
                .map(|b| b.shadow.as_slice());
            match bytes {
                Some(bytes) => *offset = self.arena.push(bytes),
                None => tracing::warn!("draw reads uniform slot {slot}, but nothing is bound"),
            }
        }

        self.draws.push(RecordedDraw {
            program: handle,
            topology,
            vertex_buffer,
            first_vertex,
            vertex_count,
            offsets,
            viewport: self.viewport,
        });
    }

    fn end_frame(&mut self) {
        let Some(target) = self.target.take() else {
            tracing::debug!("no target set; {} draw(s) discarded", self.draws.len());
            self.draws.clear();
            return;
        };
        self.ensure_depth(target.width, target.height);
        self.ensure_arena_capacity(self.arena.bytes().len());
        let (Some(depth), Some(arena)) = (&self.depth, &self.arena_buffer) else {
            return;
        };
        self.queue.write_buffer(&arena.buffer, 0, self.arena.bytes());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("forward_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(convert::clear_color(self.clear_color)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &self.draws {
                let pipeline = self
                    .programs
                    .get(&draw.program)
                    .and_then(|p| p.pipelines.get(&draw.topology))
                    .and_then(Option::as_ref);
                let vertices = self
                    .buffers
                    .get(&draw.vertex_buffer)
                    .and_then(|b| b.vertex.as_ref());
                let (Some(pipeline), Some(vertices)) = (pipeline, vertices) else {
                    continue;
                };
                let Some([x, y, w, h]) = clamp_viewport(&draw.viewport, target.width, target.height)
                else {
                    continue;
                };
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &arena.bind_group, &draw.offsets);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.draw(
                    draw.first_vertex..draw.first_vertex + draw.vertex_count,
                    0..1,
                );
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.draws.clear();
    }
}
