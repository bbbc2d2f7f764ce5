use prism_common::Viewport;

use crate::vertex::VertexLayout;

/// Opaque handle to a device buffer (vertex or uniform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque handle to a linked shading program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Uniform,
}

/// How consecutive vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Everything a device needs to build a program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    pub vertex_layout: &'a VertexLayout,
    /// Uniform block names the program reads, in declaration order.
    pub uniform_blocks: &'a [&'a str],
}

/// Errors from device resource creation and updates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("{stage} shader of `{label}` failed to compile: {log}")]
    ShaderCompile {
        label: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("program `{label}` failed to link: {log}")]
    ProgramLink { label: String, log: String },
    #[error("allocation of a {size}-byte buffer failed: {reason}")]
    BufferAllocation { size: usize, reason: String },
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("upload of {len} bytes at offset {offset} overflows a {size}-byte buffer")]
    UploadOutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// The graphics API surface the renderer consumes.
///
/// Calls are issued in frame order: `begin_frame`, any number of binds,
/// uploads and draws, then `end_frame`. Uploads made between two draws must
/// be observed by the second draw and not by the first.
///
/// Operations on unknown or destroyed handles are no-ops; they never panic.
pub trait GraphicsDevice {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, DeviceError>;

    fn destroy_program(&mut self, program: ProgramHandle);

    fn use_program(&mut self, program: ProgramHandle);

    /// Index of the named uniform block inside `program`, if it declares one.
    fn uniform_block_index(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Route the program's uniform block `block_index` to binding `slot`.
    fn bind_uniform_block(&mut self, program: ProgramHandle, block_index: u32, slot: u32);

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferHandle, DeviceError>;

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle);

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle);

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn set_viewport(&mut self, viewport: &Viewport);

    fn begin_frame(&mut self, clear_color: [f32; 4]);

    /// Non-indexed draw of `vertex_count` vertices starting at `first_vertex`.
    fn draw(&mut self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32);

    fn end_frame(&mut self);

    /// Create a buffer sized to `data` and fill it.
    fn create_buffer_init(
        &mut self,
        kind: BufferKind,
        data: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        let buffer = self.create_buffer(kind, data.len())?;
        if let Err(e) = self.upload_buffer(buffer, 0, data) {
            self.destroy_buffer(buffer);
            return Err(e);
        }
        Ok(buffer)
    }
}

/// Monotonic handle source shared by device implementations. Zero is never
/// handed out.
#[derive(Debug, Clone)]
pub struct HandleAllocator {
    next: u32,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&mut self) -> BufferHandle {
        BufferHandle(self.bump())
    }

    pub fn program(&mut self) -> ProgramHandle {
        ProgramHandle(self.bump())
    }

    fn bump(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_returns_zero_or_repeats() {
        let mut alloc = HandleAllocator::new();
        let a = alloc.buffer();
        let b = alloc.buffer();
        let p = alloc.program();
        assert_ne!(a.0, 0);
        assert_ne!(a, b);
        assert_ne!(p.0, b.0);
    }

    #[test]
    fn default_topology_is_triangle_list() {
        assert_eq!(PrimitiveTopology::default(), PrimitiveTopology::TriangleList);
    }

    #[test]
    fn compile_error_names_stage() {
        let err = DeviceError::ShaderCompile {
            label: "forward".into(),
            stage: ShaderStage::Fragment,
            log: "syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fragment"));
        assert!(msg.contains("forward"));
    }
}
