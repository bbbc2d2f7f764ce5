//! Bookkeeping-only device for unit tests: tracks live buffers and counts
//! draws, renders nothing.

use std::collections::HashMap;

use prism_common::Viewport;
use prism_gpu::{
    BufferHandle, BufferKind, DeviceError, GraphicsDevice, HandleAllocator, PrimitiveTopology,
    ProgramDesc, ProgramHandle,
};

#[derive(Default)]
pub(crate) struct CountingDevice {
    handles: HandleAllocator,
    pub(crate) buffers: HashMap<BufferHandle, Vec<u8>>,
    pub(crate) draws: Vec<(PrimitiveTopology, u32, u32)>,
    pub(crate) bound_vertex: Option<BufferHandle>,
    /// When set, buffer creation fails.
    pub(crate) out_of_memory: bool,
}

impl CountingDevice {
    /// A device whose every buffer allocation fails.
    pub(crate) fn out_of_memory() -> Self {
        Self {
            out_of_memory: true,
            ..Self::default()
        }
    }
}

impl GraphicsDevice for CountingDevice {
    fn create_program(&mut self, _desc: &ProgramDesc<'_>) -> Result<ProgramHandle, DeviceError> {
        Ok(self.handles.program())
    }

    fn destroy_program(&mut self, _program: ProgramHandle) {}

    fn use_program(&mut self, _program: ProgramHandle) {}

    fn uniform_block_index(&self, _program: ProgramHandle, _name: &str) -> Option<u32> {
        None
    }

    fn bind_uniform_block(&mut self, _program: ProgramHandle, _block_index: u32, _slot: u32) {}

    fn create_buffer(&mut self, _kind: BufferKind, size: usize) -> Result<BufferHandle, DeviceError> {
        if self.out_of_memory {
            return Err(DeviceError::BufferAllocation {
                size,
                reason: "out of memory".into(),
            });
        }
        let handle = self.handles.buffer();
        self.buffers.insert(handle, vec![0; size]);
        Ok(handle)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let bytes = self
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownBuffer(buffer))?;
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.bound_vertex = Some(buffer);
    }

    fn bind_uniform_buffer(&mut self, _slot: u32, _buffer: BufferHandle) {}

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn set_viewport(&mut self, _viewport: &Viewport) {}

    fn begin_frame(&mut self, _clear_color: [f32; 4]) {}

    fn draw(&mut self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32) {
        self.draws.push((topology, first_vertex, vertex_count));
    }

    fn end_frame(&mut self) {}
}
