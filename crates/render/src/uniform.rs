use std::collections::BTreeMap;

use prism_gpu::{BufferHandle, BufferKind, DeviceError, GraphicsDevice};

use crate::buffers::UniformBlock;

/// Device buffers backing each uniform block, shared by every program that
/// reads the block.
///
/// Owned by the renderer and passed to the passes explicitly.
#[derive(Debug, Default)]
pub struct UniformRegistry {
    buffers: BTreeMap<UniformBlock, BufferHandle>,
}

impl UniformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the buffer for `block` unless it already exists.
    ///
    /// Registering a block twice is a no-op. Allocation failures are logged
    /// and leave the block unregistered.
    pub fn add(&mut self, device: &mut dyn GraphicsDevice, block: UniformBlock) {
        if let Err(err) = self.try_add(device, block) {
            tracing::error!("uniform block `{}` allocation failed: {err}", block.name());
        }
    }

    pub fn try_add(
        &mut self,
        device: &mut dyn GraphicsDevice,
        block: UniformBlock,
    ) -> Result<BufferHandle, DeviceError> {
        if let Some(existing) = self.buffers.get(&block) {
            tracing::debug!("uniform block `{}` already registered", block.name());
            return Ok(*existing);
        }
        let buffer = device.create_buffer(BufferKind::Uniform, block.size())?;
        self.buffers.insert(block, buffer);
        tracing::debug!(
            "registered uniform block `{}` ({} bytes, slot {})",
            block.name(),
            block.size(),
            block.slot()
        );
        Ok(buffer)
    }

    pub fn get(&self, block: UniformBlock) -> Option<BufferHandle> {
        self.buffers.get(&block).copied()
    }

    pub fn contains(&self, block: UniformBlock) -> bool {
        self.buffers.contains_key(&block)
    }

    /// Upload `data` into the block's buffer.
    ///
    /// Unregistered blocks are skipped with a warning. A size mismatch is
    /// warned about, and the write is still attempted.
    pub fn update(&self, device: &mut dyn GraphicsDevice, block: UniformBlock, data: &[u8]) {
        let Some(buffer) = self.get(block) else {
            tracing::warn!("uniform block `{}` is not registered; write skipped", block.name());
            return;
        };
        if data.len() != block.size() {
            tracing::warn!(
                "uniform block `{}` expects {} bytes, got {}",
                block.name(),
                block.size(),
                data.len()
            );
        }
        if let Err(err) = device.upload_buffer(buffer, 0, data) {
            tracing::error!("uniform block `{}` upload failed: {err}", block.name());
        }
    }

    /// Attach every registered buffer to its block's binding point.
    pub fn bind_all(&self, device: &mut dyn GraphicsDevice) {
        for (block, buffer) in &self.buffers {
            device.bind_uniform_buffer(block.slot(), *buffer);
        }
    }

    /// Destroy every buffer. The registry is empty afterwards.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, buffer) in std::mem::take(&mut self.buffers) {
            device.destroy_buffer(buffer);
        }
    }
}
