/// Per-frame staging for uniform snapshots.
///
/// Uniform writes made between two draws must reach the second draw only,
/// but wgpu applies every `write_buffer` of a submission before any pass
/// runs. Each draw therefore gets its own copy of every bound block,
/// appended here at a dynamic-offset-aligned position, and the whole arena
/// is written once when the frame is submitted.
#[derive(Debug)]
pub(crate) struct UniformArena {
    binding_size: usize,
    stride: usize,
    staging: Vec<u8>,
}

impl UniformArena {
    /// `alignment` is the device's minimum dynamic offset alignment;
    /// `binding_size` the bytes visible through one binding.
    pub(crate) fn new(alignment: usize, binding_size: usize) -> Self {
        let alignment = alignment.max(1);
        let stride = binding_size.div_ceil(alignment) * alignment;
        let mut arena = Self {
            binding_size,
            stride,
            staging: Vec::new(),
        };
        arena.reset();
        arena
    }

    /// Drop every snapshot. Offset 0 always holds a zeroed block.
    pub(crate) fn reset(&mut self) {
        self.staging.clear();
        self.staging.resize(self.stride, 0);
    }

    pub(crate) fn zero_offset(&self) -> u32 {
        0
    }

    /// Append a snapshot of `bytes` and return its offset. Bytes past the
    /// binding size are cut off.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.staging.len();
        self.staging.resize(offset + self.stride, 0);
        let len = bytes.len().min(self.binding_size);
        self.staging[offset..offset + len].copy_from_slice(&bytes[..len]);
        offset as u32
    }

    pub(crate) fn binding_size(&self) -> usize {
        self.binding_size
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_land_on_aligned_offsets() {
        let mut arena = UniformArena::new(256, 224);
        let a = arena.push(&[1; 224]);
        let b = arena.push(&[2; 64]);
        assert_eq!((a, b), (256, 512));
        assert_eq!(arena.bytes().len(), 768);
        assert_eq!(arena.bytes()[512], 2);
        assert_eq!(arena.bytes()[512 + 64], 0);
    }

    #[test]
    fn oversized_writes_are_cut_at_the_binding_size() {
        let mut arena = UniformArena::new(16, 16);
        let offset = arena.push(&[7; 40]) as usize;
        assert_eq!(arena.bytes().len(), offset + 16);
    }

    #[test]
    fn reset_keeps_only_the_zero_block() {
        let mut arena = UniformArena::new(256, 1696);
        arena.push(&[1; 8]);
        arena.reset();
        assert_eq!(arena.bytes().len(), 1792);
        assert!(arena.bytes().iter().all(|b| *b == 0));
        assert_eq!(arena.zero_offset(), 0);
    }
}
