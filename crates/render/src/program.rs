use prism_gpu::{DeviceError, GraphicsDevice, ProgramDesc, ProgramHandle, VertexLayout};

use crate::buffers::UniformBlock;

/// A linked shading program with its uniform blocks routed to their
/// binding points.
///
/// A program whose creation failed is inert: binding it does nothing, and
/// draws issued afterwards are dropped by the device.
#[derive(Debug)]
pub struct Program {
    label: String,
    handle: Option<ProgramHandle>,
    vertex_layout: VertexLayout,
}

impl Program {
    /// Build the program, logging a failure instead of returning it.
    pub fn new(device: &mut dyn GraphicsDevice, desc: &ProgramDesc<'_>) -> Self {
        match Self::try_new(device, desc) {
            Ok(program) => program,
            Err(err) => {
                tracing::error!("program `{}` unavailable: {err}", desc.label);
                Self {
                    label: desc.label.to_owned(),
                    handle: None,
                    vertex_layout: *desc.vertex_layout,
                }
            }
        }
    }

    pub fn try_new(
        device: &mut dyn GraphicsDevice,
        desc: &ProgramDesc<'_>,
    ) -> Result<Self, DeviceError> {
        let handle = device.create_program(desc)?;
        for name in desc.uniform_blocks {
            let Some(block) = UniformBlock::from_name(name) else {
                tracing::warn!("program `{}` declares unknown uniform block `{name}`", desc.label);
                continue;
            };
            match device.uniform_block_index(handle, name) {
                Some(index) => device.bind_uniform_block(handle, index, block.slot()),
                None => tracing::warn!(
                    "program `{}` has no active uniform block `{name}`",
                    desc.label
                ),
            }
        }
        tracing::info!("program `{}` created", desc.label);
        Ok(Self {
            label: desc.label.to_owned(),
            handle: Some(handle),
            vertex_layout: *desc.vertex_layout,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    /// The vertex layout the program's inputs expect.
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn is_inert(&self) -> bool {
        self.handle.is_none()
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.handle {
            device.use_program(handle);
        }
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.handle.take() {
            device.destroy_program(handle);
        }
    }
}
