use prism_ecs::Component;
use prism_gpu::{
    BufferHandle, BufferKind, DeviceError, GraphicsDevice, PrimitiveTopology, Vertex, VertexLayout,
    vertex_bytes,
};

use super::Material;

/// Drawable geometry: a vertex buffer owned by this component plus the
/// parameters of its single non-indexed draw.
///
/// The buffer is immutable after creation and must be handed back with
/// [`Model::release`] before the component is dropped; [`destroy_entity`]
/// and [`set_model`] do so.
///
/// [`destroy_entity`]: crate::destroy_entity
/// [`set_model`]: crate::set_model
#[derive(Debug)]
pub struct Model {
    vertex_buffer: Option<BufferHandle>,
    vertex_count: u32,
    layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub material: Material,
}

impl Component for Model {}

impl Model {
    /// Upload `vertices` and build the model, or report why the buffer
    /// could not be created.
    pub fn try_new<V: Vertex>(
        device: &mut dyn GraphicsDevice,
        vertices: &[V],
        topology: PrimitiveTopology,
    ) -> Result<Self, DeviceError> {
        let buffer = device.create_buffer_init(BufferKind::Vertex, vertex_bytes(vertices))?;
        Ok(Self {
            vertex_buffer: Some(buffer),
            vertex_count: vertices.len() as u32,
            layout: V::LAYOUT,
            topology,
            material: Material::default(),
        })
    }

    /// Like [`Model::try_new`], but a failed upload is logged and yields an
    /// inert model that draws nothing.
    pub fn new<V: Vertex>(
        device: &mut dyn GraphicsDevice,
        vertices: &[V],
        topology: PrimitiveTopology,
    ) -> Self {
        Self::try_new(device, vertices, topology).unwrap_or_else(|err| {
            tracing::error!("model vertex buffer creation failed: {err}");
            Self {
                vertex_buffer: None,
                vertex_count: 0,
                layout: V::LAYOUT,
                topology,
                material: Material::default(),
            }
        })
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn is_inert(&self) -> bool {
        self.vertex_buffer.is_none()
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.vertex_buffer {
            device.bind_vertex_buffer(buffer);
        }
    }

    /// One draw over the full vertex range.
    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        if self.vertex_buffer.is_some() && self.vertex_count > 0 {
            device.draw(self.topology, 0, self.vertex_count);
        }
    }

    /// Destroy the vertex buffer. The model is inert afterwards.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.vertex_buffer.take() {
            device.destroy_buffer(buffer);
            self.vertex_count = 0;
        }
    }
}
