//! Vertex types with explicit, declared attribute layouts.
//!
//! Each vertex type states its attribute order, formats and byte offsets in
//! its `LAYOUT`. Linearization is a plain byte cast of `#[repr(C)]` data, so
//! the declared layout is the only contract between CPU and shader.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Component format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub const fn components(self) -> usize {
        match self {
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }

    pub const fn size(self) -> usize {
        self.components() * std::mem::size_of::<f32>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Semantic name, e.g. `position`.
    pub name: &'static str,
    /// Shader input location.
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices.
    pub stride: usize,
    pub attributes: &'static [VertexAttribute],
}

impl VertexLayout {
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Number of whole vertices in `data`.
    pub fn vertex_count(&self, data: &[u8]) -> usize {
        if self.stride == 0 {
            0
        } else {
            data.len() / self.stride
        }
    }

    /// Read attribute `name` of vertex `index` from interleaved `data`.
    ///
    /// Missing components are filled from `(0, 0, 0, 1)`. Returns `None` if
    /// the layout has no such attribute or the vertex is out of range.
    pub fn read(&self, data: &[u8], index: usize, name: &str) -> Option<[f32; 4]> {
        let attr = self.attribute(name)?;
        let start = index.checked_mul(self.stride)?.checked_add(attr.offset)?;
        let bytes = data.get(start..start + attr.format.size())?;
        let mut out = [0.0, 0.0, 0.0, 1.0];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            out[i] = bytemuck::pod_read_unaligned::<f32>(chunk);
        }
        Some(out)
    }
}

/// A vertex type with a declared layout.
pub trait Vertex: Pod {
    const LAYOUT: VertexLayout;
}

/// Interleaved bytes of `vertices`, in the order their layout declares.
pub fn vertex_bytes<V: Vertex>(vertices: &[V]) -> &[u8] {
    debug_assert_eq!(std::mem::size_of::<V>(), V::LAYOUT.stride);
    bytemuck::cast_slice(vertices)
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VertexPosition {
    pub position: [f32; 3],
}

impl Vertex for VertexPosition {
    const LAYOUT: VertexLayout = VertexLayout {
        stride: 12,
        attributes: &[VertexAttribute {
            name: "position",
            location: 0,
            format: VertexFormat::Float32x3,
            offset: 0,
        }],
    };
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VertexPositionColor {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex for VertexPositionColor {
    const LAYOUT: VertexLayout = VertexLayout {
        stride: 24,
        attributes: &[
            VertexAttribute {
                name: "position",
                location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttribute {
                name: "color",
                location: 2,
                format: VertexFormat::Float32x3,
                offset: 12,
            },
        ],
    };
}

/// Input vertex of the forward program.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalColor {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl VertexPositionNormalColor {
    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            normal: [0.0, 0.0, 0.0],
            color,
        }
    }
}

impl Vertex for VertexPositionNormalColor {
    const LAYOUT: VertexLayout = VertexLayout {
        stride: 36,
        attributes: &[
            VertexAttribute {
                name: "position",
                location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttribute {
                name: "normal",
                location: 1,
                format: VertexFormat::Float32x3,
                offset: 12,
            },
            VertexAttribute {
                name: "color",
                location: 2,
                format: VertexFormat::Float32x3,
                offset: 24,
            },
        ],
    };
}

/// Recompute smooth normals for a triangle list.
///
/// Each vertex receives the normalized sum of the (area-weighted) face
/// normals of the triangles it belongs to. A trailing partial triangle is
/// ignored.
pub fn calculate_normals(vertices: &mut [VertexPositionNormalColor]) {
    for v in vertices.iter_mut() {
        v.normal = [0.0; 3];
    }

    for tri in vertices.chunks_exact_mut(3) {
        let p0 = Vec3::from(tri[0].position);
        let p1 = Vec3::from(tri[1].position);
        let p2 = Vec3::from(tri[2].position);
        let face = (p1 - p0).cross(p2 - p0);
        for v in tri.iter_mut() {
            v.normal = (Vec3::from(v.normal) + face).to_array();
        }
    }

    for v in vertices.iter_mut() {
        v.normal = Vec3::from(v.normal).normalize_or_zero().to_array();
    }
}
