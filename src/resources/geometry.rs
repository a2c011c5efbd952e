use glam::{Affine3A, Vec3};
use wgpu::{IndexFormat, VertexFormat};

use crate::errors::{Result, SkinError};

/// The closed set of vertex slots the engine understands.
///
/// Attributes are always stored and iterated in [`VertexSemantic::ALL`] order,
/// so two buffers with the same attributes produce the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    BlendWeight,
    BlendIndices,
    Color,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
}

impl VertexSemantic {
    /// Fixed iteration table.
    pub const ALL: [VertexSemantic; 10] = [
        VertexSemantic::Position,
        VertexSemantic::Normal,
        VertexSemantic::Tangent,
        VertexSemantic::BlendWeight,
        VertexSemantic::BlendIndices,
        VertexSemantic::Color,
        VertexSemantic::TexCoord0,
        VertexSemantic::TexCoord1,
        VertexSemantic::TexCoord2,
        VertexSemantic::TexCoord3,
    ];

    /// Shader-facing attribute name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            VertexSemantic::Position => "position",
            VertexSemantic::Normal => "normal",
            VertexSemantic::Tangent => "tangent",
            VertexSemantic::BlendWeight => "weights",
            VertexSemantic::BlendIndices => "joints",
            VertexSemantic::Color => "color",
            VertexSemantic::TexCoord0 => "uv",
            VertexSemantic::TexCoord1 => "uv1",
            VertexSemantic::TexCoord2 => "uv2",
            VertexSemantic::TexCoord3 => "uv3",
        }
    }

    fn table_index(self) -> usize {
        self as usize
    }
}

/// Number of scalar components in a vertex format.
#[must_use]
pub fn component_count(format: VertexFormat) -> usize {
    use VertexFormat as F;
    match format {
        F::Uint32 | F::Sint32 | F::Float32 | F::Float64 => 1,
        F::Uint8x2
        | F::Sint8x2
        | F::Unorm8x2
        | F::Snorm8x2
        | F::Uint16x2
        | F::Sint16x2
        | F::Unorm16x2
        | F::Snorm16x2
        | F::Float16x2
        | F::Uint32x2
        | F::Sint32x2
        | F::Float32x2
        | F::Float64x2 => 2,
        F::Uint32x3 | F::Sint32x3 | F::Float32x3 | F::Float64x3 => 3,
        F::Uint8x4
        | F::Sint8x4
        | F::Unorm8x4
        | F::Snorm8x4
        | F::Uint16x4
        | F::Sint16x4
        | F::Unorm16x4
        | F::Snorm16x4
        | F::Float16x4
        | F::Uint32x4
        | F::Sint32x4
        | F::Float32x4
        | F::Float64x4 => 4,
        _ => 1,
    }
}

#[inline]
fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// A planar (non-interleaved) vertex attribute stream.
///
/// Elements are tightly packed little-endian data, `format.size()` bytes each.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    data: Vec<u8>,
}

impl VertexAttribute {
    #[must_use]
    pub fn new(semantic: VertexSemantic, format: VertexFormat, data: Vec<u8>) -> Self {
        Self {
            semantic,
            format,
            data,
        }
    }

    /// Creates an attribute from typed elements, e.g. `&[[f32; 3]]`.
    #[must_use]
    pub fn from_slice<T: bytemuck::Pod>(semantic: VertexSemantic, format: VertexFormat, data: &[T]) -> Self {
        Self::new(semantic, format, bytemuck::cast_slice(data).to_vec())
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.format.size() as usize
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> u32 {
        (self.data.len() / self.stride().max(1)) as u32
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> usize {
        component_count(self.format)
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes of element `i`.
    #[must_use]
    pub fn element(&self, i: u32) -> Option<&[u8]> {
        let stride = self.stride();
        let start = i as usize * stride;
        self.data.get(start..start + stride)
    }

    /// Decodes element `i` as integers (blend indices).
    ///
    /// Components beyond the format's count are zero. Returns `None` for
    /// formats that cannot carry indices or for an out-of-range element.
    #[must_use]
    pub fn read_uint4(&self, i: u32) -> Option<[u32; 4]> {
        use VertexFormat as F;
        let bytes = self.element(i)?;
        let n = self.components();
        let mut out = [0u32; 4];
        match self.format {
            F::Uint8x2 | F::Uint8x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = u32::from(bytes[c]);
                }
            }
            F::Uint16x2 | F::Uint16x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = u32::from(read_u16(bytes, c * 2));
                }
            }
            F::Uint32 | F::Uint32x2 | F::Uint32x3 | F::Uint32x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = read_u32(bytes, c * 4);
                }
            }
            F::Float32 | F::Float32x2 | F::Float32x3 | F::Float32x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = f32::from_bits(read_u32(bytes, c * 4)) as u32;
                }
            }
            _ => return None,
        }
        Some(out)
    }

    /// Encodes integers into element `i`. Only the format's components are written.
    ///
    /// Returns `false` if the format cannot carry indices, a value does not
    /// fit, or the element is out of range.
    pub fn write_uint4(&mut self, i: u32, values: [u32; 4]) -> bool {
        use VertexFormat as F;
        let stride = self.stride();
        let n = self.components();
        let format = self.format;
        let start = i as usize * stride;
        let Some(bytes) = self.data.get_mut(start..start + stride) else {
            return false;
        };
        match format {
            F::Uint8x2 | F::Uint8x4 => {
                for c in 0..n {
                    let Ok(v) = u8::try_from(values[c]) else {
                        return false;
                    };
                    bytes[c] = v;
                }
            }
            F::Uint16x2 | F::Uint16x4 => {
                for c in 0..n {
                    let Ok(v) = u16::try_from(values[c]) else {
                        return false;
                    };
                    bytes[c * 2..c * 2 + 2].copy_from_slice(&v.to_le_bytes());
                }
            }
            F::Uint32 | F::Uint32x2 | F::Uint32x3 | F::Uint32x4 => {
                for c in 0..n {
                    bytes[c * 4..c * 4 + 4].copy_from_slice(&values[c].to_le_bytes());
                }
            }
            F::Float32 | F::Float32x2 | F::Float32x3 | F::Float32x4 => {
                for c in 0..n {
                    bytes[c * 4..c * 4 + 4].copy_from_slice(&(values[c] as f32).to_le_bytes());
                }
            }
            _ => return false,
        }
        true
    }

    /// Decodes element `i` as floats (blend weights), resolving normalized formats.
    #[must_use]
    pub fn read_float4(&self, i: u32) -> Option<[f32; 4]> {
        use VertexFormat as F;
        let bytes = self.element(i)?;
        let n = self.components();
        let mut out = [0.0f32; 4];
        match self.format {
            F::Float32 | F::Float32x2 | F::Float32x3 | F::Float32x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = f32::from_bits(read_u32(bytes, c * 4));
                }
            }
            F::Unorm8x2 | F::Unorm8x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = f32::from(bytes[c]) / 255.0;
                }
            }
            F::Unorm16x2 | F::Unorm16x4 => {
                for (c, v) in out.iter_mut().enumerate().take(n) {
                    *v = f32::from(read_u16(bytes, c * 2)) / 65535.0;
                }
            }
            _ => return None,
        }
        Some(out)
    }

    /// Appends a copy of `source`'s element `i`. Formats must match.
    pub(crate) fn push_element_from(&mut self, source: &VertexAttribute, i: u32) -> bool {
        debug_assert_eq!(self.format, source.format);
        match source.element(i) {
            Some(bytes) => {
                self.data.extend_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    pub(crate) fn empty_like(source: &VertexAttribute, capacity: usize) -> Self {
        Self {
            semantic: source.semantic,
            format: source.format,
            data: Vec::with_capacity(capacity * source.stride()),
        }
    }
}

/// A set of vertex attributes sharing one vertex count.
///
/// This is the geometry-provider shape consumed and produced by the
/// partitioner. Several meshes may draw from the same buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    attributes: Vec<VertexAttribute>,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Builds a buffer, validating that every attribute has the same length.
    ///
    /// A later attribute with an already present semantic replaces the earlier one.
    pub fn new(attributes: impl IntoIterator<Item = VertexAttribute>) -> Result<Self> {
        let mut buffer = Self::default();
        for attr in attributes {
            buffer.set_attribute(attr)?;
        }
        Ok(buffer)
    }

    pub fn set_attribute(&mut self, attr: VertexAttribute) -> Result<()> {
        if self.attributes.is_empty() {
            self.vertex_count = attr.count();
        } else if attr.count() != self.vertex_count {
            return Err(SkinError::AttributeLengthMismatch {
                semantic: attr.semantic,
                expected: self.vertex_count,
                actual: attr.count(),
            });
        }

        match self
            .attributes
            .binary_search_by_key(&attr.semantic.table_index(), |a| a.semantic.table_index())
        {
            Ok(pos) => self.attributes[pos] = attr,
            Err(pos) => self.attributes.insert(pos, attr),
        }
        Ok(())
    }

    #[must_use]
    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Attributes in [`VertexSemantic::ALL`] order.
    #[inline]
    pub fn attributes(&self) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.iter()
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Skinned buffers carry both blend indices and blend weights.
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.attribute(VertexSemantic::BlendIndices).is_some()
            && self.attribute(VertexSemantic::BlendWeight).is_some()
    }

    pub(crate) fn from_sorted_parts(attributes: Vec<VertexAttribute>, vertex_count: u32) -> Self {
        Self {
            attributes,
            vertex_count,
        }
    }

    /// Position of vertex `i`, if the buffer has `Float32x3` positions.
    #[must_use]
    pub fn position(&self, i: u32) -> Option<Vec3> {
        let attr = self.attribute(VertexSemantic::Position)?;
        if attr.format != VertexFormat::Float32x3 {
            return None;
        }
        let bytes = attr.element(i)?;
        let vals: [f32; 3] = bytemuck::pod_read_unaligned(bytes);
        Some(Vec3::from_array(vals))
    }
}

/// Flat triangle-list index data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBuffer {
    pub indices: Vec<u32>,
}

impl IndexBuffer {
    #[must_use]
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Narrowest GPU index format able to hold every index.
    #[must_use]
    pub fn index_format(&self) -> IndexFormat {
        if self.indices.iter().all(|&i| i <= u32::from(u16::MAX)) {
            IndexFormat::Uint16
        } else {
            IndexFormat::Uint32
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// An inverted box that any point expands.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut out = Self::empty();
        for point in corners {
            out.expand(matrix.transform_point3(point));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint8_indices_round_trip_through_element() {
        let mut attr = VertexAttribute::from_slice(
            VertexSemantic::BlendIndices,
            VertexFormat::Uint8x4,
            &[[1u8, 2, 3, 4], [5, 6, 7, 8]],
        );
        assert_eq!(attr.read_uint4(1), Some([5, 6, 7, 8]));
        assert!(attr.write_uint4(1, [0, 1, 2, 3]));
        assert_eq!(attr.read_uint4(1), Some([0, 1, 2, 3]));
        assert!(!attr.write_uint4(0, [256, 0, 0, 0]));
    }

    #[test]
    fn unorm8_weights_are_normalized() {
        let attr = VertexAttribute::from_slice(
            VertexSemantic::BlendWeight,
            VertexFormat::Unorm8x4,
            &[[255u8, 0, 0, 0]],
        );
        assert_eq!(attr.read_float4(0), Some([1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn attributes_stay_in_table_order() {
        let buffer = VertexBuffer::new([
            VertexAttribute::from_slice(VertexSemantic::TexCoord0, VertexFormat::Float32x2, &[[0.0f32; 2]]),
            VertexAttribute::from_slice(VertexSemantic::Position, VertexFormat::Float32x3, &[[0.0f32; 3]]),
        ])
        .unwrap();
        let order: Vec<_> = buffer.attributes().map(|a| a.semantic).collect();
        assert_eq!(order, vec![VertexSemantic::Position, VertexSemantic::TexCoord0]);
    }
}
