use crate::resources::{IndexBufferKey, MeshKey, SkinKey, VertexBufferKey};
use crate::scene::NodeHandle;

/// A triangle-list draw range.
///
/// For indexed meshes `base`/`count` address the index buffer, otherwise
/// they address vertices directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Primitive {
    pub base: u32,
    pub count: u32,
}

impl Primitive {
    #[must_use]
    pub fn new(base: u32, count: u32) -> Self {
        Self { base, count }
    }
}

/// Drawable geometry: a vertex buffer, an optional index buffer and the
/// range to draw out of them.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: VertexBufferKey,
    pub index_buffer: Option<IndexBufferKey>,
    pub primitive: Primitive,
    /// Skin driving the blend indices of this mesh, if any.
    pub skin: Option<SkinKey>,
}

impl Mesh {
    #[must_use]
    pub fn new(name: &str, vertex_buffer: VertexBufferKey, primitive: Primitive) -> Self {
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer: None,
            primitive,
            skin: None,
        }
    }

    #[must_use]
    pub fn with_indices(mut self, index_buffer: IndexBufferKey) -> Self {
        self.index_buffer = Some(index_buffer);
        self
    }

    #[must_use]
    pub fn with_skin(mut self, skin: SkinKey) -> Self {
        self.skin = Some(skin);
        self
    }
}

/// A placement of a mesh at a scene node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshInstance {
    pub mesh: MeshKey,
    pub node: NodeHandle,
}

impl MeshInstance {
    #[must_use]
    pub fn new(mesh: MeshKey, node: NodeHandle) -> Self {
        Self { mesh, node }
    }
}

/// Material assignment of a mesh instance, carried over to its partition clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialMapping {
    /// Material asset name or path
    pub material: String,
}

impl MaterialMapping {
    #[must_use]
    pub fn new(material: &str) -> Self {
        Self {
            material: material.to_string(),
        }
    }
}
