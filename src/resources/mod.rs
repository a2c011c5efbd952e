//! Core resource definitions
//!
//! CPU-side data produced by importers, independent of any GPU backend:
//! - Geometry: vertex attributes, vertex and index buffers
//! - Mesh: draw ranges, mesh instances and material mappings
//! - Model: the arena container the skin partitioner rewrites

pub mod geometry;
pub mod mesh;
pub mod model;
pub mod version_tracker;

use slotmap::new_key_type;

new_key_type! {
    pub struct VertexBufferKey;
    pub struct IndexBufferKey;
    pub struct MeshKey;
    pub struct MeshInstanceKey;
    pub struct SkinKey;
}

pub use geometry::{
    BoundingBox, IndexBuffer, VertexAttribute, VertexBuffer, VertexSemantic, component_count,
};
pub use mesh::{MaterialMapping, Mesh, MeshInstance, Primitive};
pub use model::{AppliedPatch, SkinnedModel};
pub use version_tracker::ChangeTracker;
