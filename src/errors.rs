//! Error Types
//!
//! This module defines the error types used by the skinning core.
//!
//! # Overview
//!
//! The main error type [`SkinError`] covers the structural failures that abort
//! a partitioning pass, plus descriptor and configuration validation:
//! - Oversized skins that no mesh references
//! - Referencing meshes that disagree on their vertex buffer
//! - Missing or malformed skinning attributes
//! - Settings that fail to parse
//!
//! Bone-name misses during [`SkinInstance::bind`](crate::skinning::SkinInstance::bind)
//! are *not* errors: they are logged and substituted with a fallback node.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SkinError>`.
//!
//! ```rust,ignore
//! use myth_skin::errors::Result;
//!
//! fn split(model: &mut SkinnedModel) -> Result<()> {
//!     BonePartitioner::new(64)?.run(model)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::VertexSemantic;

/// The main error type for the skinning core.
#[derive(Error, Debug)]
pub enum SkinError {
    // ========================================================================
    // Descriptor Errors
    // ========================================================================
    /// Bone names and inverse bind matrices must be parallel arrays.
    #[error("Skin '{name}' has {bone_names} bone names but {matrices} inverse bind matrices")]
    DescriptorLengthMismatch {
        /// Name of the offending skin
        name: String,
        /// Number of bone names supplied
        bone_names: usize,
        /// Number of inverse bind matrices supplied
        matrices: usize,
    },

    // ========================================================================
    // Partitioning Errors (structural, abort the whole pass)
    // ========================================================================
    /// A bone limit of zero can never be satisfied.
    #[error("Invalid bone limit: {0}")]
    InvalidBoneLimit(usize),

    /// An oversized skin is not referenced by any mesh.
    #[error("Skin '{skin}' exceeds the bone limit but no mesh references it")]
    SkinWithoutMeshes {
        /// Name of the offending skin
        skin: String,
    },

    /// The meshes referencing one skin must all draw from one vertex buffer.
    #[error("Meshes referencing skin '{skin}' do not share a single vertex buffer")]
    MismatchedVertexBuffers {
        /// Name of the offending skin
        skin: String,
    },

    /// A skinned vertex buffer lacks blend indices or blend weights.
    #[error("Vertex buffer is missing the {0:?} attribute required for skinning")]
    MissingSkinningAttribute(VertexSemantic),

    /// A vertex attribute uses a format the partitioner cannot decode.
    #[error("Unsupported vertex format {format:?} for {semantic:?}")]
    UnsupportedVertexFormat {
        /// Semantic slot of the attribute
        semantic: VertexSemantic,
        /// The undecodable format
        format: wgpu::VertexFormat,
    },

    /// The attributes of one vertex buffer disagree on the vertex count.
    #[error("Attribute {semantic:?} holds {actual} vertices, expected {expected}")]
    AttributeLengthMismatch {
        /// Semantic slot of the attribute
        semantic: VertexSemantic,
        /// Vertex count of the buffer
        expected: u32,
        /// Vertex count of the attribute
        actual: u32,
    },

    /// A mesh primitive reaches past the end of its index or vertex data.
    #[error("Primitive of mesh '{mesh}' is out of range")]
    PrimitiveOutOfRange {
        /// Name of the offending mesh
        mesh: String,
    },

    /// A partition-local bone slot does not fit the blend-index format.
    #[error("Bone slot {slot} does not fit blend-index format {format:?}")]
    BlendIndexOverflow {
        /// Partition-local bone slot
        slot: u32,
        /// Blend-index vertex format
        format: wgpu::VertexFormat,
    },

    /// A vertex references a bone outside of the skin.
    #[error("Vertex {vertex} references bone {bone} but skin '{skin}' has {bone_count} bones")]
    BoneIndexOutOfRange {
        /// Name of the skin
        skin: String,
        /// Original vertex index
        vertex: u32,
        /// Offending global bone index
        bone: u32,
        /// Number of bones in the skin
        bone_count: usize,
    },

    /// An index references a vertex outside of the vertex buffer.
    #[error("Index {index} is out of range for a vertex buffer of {vertex_count} vertices")]
    VertexIndexOutOfRange {
        /// Offending vertex index
        index: u32,
        /// Number of vertices in the buffer
        vertex_count: u32,
    },

    /// A single triangle needs more distinct bones than one partition can hold.
    #[error("Triangle requires {required} bones, exceeding the bone limit of {limit}")]
    TriangleExceedsBoneLimit {
        /// Distinct bones used by the triangle
        required: usize,
        /// The partition bone limit
        limit: usize,
    },

    /// A model entry points at a handle that no longer exists.
    #[error("Dangling {0} handle in model")]
    DanglingHandle(&'static str),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, SkinError>`.
pub type Result<T> = std::result::Result<T, SkinError>;
