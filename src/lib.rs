#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Skin partitioning and matrix-palette skinning for the Myth engine.
//!
//! Load time: [`BonePartitioner`] splits skins that use more bones than one
//! draw can address. Run time: [`SkinInstance`] binds a skin to scene nodes
//! and derives the per-frame matrix palette.

pub mod errors;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod skinning;

pub use errors::{Result, SkinError};
pub use resources::{
    IndexBuffer, MaterialMapping, Mesh, MeshInstance, Primitive, SkinnedModel, VertexAttribute,
    VertexBuffer, VertexSemantic,
};
pub use scene::{Node, NodeHandle, NodeHierarchy, NodeTree};
pub use settings::SkinningSettings;
pub use skinning::{
    BonePartitioner, DefaultPaletteAllocator, MatrixPaletteTarget, ModelPatch, PaletteAllocator,
    SkinDescriptor, SkinInstance, SkinInstanceCache,
};
