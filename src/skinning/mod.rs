//! Skinning
//!
//! - [`SkinDescriptor`]: shared, immutable bone list of a mesh topology
//! - [`BonePartitioner`]: load-time split of skins exceeding the bone limit
//! - [`SkinInstance`]: per-draw bone binding and matrix palette
//! - [`SkinInstanceCache`]: sharing of instances per `(root bone, skin)`

pub mod cache;
pub mod instance;
pub mod palette;
pub mod partition;
pub mod skin;

pub use cache::{SkinInstanceCache, SkinInstanceKey};
pub use instance::{SkinInstance, SkinInstanceState};
pub use palette::{
    BoneTexture, DefaultPaletteAllocator, MatrixPaletteTarget, PaletteAllocator, PaletteBuffer,
    bone_texture_size,
};
pub use partition::{
    BonePartitioner, InstanceClone, MAX_INFLUENCES, ModelPatch, PartitionVertex, SkinPartition,
    SkinPartitioning,
};
pub use skin::SkinDescriptor;
