//! Skinning Settings
//!
//! Load-time configuration for skin partitioning and palette storage.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_skin::SkinningSettings;
//!
//! // Default: 64 bones per draw, texture-backed palettes
//! let settings = SkinningSettings::default();
//!
//! // Uniform-buffer palettes for devices without float textures
//! let settings = SkinningSettings::default()
//!     .with_bone_limit(32)
//!     .with_bone_textures(false);
//!
//! let partitioner = settings.partitioner()?;
//! let allocator = settings.palette_allocator();
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::skinning::{BonePartitioner, DefaultPaletteAllocator};

/// Default maximum number of bones addressable by one draw call.
pub const DEFAULT_BONE_LIMIT: usize = 64;

/// Configuration shared by the content pipeline and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinningSettings {
    /// Maximum number of distinct bones a single partition (draw call) may use.
    pub bone_limit: usize,
    /// Device capability flag: store palettes in RGBA32F textures instead of
    /// plain float buffers.
    pub supports_bone_textures: bool,
}

impl Default for SkinningSettings {
    #[inline]
    fn default() -> Self {
        Self {
            bone_limit: DEFAULT_BONE_LIMIT,
            supports_bone_textures: true,
        }
    }
}

impl SkinningSettings {
    /// Parses settings from a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_bone_limit(mut self, bone_limit: usize) -> Self {
        self.bone_limit = bone_limit;
        self
    }

    #[must_use]
    pub fn with_bone_textures(mut self, supported: bool) -> Self {
        self.supports_bone_textures = supported;
        self
    }

    /// Builds a partitioner enforcing [`bone_limit`](Self::bone_limit).
    pub fn partitioner(&self) -> Result<BonePartitioner> {
        BonePartitioner::new(self.bone_limit)
    }

    /// Builds the palette allocator matching the device capability flag.
    #[inline]
    #[must_use]
    pub fn palette_allocator(&self) -> DefaultPaletteAllocator {
        DefaultPaletteAllocator::new(self.supports_bone_textures)
    }
}
