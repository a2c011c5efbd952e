//! Matrix palette storage
//!
//! A palette holds one 3x4 row-major matrix (12 floats) per bone: the first
//! three rows of the bone's skinning matrix, in bone order. Two GPU-facing
//! layouts are provided:
//!
//! - [`BoneTexture`]: an `Rgba32Float` texture, three texels per bone
//! - [`PaletteBuffer`]: a uniform buffer
//!
//! The CPU copy is the source of truth; [`MatrixPaletteTarget::upload`] bumps
//! the version so the renderer knows to copy it to the GPU.

use crate::resources::ChangeTracker;

/// Floats per bone in a palette (three `vec4` rows).
pub const FLOATS_PER_BONE: usize = 12;

/// Texels per bone in a [`BoneTexture`].
pub const TEXELS_PER_BONE: usize = 3;

/// CPU-side storage of a bone-matrix palette.
pub trait MatrixPaletteTarget: Send + Sync + std::fmt::Debug {
    fn label(&self) -> &str;

    fn bone_count(&self) -> usize;

    /// `bone_count * 12` floats, bone after bone.
    fn palette(&self) -> &[f32];

    fn palette_mut(&mut self) -> &mut [f32];

    /// Marks the palette as ready for transfer to the GPU.
    fn upload(&mut self);

    /// Incremented by every [`upload`](Self::upload).
    fn version(&self) -> u64;

    /// Raw bytes of the full backing store, padding included.
    fn as_bytes(&self) -> &[u8];
}

/// Texture dimensions for `bone_count` bones.
///
/// Width is `ceil(sqrt(bones * 3))` rounded up to a multiple of three, so a
/// bone never straddles a row.
#[must_use]
pub fn bone_texture_size(bone_count: usize) -> (u32, u32) {
    let texels = bone_count.max(1) * TEXELS_PER_BONE;
    let side = (texels as f64).sqrt().ceil() as usize;
    let width = side.div_ceil(TEXELS_PER_BONE) * TEXELS_PER_BONE;
    let height = texels.div_ceil(width).max(1);
    (width as u32, height as u32)
}

/// Palette stored as an `Rgba32Float` texture.
#[derive(Debug, Clone)]
pub struct BoneTexture {
    label: String,
    bone_count: usize,
    width: u32,
    height: u32,
    texels: Vec<f32>,
    tracker: ChangeTracker,
}

impl BoneTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    #[must_use]
    pub fn new(label: &str, bone_count: usize) -> Self {
        let (width, height) = bone_texture_size(bone_count);
        Self {
            label: label.to_string(),
            bone_count,
            width,
            height,
            texels: vec![0.0; width as usize * height as usize * 4],
            tracker: ChangeTracker::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl MatrixPaletteTarget for BoneTexture {
    fn label(&self) -> &str {
        &self.label
    }

    fn bone_count(&self) -> usize {
        self.bone_count
    }

    fn palette(&self) -> &[f32] {
        &self.texels[..self.bone_count * FLOATS_PER_BONE]
    }

    fn palette_mut(&mut self) -> &mut [f32] {
        &mut self.texels[..self.bone_count * FLOATS_PER_BONE]
    }

    fn upload(&mut self) {
        self.tracker.changed();
    }

    fn version(&self) -> u64 {
        self.tracker.version()
    }

    fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

/// Palette stored as a uniform buffer.
#[derive(Debug, Clone)]
pub struct PaletteBuffer {
    label: String,
    bone_count: usize,
    data: Vec<f32>,
    tracker: ChangeTracker,
}

impl PaletteBuffer {
    pub const USAGE: wgpu::BufferUsages =
        wgpu::BufferUsages::UNIFORM.union(wgpu::BufferUsages::COPY_DST);

    #[must_use]
    pub fn new(label: &str, bone_count: usize) -> Self {
        Self {
            label: label.to_string(),
            bone_count,
            data: vec![0.0; bone_count * FLOATS_PER_BONE],
            tracker: ChangeTracker::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> wgpu::BufferUsages {
        Self::USAGE
    }
}

impl MatrixPaletteTarget for PaletteBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn bone_count(&self) -> usize {
        self.bone_count
    }

    fn palette(&self) -> &[f32] {
        &self.data
    }

    fn palette_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn upload(&mut self) {
        self.tracker.changed();
    }

    fn version(&self) -> u64 {
        self.tracker.version()
    }

    fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Chooses palette storage for new skin instances.
pub trait PaletteAllocator: Send + Sync {
    fn allocate(&self, label: &str, bone_count: usize) -> Box<dyn MatrixPaletteTarget>;
}

/// Bone textures when the device samples float textures in the vertex
/// stage, uniform buffers otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPaletteAllocator {
    supports_bone_textures: bool,
}

impl DefaultPaletteAllocator {
    #[must_use]
    pub fn new(supports_bone_textures: bool) -> Self {
        Self {
            supports_bone_textures,
        }
    }

    #[inline]
    #[must_use]
    pub fn supports_bone_textures(&self) -> bool {
        self.supports_bone_textures
    }
}

impl Default for DefaultPaletteAllocator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PaletteAllocator for DefaultPaletteAllocator {
    fn allocate(&self, label: &str, bone_count: usize) -> Box<dyn MatrixPaletteTarget> {
        if self.supports_bone_textures {
            Box::new(BoneTexture::new(label, bone_count))
        } else {
            Box::new(PaletteBuffer::new(label, bone_count))
        }
    }
}
