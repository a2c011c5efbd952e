use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec3};

use crate::resources::BoundingBox;
use crate::scene::{NodeHandle, NodeHierarchy};
use crate::skinning::SkinDescriptor;
use crate::skinning::palette::{FLOATS_PER_BONE, MatrixPaletteTarget, PaletteAllocator};

/// Lifecycle of a [`SkinInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinInstanceState {
    /// `bind` has not been called yet
    Unbound,
    /// Bound, but no update has run since binding
    Stale,
    /// Matrices reflect the last epoch passed to an update
    Fresh,
}

/// Per-draw binding of a [`SkinDescriptor`] to scene nodes.
///
/// Produces the flat matrix palette consumed by vertex skinning. Updates are
/// gated on a caller-supplied epoch: the same epoch never recomputes twice,
/// however many passes of a frame ask for the palette.
#[derive(Debug)]
pub struct SkinInstance {
    skin: Arc<SkinDescriptor>,

    /// Resolved bone nodes, in descriptor order. Not owned.
    bones: Vec<NodeHandle>,
    /// Identity of the binding; never dereferenced after `bind`.
    root_bone: Option<NodeHandle>,

    // === Runtime Data ===
    matrices: Vec<Mat4>,
    palette: Box<dyn MatrixPaletteTarget>,
    last_update_epoch: Option<u64>,
    // Packing has its own memo; matrices may be updated alone first.
    last_palette_epoch: Option<u64>,
}

impl SkinInstance {
    pub fn new(skin: Arc<SkinDescriptor>, allocator: &dyn PaletteAllocator) -> Self {
        let count = skin.bone_count();
        let palette = allocator.allocate(&format!("SkinPalette_{}", skin.name()), count);

        Self {
            skin,
            bones: Vec::new(),
            root_bone: None,
            matrices: vec![Mat4::IDENTITY; count],
            palette,
            last_update_epoch: None,
            last_palette_epoch: None,
        }
    }

    /// Resolves every bone name below `root_bone`.
    ///
    /// A name that cannot be found is bound to `fallback` instead and logged;
    /// binding itself never fails. Rebinding resets the epoch memo.
    pub fn bind(&mut self, hierarchy: &dyn NodeHierarchy, root_bone: NodeHandle, fallback: NodeHandle) {
        self.bones.clear();
        self.bones.reserve(self.skin.bone_count());

        for name in self.skin.bone_names() {
            let bone = hierarchy.find_by_name(root_bone, name).unwrap_or_else(|| {
                log::warn!(
                    "Skin '{}': bone '{}' not found under root, using fallback node",
                    self.skin.name(),
                    name
                );
                fallback
            });
            self.bones.push(bone);
        }

        self.root_bone = Some(root_bone);
        self.last_update_epoch = None;
        self.last_palette_epoch = None;
    }

    /// Recomputes the skinning matrices unless `epoch` was already seen.
    ///
    /// `matrices[i] = root_world⁻¹ * bone_world * inverse_bind[i]`
    ///
    /// Returns `true` when a recomputation happened. Unbound instances are
    /// left untouched.
    pub fn update_matrices(&mut self, hierarchy: &dyn NodeHierarchy, root_node: NodeHandle, epoch: u64) -> bool {
        if self.root_bone.is_none() || self.last_update_epoch == Some(epoch) {
            return false;
        }

        let root_matrix_inv = hierarchy.world_matrix(root_node).inverse();
        let inverse_bind_matrices = self.skin.inverse_bind_matrices();

        for ((matrix, &bone), &ibm) in self.matrices.iter_mut().zip(&self.bones).zip(inverse_bind_matrices) {
            // Root correction first, then the bind-pose inverse.
            let bone_world: Affine3A = hierarchy.world_matrix(bone);
            *matrix = Mat4::from(root_matrix_inv * bone_world * ibm);
        }

        log::trace!(
            "Skin '{}': recomputed {} matrices for epoch {}",
            self.skin.name(),
            self.matrices.len(),
            epoch
        );
        self.last_update_epoch = Some(epoch);
        true
    }

    /// Updates the matrices, then packs the top three rows of each one into
    /// the palette and flags it for upload.
    ///
    /// Repeating an epoch leaves the palette and its version alone.
    pub fn update_matrix_palette(&mut self, hierarchy: &dyn NodeHierarchy, root_node: NodeHandle, epoch: u64) {
        self.update_matrices(hierarchy, root_node, epoch);
        if !self.is_bound() || self.last_palette_epoch == Some(epoch) {
            return;
        }

        let palette = self.palette.palette_mut();
        for (matrix, slot) in self.matrices.iter().zip(palette.chunks_exact_mut(FLOATS_PER_BONE)) {
            for (row, out) in slot.chunks_exact_mut(4).enumerate() {
                out.copy_from_slice(&matrix.row(row).to_array());
            }
        }
        self.palette.upload();
        self.last_palette_epoch = Some(epoch);
    }

    /// Tight world-space box around the bound bone origins.
    ///
    /// `None` while unbound or when the skin has no bones.
    #[must_use]
    pub fn bone_bounds(&self, hierarchy: &dyn NodeHierarchy) -> Option<BoundingBox> {
        if self.root_bone.is_none() || self.bones.is_empty() {
            return None;
        }

        let mut bounds = BoundingBox::empty();
        for &bone in &self.bones {
            let origin: Vec3 = hierarchy.world_matrix(bone).translation.into();
            bounds.expand(origin);
        }
        Some(bounds)
    }

    #[inline]
    #[must_use]
    pub fn skin(&self) -> &Arc<SkinDescriptor> {
        &self.skin
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[NodeHandle] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn root_bone(&self) -> Option<NodeHandle> {
        self.root_bone
    }

    #[inline]
    #[must_use]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    #[inline]
    #[must_use]
    pub fn palette(&self) -> &dyn MatrixPaletteTarget {
        self.palette.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn last_update_epoch(&self) -> Option<u64> {
        self.last_update_epoch
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.root_bone.is_some()
    }

    /// Whether the matrices already reflect `epoch`.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, epoch: u64) -> bool {
        self.is_bound() && self.last_update_epoch == Some(epoch)
    }

    #[must_use]
    pub fn state(&self) -> SkinInstanceState {
        match (self.root_bone, self.last_update_epoch) {
            (None, _) => SkinInstanceState::Unbound,
            (Some(_), None) => SkinInstanceState::Stale,
            (Some(_), Some(_)) => SkinInstanceState::Fresh,
        }
    }
}
