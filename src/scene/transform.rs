use glam::{Affine3A, Quat, Vec3};

/// Transform component
///
/// A node's position, rotation and scale (TRS) plus the cached local and
/// world matrices. The `last_*` fields shadow the TRS values so the local
/// matrix is only rebuilt when one of them moved.
#[derive(Debug, Clone)]
pub struct Transform {
    // === TRS ===
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    // === Matrix Cache ===
    // Written by the transform system, read through `NodeHierarchy`.
    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    // === Shadow State ===
    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,

            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,

            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    // ========================================================================
    // Local Matrix
    // ========================================================================

    /// Rebuilds the local matrix if any TRS component changed.
    ///
    /// Returns whether the local matrix was recomputed.
    pub fn update_local_matrix(&mut self) -> bool {
        // 1. Compare TRS against the shadow copy
        let changed = self.force_update
            || self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale;

        if !changed {
            return false;
        }

        // 2. Rebuild
        self.local_matrix =
            Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);

        // 3. Refresh the shadow copy
        self.last_position = self.position;
        self.last_rotation = self.rotation;
        self.last_scale = self.scale;
        self.force_update = false;
        true
    }

    /// Sets the local matrix directly (e.g. bind poses from an importer).
    ///
    /// The matrix is decomposed back into position/rotation/scale; shear is lost.
    pub fn apply_local_matrix(&mut self, mat: Affine3A) {
        // 1. Take the matrix as is
        self.local_matrix = mat;

        // 2. Decompose into TRS, shadow copy included
        let (scale, rotation, translation) = mat.to_scale_rotation_translation();
        self.scale = scale;
        self.rotation = rotation;
        self.position = translation;
        self.last_scale = scale;
        self.last_rotation = rotation;
        self.last_position = translation;

        // 3. Children still need the new world matrix
        self.mark_dirty();
    }

    /// Forces the next `update_local_matrix` to report a change.
    pub fn mark_dirty(&mut self) {
        self.force_update = true;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    /// World matrix as computed by the last hierarchy update.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    pub fn set_world_matrix(&mut self, mat: Affine3A) {
        self.world_matrix = mat;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
