use glam::Affine3A;
use uuid::Uuid;

use crate::errors::{Result, SkinError};

/// Immutable bone list of a mesh topology.
///
/// `bone_names[i]` and `inverse_bind_matrices[i]` describe joint `i`, which
/// is also the slot the joint's matrix occupies in a matrix palette.
/// Descriptors are shared read-only (behind an `Arc`) by every skin instance
/// that draws the topology; nothing mutates one after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinDescriptor {
    id: Uuid,
    name: String,
    bone_names: Vec<String>,
    inverse_bind_matrices: Vec<Affine3A>,
}

impl SkinDescriptor {
    pub fn new(
        name: &str,
        bone_names: Vec<String>,
        inverse_bind_matrices: Vec<Affine3A>,
    ) -> Result<Self> {
        if bone_names.len() != inverse_bind_matrices.len() {
            return Err(SkinError::DescriptorLengthMismatch {
                name: name.to_string(),
                bone_names: bone_names.len(),
                matrices: inverse_bind_matrices.len(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bone_names,
            inverse_bind_matrices,
        })
    }

    /// Identity used by instance caches; unique per construction.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bone_names.len()
    }

    #[inline]
    #[must_use]
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrices(&self) -> &[Affine3A] {
        &self.inverse_bind_matrices
    }

    /// Reduced descriptor holding `bone_indices` in the given order.
    ///
    /// Callers guarantee every index is in range.
    pub(crate) fn subset(&self, name: &str, bone_indices: &[u32]) -> Self {
        let (bone_names, inverse_bind_matrices) = bone_indices
            .iter()
            .map(|&i| {
                let i = i as usize;
                (self.bone_names[i].clone(), self.inverse_bind_matrices[i])
            })
            .unzip();

        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bone_names,
            inverse_bind_matrices,
        }
    }
}
