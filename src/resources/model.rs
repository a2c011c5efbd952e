use std::sync::Arc;

use slotmap::{SecondaryMap, SlotMap};

use crate::resources::{
    IndexBuffer, IndexBufferKey, MaterialMapping, Mesh, MeshInstance, MeshInstanceKey, MeshKey,
    Primitive, SkinKey, VertexBuffer, VertexBufferKey,
};
use crate::skinning::{ModelPatch, SkinDescriptor};

/// Loaded skinned geometry, as produced by an importer.
///
/// Pure data: every pool is a slotmap arena and cross references are keys.
/// Skins are shared read-only with the skin instances that draw them.
#[derive(Debug, Default)]
pub struct SkinnedModel {
    pub vertex_buffers: SlotMap<VertexBufferKey, VertexBuffer>,
    pub index_buffers: SlotMap<IndexBufferKey, IndexBuffer>,
    pub skins: SlotMap<SkinKey, Arc<SkinDescriptor>>,
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub mesh_instances: SlotMap<MeshInstanceKey, MeshInstance>,
    pub material_mappings: SecondaryMap<MeshInstanceKey, MaterialMapping>,
}

/// Keys created by [`SkinnedModel::apply_patch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedPatch {
    pub skins: Vec<SkinKey>,
    pub meshes: Vec<MeshKey>,
    pub mesh_instances: Vec<MeshInstanceKey>,
    pub vertex_buffers: Vec<VertexBufferKey>,
    pub index_buffers: Vec<IndexBufferKey>,
}

impl SkinnedModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex_buffer(&mut self, buffer: VertexBuffer) -> VertexBufferKey {
        self.vertex_buffers.insert(buffer)
    }

    pub fn add_index_buffer(&mut self, buffer: IndexBuffer) -> IndexBufferKey {
        self.index_buffers.insert(buffer)
    }

    pub fn add_skin(&mut self, skin: SkinDescriptor) -> SkinKey {
        self.skins.insert(Arc::new(skin))
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    pub fn add_mesh_instance(
        &mut self,
        instance: MeshInstance,
        material: Option<MaterialMapping>,
    ) -> MeshInstanceKey {
        let key = self.mesh_instances.insert(instance);
        if let Some(material) = material {
            self.material_mappings.insert(key, material);
        }
        key
    }

    /// Meshes whose skin is `skin`, in draw (arena) order.
    #[must_use]
    pub fn meshes_using_skin(&self, skin: SkinKey) -> Vec<MeshKey> {
        self.meshes
            .iter()
            .filter(|(_, mesh)| mesh.skin == Some(skin))
            .map(|(key, _)| key)
            .collect()
    }

    /// Mesh instances placing `mesh`, in arena order.
    #[must_use]
    pub fn instances_of(&self, mesh: MeshKey) -> Vec<MeshInstanceKey> {
        self.mesh_instances
            .iter()
            .filter(|(_, instance)| instance.mesh == mesh)
            .map(|(key, _)| key)
            .collect()
    }

    /// Applies a partitioning patch.
    ///
    /// All removals happen before any insertion, so the model never holds a
    /// source skin next to its partitions.
    pub fn apply_patch(&mut self, patch: ModelPatch) -> AppliedPatch {
        for instance in patch.removed_mesh_instances() {
            self.mesh_instances.remove(instance);
            self.material_mappings.remove(instance);
        }
        for mesh in patch.removed_meshes() {
            self.meshes.remove(mesh);
        }
        for skin in patch.removed_skins() {
            self.skins.remove(skin);
        }
        for &buffer in &patch.removed_vertex_buffers {
            self.vertex_buffers.remove(buffer);
        }
        for &buffer in &patch.removed_index_buffers {
            self.index_buffers.remove(buffer);
        }

        let mut applied = AppliedPatch::default();
        for partitioning in patch.partitionings {
            let vertex_buffer = self.vertex_buffers.insert(partitioning.vertex_buffer);
            let index_buffer = self.index_buffers.insert(partitioning.index_buffer);
            applied.vertex_buffers.push(vertex_buffer);
            applied.index_buffers.push(index_buffer);

            let mut meshes = Vec::with_capacity(partitioning.partitions.len());
            let parts = partitioning
                .partitions
                .iter()
                .zip(partitioning.skins)
                .zip(partitioning.mesh_names);
            for ((partition, skin), name) in parts {
                let skin_key = self.skins.insert(Arc::new(skin));
                let mesh = Mesh::new(
                    &name,
                    vertex_buffer,
                    Primitive::new(partition.index_start, partition.index_count),
                )
                .with_indices(index_buffer)
                .with_skin(skin_key);
                let mesh_key = self.meshes.insert(mesh);

                applied.skins.push(skin_key);
                applied.meshes.push(mesh_key);
                meshes.push(mesh_key);
            }

            for clone in partitioning.instance_clones {
                let key = self.add_mesh_instance(
                    MeshInstance::new(meshes[clone.partition], clone.node),
                    clone.material,
                );
                applied.mesh_instances.push(key);
            }
        }

        log::debug!(
            "Applied patch: +{} skins, +{} meshes, +{} mesh instances",
            applied.skins.len(),
            applied.meshes.len(),
            applied.mesh_instances.len()
        );
        applied
    }
}
