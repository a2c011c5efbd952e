//! Bone-limit skin partitioning
//!
//! A draw call can only address `bone_limit` matrices in its palette. Skins
//! with more bones are split, at load time, into partitions that each touch
//! at most `bone_limit` distinct bones.
//!
//! # Algorithm
//!
//! Greedy, single pass, deterministic:
//!
//! 1. Gather every triangle of every mesh using the skin, in draw order.
//! 2. For each triangle, collect the distinct bones of its weighted influences.
//! 3. Walk the partitions of the triangle's mesh in creation order and take
//!    the first one where `bone_count + missing_bones <= bone_limit`.
//! 4. If none fits, open a new partition seeded with the triangle.
//!
//! Each partition owns a self-contained bone table: a bone used by two
//! partitions is registered in both. A partition never mixes meshes, so the
//! instances of a mesh are cloned only onto that mesh's partitions.
//!
//! # Output
//!
//! Planning is pure. [`BonePartitioner::plan`] returns a [`ModelPatch`]
//! describing the new skins/geometry/meshes/instances and the entries to
//! remove; [`SkinnedModel::apply_patch`] applies it in one step.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::errors::{Result, SkinError};
use crate::resources::{
    AppliedPatch, IndexBuffer, IndexBufferKey, MaterialMapping, MeshInstanceKey, MeshKey,
    SkinKey, SkinnedModel, VertexAttribute, VertexBuffer, VertexBufferKey, VertexSemantic,
};
use crate::scene::NodeHandle;
use crate::skinning::SkinDescriptor;

/// Bone influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Weighted bones of one vertex; `None` marks a zero-weight slot.
type Influences = [Option<u32>; MAX_INFLUENCES];

/// A vertex copied into a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionVertex {
    /// Index of the vertex in the source vertex buffer
    pub original_index: u32,
    /// Partition-local bone slot per influence, `None` when unused
    pub bone_slots: [Option<u32>; MAX_INFLUENCES],
}

/// One bone-limited chunk of a split skin.
#[derive(Debug, Clone)]
pub struct SkinPartition {
    pub id: usize,
    /// Source mesh of every triangle in this partition
    pub original_mesh: MeshKey,

    // Ranges inside the shared output buffers, filled in when geometry is emitted.
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,

    /// Partition-local slot -> global bone index. Slot order is palette order.
    pub bone_indices: Vec<u32>,
    pub vertices: Vec<PartitionVertex>,
    /// Triangle list in partition-local vertex indices
    pub indices: Vec<u32>,

    index_map: FxHashMap<u32, u32>,
    bone_lookup: FxHashMap<u32, u32>,
}

impl SkinPartition {
    fn new(id: usize, original_mesh: MeshKey) -> Self {
        Self {
            id,
            original_mesh,
            vertex_start: 0,
            vertex_count: 0,
            index_start: 0,
            index_count: 0,
            bone_indices: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            index_map: FxHashMap::default(),
            bone_lookup: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bone_indices.len()
    }

    /// Partition-local index of a source vertex, if the partition holds it.
    #[must_use]
    pub fn local_vertex(&self, original_index: u32) -> Option<u32> {
        self.index_map.get(&original_index).copied()
    }

    /// Global bone index stored in a partition-local slot.
    #[must_use]
    pub fn global_bone(&self, slot: u32) -> Option<u32> {
        self.bone_indices.get(slot as usize).copied()
    }

    fn missing_bones(&self, bones: &[u32]) -> usize {
        bones
            .iter()
            .filter(|bone| !self.bone_lookup.contains_key(bone))
            .count()
    }

    fn register_bone(&mut self, bone: u32) -> u32 {
        if let Some(&slot) = self.bone_lookup.get(&bone) {
            return slot;
        }
        let slot = self.bone_indices.len() as u32;
        self.bone_indices.push(bone);
        self.bone_lookup.insert(bone, slot);
        slot
    }

    fn add_triangle(&mut self, triangle: [u32; 3], influences: &[Influences; 3]) {
        for (corner, &original) in triangle.iter().enumerate() {
            let local = match self.index_map.get(&original) {
                Some(&local) => local,
                None => {
                    let mut bone_slots = [None; MAX_INFLUENCES];
                    for (slot, influence) in bone_slots.iter_mut().zip(influences[corner]) {
                        *slot = influence.map(|bone| self.register_bone(bone));
                    }

                    let local = self.vertices.len() as u32;
                    self.vertices.push(PartitionVertex {
                        original_index: original,
                        bone_slots,
                    });
                    self.index_map.insert(original, local);
                    local
                }
            };
            self.indices.push(local);
        }
    }
}

/// A mesh instance to recreate for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceClone {
    pub source: MeshInstanceKey,
    /// Index into [`SkinPartitioning::partitions`]
    pub partition: usize,
    pub node: NodeHandle,
    pub material: Option<MaterialMapping>,
}

/// Everything produced by splitting one oversized skin.
#[derive(Debug, Clone)]
pub struct SkinPartitioning {
    pub source_skin: SkinKey,
    pub source_meshes: Vec<MeshKey>,
    pub source_instances: Vec<MeshInstanceKey>,

    pub partitions: Vec<SkinPartition>,
    /// One reduced descriptor per partition, same order
    pub skins: Vec<SkinDescriptor>,
    /// One mesh name per partition, same order
    pub mesh_names: Vec<String>,
    /// Vertex data of all partitions, back to back
    pub vertex_buffer: VertexBuffer,
    /// Index data of all partitions, back to back, absolute into `vertex_buffer`
    pub index_buffer: IndexBuffer,
    pub instance_clones: Vec<InstanceClone>,
}

/// The full delta of a partitioning pass.
#[derive(Debug, Clone, Default)]
pub struct ModelPatch {
    pub partitionings: Vec<SkinPartitioning>,
    /// Buffers no remaining mesh draws from once the sources are gone
    pub removed_vertex_buffers: Vec<VertexBufferKey>,
    pub removed_index_buffers: Vec<IndexBufferKey>,
}

impl ModelPatch {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitionings.is_empty()
    }

    pub fn removed_skins(&self) -> impl Iterator<Item = SkinKey> + '_ {
        self.partitionings.iter().map(|p| p.source_skin)
    }

    pub fn removed_meshes(&self) -> impl Iterator<Item = MeshKey> + '_ {
        self.partitionings
            .iter()
            .flat_map(|p| p.source_meshes.iter().copied())
    }

    pub fn removed_mesh_instances(&self) -> impl Iterator<Item = MeshInstanceKey> + '_ {
        self.partitionings
            .iter()
            .flat_map(|p| p.source_instances.iter().copied())
    }
}

struct Triangle {
    mesh: MeshKey,
    vertices: [u32; 3],
}

/// Decodes weighted influences straight from a vertex buffer.
struct InfluenceReader<'a> {
    indices: &'a VertexAttribute,
    weights: &'a VertexAttribute,
    skin: &'a SkinDescriptor,
}

impl<'a> InfluenceReader<'a> {
    fn new(buffer: &'a VertexBuffer, skin: &'a SkinDescriptor) -> Result<Self> {
        let indices = buffer
            .attribute(VertexSemantic::BlendIndices)
            .ok_or(SkinError::MissingSkinningAttribute(VertexSemantic::BlendIndices))?;
        let weights = buffer
            .attribute(VertexSemantic::BlendWeight)
            .ok_or(SkinError::MissingSkinningAttribute(VertexSemantic::BlendWeight))?;
        Ok(Self {
            indices,
            weights,
            skin,
        })
    }

    fn read(&self, vertex: u32) -> Result<Influences> {
        let bones = self
            .indices
            .read_uint4(vertex)
            .ok_or(SkinError::UnsupportedVertexFormat {
                semantic: VertexSemantic::BlendIndices,
                format: self.indices.format,
            })?;
        let weights = self
            .weights
            .read_float4(vertex)
            .ok_or(SkinError::UnsupportedVertexFormat {
                semantic: VertexSemantic::BlendWeight,
                format: self.weights.format,
            })?;

        let mut influences = [None; MAX_INFLUENCES];
        for ((slot, &bone), &weight) in influences.iter_mut().zip(&bones).zip(&weights) {
            // Zero-weight slots place no requirement on the partition.
            if weight <= 0.0 {
                continue;
            }
            if bone as usize >= self.skin.bone_count() {
                return Err(SkinError::BoneIndexOutOfRange {
                    skin: self.skin.name().to_string(),
                    vertex,
                    bone,
                    bone_count: self.skin.bone_count(),
                });
            }
            *slot = Some(bone);
        }
        Ok(influences)
    }
}

/// Splits skins that exceed a per-draw bone budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonePartitioner {
    bone_limit: usize,
}

impl BonePartitioner {
    pub fn new(bone_limit: usize) -> Result<Self> {
        if bone_limit == 0 {
            return Err(SkinError::InvalidBoneLimit(bone_limit));
        }
        Ok(Self { bone_limit })
    }

    #[inline]
    #[must_use]
    pub fn bone_limit(&self) -> usize {
        self.bone_limit
    }

    #[inline]
    #[must_use]
    pub fn needs_partitioning(&self, skin: &SkinDescriptor) -> bool {
        skin.bone_count() > self.bone_limit
    }

    /// Plans and applies the split of every oversized skin in `model`.
    ///
    /// On error the model is left untouched.
    pub fn run(&self, model: &mut SkinnedModel) -> Result<AppliedPatch> {
        let patch = self.plan(model)?;
        if patch.is_empty() {
            return Ok(AppliedPatch::default());
        }
        Ok(model.apply_patch(patch))
    }

    /// Computes the patch splitting every oversized skin, without touching `model`.
    pub fn plan(&self, model: &SkinnedModel) -> Result<ModelPatch> {
        let mut patch = ModelPatch::default();
        for skin_key in model.skins.keys() {
            if let Some(partitioning) = self.partition_skin(model, skin_key)? {
                patch.partitionings.push(partitioning);
            }
        }

        if !patch.is_empty() {
            collect_orphaned_buffers(model, &mut patch);
        }
        Ok(patch)
    }

    /// Splits a single skin. Returns `None` when it already fits the limit.
    pub fn partition_skin(
        &self,
        model: &SkinnedModel,
        skin_key: SkinKey,
    ) -> Result<Option<SkinPartitioning>> {
        let skin = model
            .skins
            .get(skin_key)
            .ok_or(SkinError::DanglingHandle("skin"))?;

        if !self.needs_partitioning(skin) {
            log::debug!(
                "Skin '{}' has {} bones, within limit {}; left as is",
                skin.name(),
                skin.bone_count(),
                self.bone_limit
            );
            return Ok(None);
        }

        let source_meshes = model.meshes_using_skin(skin_key);
        let Some(&first_mesh) = source_meshes.first() else {
            return Err(SkinError::SkinWithoutMeshes {
                skin: skin.name().to_string(),
            });
        };

        let vertex_buffer_key = model.meshes[first_mesh].vertex_buffer;
        if source_meshes
            .iter()
            .any(|&mesh| model.meshes[mesh].vertex_buffer != vertex_buffer_key)
        {
            return Err(SkinError::MismatchedVertexBuffers {
                skin: skin.name().to_string(),
            });
        }
        let vertex_buffer = model
            .vertex_buffers
            .get(vertex_buffer_key)
            .ok_or(SkinError::DanglingHandle("vertex buffer"))?;

        let reader = InfluenceReader::new(vertex_buffer, skin)?;
        let triangles = gather_triangles(model, &source_meshes, vertex_buffer.vertex_count())?;
        let mut partitions = self.assign_triangles(&triangles, &reader)?;
        let (new_vertices, new_indices) = build_geometry(vertex_buffer, &mut partitions)?;

        let skins: Vec<SkinDescriptor> = partitions
            .iter()
            .map(|p| skin.subset(&format!("{}_part{}", skin.name(), p.id), &p.bone_indices))
            .collect();
        let mesh_names: Vec<String> = partitions
            .iter()
            .map(|p| format!("{}_part{}", model.meshes[p.original_mesh].name, p.id))
            .collect();

        let mut source_instances = Vec::new();
        let mut instance_clones = Vec::new();
        for (instance_key, instance) in &model.mesh_instances {
            if !source_meshes.contains(&instance.mesh) {
                continue;
            }
            source_instances.push(instance_key);
            let material = model.material_mappings.get(instance_key).cloned();
            let own_partitions = partitions
                .iter()
                .enumerate()
                .filter(|(_, p)| p.original_mesh == instance.mesh);
            instance_clones.extend(own_partitions.map(|(partition, _)| InstanceClone {
                source: instance_key,
                partition,
                node: instance.node,
                material: material.clone(),
            }));
        }

        log::info!(
            "Partitioned skin '{}' ({} bones, {} triangles) into {} partitions (bone limit {})",
            skin.name(),
            skin.bone_count(),
            triangles.len(),
            partitions.len(),
            self.bone_limit
        );
        for p in &partitions {
            log::debug!(
                "  partition {}: {} bones, {} vertices, {} indices",
                p.id,
                p.bone_count(),
                p.vertex_count,
                p.index_count
            );
        }

        Ok(Some(SkinPartitioning {
            source_skin: skin_key,
            source_meshes,
            source_instances,
            partitions,
            skins,
            mesh_names,
            vertex_buffer: new_vertices,
            index_buffer: new_indices,
            instance_clones,
        }))
    }

    fn assign_triangles(
        &self,
        triangles: &[Triangle],
        reader: &InfluenceReader<'_>,
    ) -> Result<Vec<SkinPartition>> {
        let mut partitions: Vec<SkinPartition> = Vec::new();

        for triangle in triangles {
            let [a, b, c] = triangle.vertices;
            let influences = [reader.read(a)?, reader.read(b)?, reader.read(c)?];

            let mut bones: SmallVec<[u32; 12]> = SmallVec::new();
            for bone in influences.iter().flatten().flatten() {
                if !bones.contains(bone) {
                    bones.push(*bone);
                }
            }
            if bones.len() > self.bone_limit {
                return Err(SkinError::TriangleExceedsBoneLimit {
                    required: bones.len(),
                    limit: self.bone_limit,
                });
            }

            let target = partitions.iter().position(|p| {
                p.original_mesh == triangle.mesh
                    && p.bone_count() + p.missing_bones(&bones) <= self.bone_limit
            });
            let index = target.unwrap_or_else(|| {
                partitions.push(SkinPartition::new(partitions.len(), triangle.mesh));
                partitions.len() - 1
            });
            partitions[index].add_triangle(triangle.vertices, &influences);
        }

        Ok(partitions)
    }
}

fn gather_triangles(
    model: &SkinnedModel,
    meshes: &[MeshKey],
    vertex_count: u32,
) -> Result<Vec<Triangle>> {
    let mut triangles = Vec::new();

    for &mesh_key in meshes {
        let mesh = &model.meshes[mesh_key];
        let start = mesh.primitive.base as usize;
        let end = start + mesh.primitive.count as usize;
        let out_of_range = || SkinError::PrimitiveOutOfRange {
            mesh: mesh.name.clone(),
        };

        let mut push = |vertices: [u32; 3]| -> Result<()> {
            if let Some(&index) = vertices.iter().find(|&&v| v >= vertex_count) {
                return Err(SkinError::VertexIndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
            triangles.push(Triangle {
                mesh: mesh_key,
                vertices,
            });
            Ok(())
        };

        match mesh.index_buffer {
            Some(index_key) => {
                let index_buffer = model
                    .index_buffers
                    .get(index_key)
                    .ok_or(SkinError::DanglingHandle("index buffer"))?;
                let indices = index_buffer.indices.get(start..end).ok_or_else(out_of_range)?;
                for tri in indices.chunks_exact(3) {
                    push([tri[0], tri[1], tri[2]])?;
                }
            }
            None => {
                if end > vertex_count as usize {
                    return Err(out_of_range());
                }
                for first in (start..end).step_by(3).take_while(|i| i + 2 < end) {
                    let first = first as u32;
                    push([first, first + 1, first + 2])?;
                }
            }
        }
    }

    Ok(triangles)
}

/// Lays the partitions out back to back in one vertex buffer and one index
/// buffer, rewriting blend indices to partition-local slots.
fn build_geometry(
    source: &VertexBuffer,
    partitions: &mut [SkinPartition],
) -> Result<(VertexBuffer, IndexBuffer)> {
    let mut vertex_start = 0u32;
    let mut index_start = 0u32;
    let mut indices = Vec::with_capacity(partitions.iter().map(|p| p.indices.len()).sum());

    for partition in partitions.iter_mut() {
        partition.vertex_start = vertex_start;
        partition.vertex_count = partition.vertices.len() as u32;
        partition.index_start = index_start;
        partition.index_count = partition.indices.len() as u32;

        indices.extend(partition.indices.iter().map(|&local| vertex_start + local));

        vertex_start += partition.vertex_count;
        index_start += partition.index_count;
    }
    let total_vertices = vertex_start;

    let mut attributes = Vec::new();
    for source_attr in source.attributes() {
        let mut attr = VertexAttribute::empty_like(source_attr, total_vertices as usize);
        for vertex in partitions.iter().flat_map(|p| &p.vertices) {
            let copied = attr.push_element_from(source_attr, vertex.original_index);
            debug_assert!(copied, "vertex indices are validated while gathering");
        }

        if source_attr.semantic == VertexSemantic::BlendIndices {
            for (i, vertex) in partitions.iter().flat_map(|p| &p.vertices).enumerate() {
                // Unweighted slots write 0, even in a partition without bones.
                // Their zero weight keeps the index inert.
                let slots = vertex.bone_slots.map(|slot| slot.unwrap_or(0));
                if !attr.write_uint4(i as u32, slots) {
                    return Err(SkinError::BlendIndexOverflow {
                        slot: slots.into_iter().max().unwrap_or(0),
                        format: attr.format,
                    });
                }
            }
        }

        attributes.push(attr);
    }

    Ok((
        VertexBuffer::from_sorted_parts(attributes, total_vertices),
        IndexBuffer::new(indices),
    ))
}

fn collect_orphaned_buffers(model: &SkinnedModel, patch: &mut ModelPatch) {
    let removed: FxHashSet<MeshKey> = patch.removed_meshes().collect();

    let mut live_vertex_buffers = FxHashSet::default();
    let mut live_index_buffers = FxHashSet::default();
    for (key, mesh) in &model.meshes {
        if removed.contains(&key) {
            continue;
        }
        live_vertex_buffers.insert(mesh.vertex_buffer);
        if let Some(index_buffer) = mesh.index_buffer {
            live_index_buffers.insert(index_buffer);
        }
    }

    let mut vertex_buffers = Vec::new();
    let mut index_buffers = Vec::new();
    for mesh_key in patch.removed_meshes() {
        let mesh = &model.meshes[mesh_key];
        if !live_vertex_buffers.contains(&mesh.vertex_buffer)
            && !vertex_buffers.contains(&mesh.vertex_buffer)
        {
            vertex_buffers.push(mesh.vertex_buffer);
        }
        if let Some(index_buffer) = mesh.index_buffer
            && !live_index_buffers.contains(&index_buffer)
            && !index_buffers.contains(&index_buffer)
        {
            index_buffers.push(index_buffer);
        }
    }

    patch.removed_vertex_buffers = vertex_buffers;
    patch.removed_index_buffers = index_buffers;
}
