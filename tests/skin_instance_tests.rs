//! Skin Instance Tests
//!
//! Tests for:
//! - Bone binding by name, with fallback on misses
//! - Epoch-gated matrix recomputation
//! - Matrix composition order and 3x4 palette packing
//! - Texture vs. buffer palette storage
//! - Skin instance sharing through the cache

use std::cell::Cell;
use std::sync::Arc;

use glam::{Affine3A, Mat4, Quat, Vec3};
use myth_skin::scene::{NodeHandle, NodeHierarchy, NodeTree};
use myth_skin::settings::SkinningSettings;
use myth_skin::skinning::{
    DefaultPaletteAllocator, MatrixPaletteTarget, SkinDescriptor, SkinInstance, SkinInstanceCache,
    SkinInstanceState, bone_texture_size,
};

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn mat4_approx(a: Mat4, b: Mat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| approx_eq(*x, *y))
}

fn identity_skin(names: &[&str]) -> Arc<SkinDescriptor> {
    let bone_names = names.iter().map(|n| (*n).to_string()).collect();
    let matrices = vec![Affine3A::IDENTITY; names.len()];
    Arc::new(SkinDescriptor::new("Rig", bone_names, matrices).unwrap())
}

/// Armature -> Hips -> Spine -> Head, plus a detached "Prop" root.
struct Rig {
    tree: NodeTree,
    armature: NodeHandle,
    hips: NodeHandle,
    spine: NodeHandle,
    head: NodeHandle,
    prop: NodeHandle,
}

fn rig() -> Rig {
    let mut tree = NodeTree::new();
    let armature = tree.create_node_with_name("Armature");
    let hips = tree.add_child("Hips", armature);
    let spine = tree.add_child("Spine", hips);
    let head = tree.add_child("Head", spine);
    let prop = tree.create_node_with_name("Prop");
    tree.update_matrix_world();
    Rig {
        tree,
        armature,
        hips,
        spine,
        head,
        prop,
    }
}

/// Delegates to a tree and counts world-matrix queries.
struct CountingHierarchy<'a> {
    tree: &'a NodeTree,
    world_queries: Cell<usize>,
}

impl<'a> CountingHierarchy<'a> {
    fn new(tree: &'a NodeTree) -> Self {
        Self {
            tree,
            world_queries: Cell::new(0),
        }
    }
}

impl NodeHierarchy for CountingHierarchy<'_> {
    fn find_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.tree.find_by_name(root, name)
    }

    fn world_matrix(&self, node: NodeHandle) -> Affine3A {
        self.world_queries.set(self.world_queries.get() + 1);
        self.tree.world_matrix(node)
    }
}

fn bound_instance(rig: &Rig, names: &[&str]) -> SkinInstance {
    let mut instance = SkinInstance::new(identity_skin(names), &DefaultPaletteAllocator::default());
    instance.bind(&rig.tree, rig.armature, rig.armature);
    instance
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn bind_resolves_bones_in_descriptor_order() {
    let r = rig();
    let instance = bound_instance(&r, &["Head", "Hips", "Spine"]);

    assert_eq!(instance.bones(), &[r.head, r.hips, r.spine]);
    assert_eq!(instance.root_bone(), Some(r.armature));
    assert!(instance.is_bound());
}

#[test]
fn missing_bone_is_replaced_by_fallback() {
    let _ = env_logger::builder().is_test(true).try_init();
    let r = rig();
    let mut instance = SkinInstance::new(
        identity_skin(&["Hips", "Tail", "Head"]),
        &DefaultPaletteAllocator::default(),
    );

    instance.bind(&r.tree, r.armature, r.hips);

    assert_eq!(instance.bones(), &[r.hips, r.hips, r.head]);
    instance.update_matrix_palette(&r.tree, r.armature, 1);
    assert_eq!(instance.palette().palette().len(), 36);
}

#[test]
fn bind_only_searches_below_the_root_bone() {
    let r = rig();
    let mut instance = SkinInstance::new(
        identity_skin(&["Spine", "Prop"]),
        &DefaultPaletteAllocator::default(),
    );

    instance.bind(&r.tree, r.hips, r.hips);

    assert_eq!(instance.bones(), &[r.spine, r.hips]);
    assert_ne!(instance.bones()[1], r.prop);
}

#[test]
fn state_follows_bind_and_updates() {
    let r = rig();
    let mut instance = SkinInstance::new(identity_skin(&["Hips"]), &DefaultPaletteAllocator::default());
    assert_eq!(instance.state(), SkinInstanceState::Unbound);

    instance.bind(&r.tree, r.armature, r.armature);
    assert_eq!(instance.state(), SkinInstanceState::Stale);

    instance.update_matrices(&r.tree, r.armature, 7);
    assert_eq!(instance.state(), SkinInstanceState::Fresh);
    assert!(instance.is_fresh(7));
    assert!(!instance.is_fresh(8));

    // Rebinding invalidates the memo.
    instance.bind(&r.tree, r.armature, r.armature);
    assert_eq!(instance.state(), SkinInstanceState::Stale);
    assert_eq!(instance.last_update_epoch(), None);
}

#[test]
fn updating_an_unbound_instance_does_nothing() {
    let r = rig();
    let mut instance = SkinInstance::new(identity_skin(&["Hips"]), &DefaultPaletteAllocator::default());

    assert!(!instance.update_matrices(&r.tree, r.armature, 1));
    instance.update_matrix_palette(&r.tree, r.armature, 1);
    assert_eq!(instance.palette().version(), 0);
    assert!(instance.bone_bounds(&r.tree).is_none());
}

// ============================================================================
// Epoch Memoization
// ============================================================================

#[test]
fn same_epoch_recomputes_once() {
    let r = rig();
    let mut instance = bound_instance(&r, &["Hips", "Spine", "Head"]);
    let counting = CountingHierarchy::new(&r.tree);

    assert!(instance.update_matrices(&counting, r.armature, 1));
    // One query for the root plus one per bone.
    assert_eq!(counting.world_queries.get(), 4);

    assert!(!instance.update_matrices(&counting, r.armature, 1));
    instance.update_matrix_palette(&counting, r.armature, 1);
    assert_eq!(counting.world_queries.get(), 4);

    assert!(instance.update_matrices(&counting, r.armature, 2));
    assert_eq!(counting.world_queries.get(), 8);
}

#[test]
fn palette_uploads_once_per_epoch() {
    let r = rig();
    let mut instance = bound_instance(&r, &["Hips", "Spine"]);

    instance.update_matrix_palette(&r.tree, r.armature, 10);
    instance.update_matrix_palette(&r.tree, r.armature, 10);
    assert_eq!(instance.palette().version(), 1);

    instance.update_matrix_palette(&r.tree, r.armature, 11);
    assert_eq!(instance.palette().version(), 2);
}

#[test]
fn palette_is_packed_after_a_matrices_only_update() {
    let mut r = rig();
    r.tree.get_node_mut(r.hips).unwrap().transform.position = Vec3::new(0.0, 2.0, 0.0);
    r.tree.update_matrix_world();
    let mut instance = bound_instance(&r, &["Hips"]);

    assert!(instance.update_matrices(&r.tree, r.armature, 5));
    assert_eq!(instance.palette().version(), 0);

    instance.update_matrix_palette(&r.tree, r.armature, 5);
    assert_eq!(instance.palette().version(), 1);
    assert!(approx_eq(instance.palette().palette()[7], 2.0));
}

#[test]
fn stale_pose_is_kept_until_a_new_epoch() {
    let mut r = rig();
    let mut instance = bound_instance(&r, &["Hips"]);
    instance.update_matrix_palette(&r.tree, r.armature, 1);

    r.tree.get_node_mut(r.hips).unwrap().transform.position = Vec3::new(0.0, 3.0, 0.0);
    r.tree.update_matrix_world();

    instance.update_matrix_palette(&r.tree, r.armature, 1);
    assert!(approx_eq(instance.palette().palette()[7], 0.0));

    instance.update_matrix_palette(&r.tree, r.armature, 2);
    assert!(approx_eq(instance.palette().palette()[7], 3.0));
}

// ============================================================================
// Matrix Composition & Palette Packing
// ============================================================================

#[test]
fn identity_skin_packs_identity_rows() {
    let r = rig();
    let mut instance = bound_instance(&r, &["Hips", "Spine", "Head"]);

    instance.update_matrix_palette(&r.tree, r.armature, 1);

    let expected: [f32; 12] = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let palette = instance.palette().palette();
    assert_eq!(palette.len(), 3 * 12);
    for bone in palette.chunks_exact(12) {
        assert_eq!(bone, &expected);
    }
}

#[test]
fn bind_pose_yields_identity_relative_to_root() {
    let mut r = rig();
    {
        let armature = &mut r.tree.get_node_mut(r.armature).unwrap().transform;
        armature.position = Vec3::new(5.0, 0.0, 0.0);
        armature.rotation = Quat::from_rotation_y(0.5);
    }
    r.tree.get_node_mut(r.hips).unwrap().transform.position = Vec3::new(0.0, 3.0, 0.0);
    r.tree.update_matrix_world();

    // Bind pose of Hips relative to the armature is a (0, 3, 0) offset.
    let skin = SkinDescriptor::new(
        "Rig",
        vec!["Hips".to_string()],
        vec![Affine3A::from_translation(Vec3::new(0.0, -3.0, 0.0))],
    )
    .unwrap();
    let mut instance = SkinInstance::new(Arc::new(skin), &DefaultPaletteAllocator::default());
    instance.bind(&r.tree, r.armature, r.armature);

    instance.update_matrix_palette(&r.tree, r.armature, 1);
    assert!(mat4_approx(instance.matrices()[0], Mat4::IDENTITY));

    // Raise the hips by one unit: the palette carries a +1 Y translation.
    r.tree.get_node_mut(r.hips).unwrap().transform.position = Vec3::new(0.0, 4.0, 0.0);
    r.tree.update_matrix_world();
    instance.update_matrix_palette(&r.tree, r.armature, 2);

    let palette = instance.palette().palette();
    assert!(approx_eq(palette[3], 0.0));
    assert!(approx_eq(palette[7], 1.0));
    assert!(approx_eq(palette[11], 0.0));
}

#[test]
fn composition_applies_root_correction_before_inverse_bind() {
    let mut r = rig();
    {
        let armature = &mut r.tree.get_node_mut(r.armature).unwrap().transform;
        armature.position = Vec3::new(2.0, -1.0, 4.0);
        armature.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
    }
    {
        let hips = &mut r.tree.get_node_mut(r.hips).unwrap().transform;
        hips.position = Vec3::new(1.0, 2.0, 0.0);
        hips.rotation = Quat::from_rotation_x(0.3);
    }
    r.tree.update_matrix_world();

    let ibm = Affine3A::from_scale_rotation_translation(
        Vec3::splat(2.0),
        Quat::from_rotation_y(0.7),
        Vec3::new(0.0, 0.0, -3.0),
    );
    let skin = SkinDescriptor::new("Rig", vec!["Hips".to_string()], vec![ibm]).unwrap();
    let mut instance = SkinInstance::new(Arc::new(skin), &DefaultPaletteAllocator::default());
    instance.bind(&r.tree, r.armature, r.armature);
    instance.update_matrix_palette(&r.tree, r.armature, 1);

    let root = r.tree.world_matrix(r.armature);
    let bone = r.tree.world_matrix(r.hips);
    let expected = Mat4::from(root.inverse() * bone * ibm);
    let wrong = Mat4::from(ibm * root.inverse() * bone);

    assert!(mat4_approx(instance.matrices()[0], expected));
    assert!(!mat4_approx(instance.matrices()[0], wrong));

    let palette = instance.palette().palette();
    for row in 0..3 {
        let packed = &palette[row * 4..row * 4 + 4];
        let reference = expected.row(row).to_array();
        for (a, b) in packed.iter().zip(reference.iter()) {
            assert!(approx_eq(*a, *b), "row {row}: {packed:?} vs {reference:?}");
        }
    }
}

#[test]
fn bone_bounds_cover_bone_origins() {
    let mut r = rig();
    r.tree.get_node_mut(r.hips).unwrap().transform.position = Vec3::new(0.0, 1.0, 0.0);
    r.tree.get_node_mut(r.spine).unwrap().transform.position = Vec3::new(1.0, 1.0, 0.0);
    r.tree.get_node_mut(r.head).unwrap().transform.position = Vec3::new(0.0, 0.5, -2.0);
    r.tree.update_matrix_world();

    let instance = bound_instance(&r, &["Hips", "Spine", "Head"]);
    let bounds = instance.bone_bounds(&r.tree).unwrap();

    assert_eq!(bounds.min, Vec3::new(0.0, 1.0, -2.0));
    assert_eq!(bounds.max, Vec3::new(1.0, 2.5, 0.0));
}

// ============================================================================
// Palette Storage
// ============================================================================

#[test]
fn texture_palette_is_padded_to_whole_rows() {
    let r = rig();
    let names = ["Hips", "Spine", "Head", "Hips", "Spine"];
    let instance = bound_instance(&r, &names);
    let target = instance.palette();

    // 15 texels -> 6 wide (multiple of 3), 3 rows
    assert_eq!(bone_texture_size(5), (6, 3));
    assert_eq!(target.bone_count(), 5);
    assert_eq!(target.palette().len(), 60);
    assert_eq!(target.as_bytes().len(), 6 * 3 * 4 * 4);
}

#[test]
fn buffer_palette_is_exactly_twelve_floats_per_bone() {
    let r = rig();
    let settings = SkinningSettings::default().with_bone_textures(false);
    let mut instance = SkinInstance::new(
        identity_skin(&["Hips", "Spine", "Head", "Hips", "Spine"]),
        &settings.palette_allocator(),
    );
    instance.bind(&r.tree, r.armature, r.armature);
    instance.update_matrix_palette(&r.tree, r.armature, 1);

    let target = instance.palette();
    assert_eq!(target.palette().len(), 60);
    assert_eq!(target.as_bytes().len(), 60 * 4);
    let identity_rows: [f32; 12] = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    assert_eq!(&target.palette()[..12], &identity_rows);
}

// ============================================================================
// Instance Cache
// ============================================================================

#[test]
fn cache_shares_instances_per_root_and_skin() {
    let r = rig();
    let skin = identity_skin(&["Hips", "Spine"]);
    let other_skin = identity_skin(&["Hips", "Spine"]);
    let allocator = DefaultPaletteAllocator::default();
    let mut cache = SkinInstanceCache::new();

    let a = cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);
    let b = cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);
    let c = cache.acquire(&skin, &r.tree, r.hips, r.hips, &allocator);
    let d = cache.acquire(&other_skin, &r.tree, r.armature, r.armature, &allocator);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.ref_count(a), 2);
    assert_eq!(cache.get(a).unwrap().bones(), &[r.hips, r.spine]);
}

#[test]
fn cache_drops_instance_on_last_release() {
    let r = rig();
    let skin = identity_skin(&["Hips"]);
    let allocator = DefaultPaletteAllocator::default();
    let mut cache = SkinInstanceCache::new();

    let key = cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);
    cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);

    assert!(!cache.release(key));
    assert!(cache.get(key).is_some());
    assert!(cache.release(key));
    assert!(cache.get(key).is_none());
    assert!(cache.is_empty());
    assert!(!cache.release(key));

    // A fresh acquire after release creates a new instance.
    let again = cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);
    assert_ne!(again, key);
    assert_eq!(cache.ref_count(again), 1);
}

#[test]
fn cached_instances_update_independently() {
    let r = rig();
    let skin = identity_skin(&["Hips"]);
    let allocator = DefaultPaletteAllocator::default();
    let mut cache = SkinInstanceCache::new();
    let a = cache.acquire(&skin, &r.tree, r.armature, r.armature, &allocator);
    let b = cache.acquire(&skin, &r.tree, r.hips, r.hips, &allocator);

    for (_, instance) in cache.iter_mut() {
        let root = instance.root_bone().unwrap();
        instance.update_matrix_palette(&r.tree, root, 1);
    }
    assert_eq!(cache.get(a).unwrap().palette().version(), 1);
    assert_eq!(cache.get_mut(b).unwrap().palette().version(), 1);
}
