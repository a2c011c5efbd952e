use glam::Affine3A;

use crate::scene::NodeHandle;

/// The scene-graph surface that skinning depends on.
///
/// [`SkinInstance`](crate::skinning::SkinInstance) never owns nodes; it only
/// resolves names to handles at bind time and reads world matrices per frame.
/// [`NodeTree`](crate::scene::NodeTree) is the engine implementation, tests
/// can supply their own.
pub trait NodeHierarchy {
    /// Finds `name` in the subtree rooted at `root` (the root itself included).
    ///
    /// When several nodes share a name, the first one in depth-first
    /// pre-order wins.
    fn find_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle>;

    /// Current world transform of `node`.
    ///
    /// Unknown handles yield the identity; callers guarantee liveness.
    fn world_matrix(&self, node: NodeHandle) -> Affine3A;
}
