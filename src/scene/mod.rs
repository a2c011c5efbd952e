//! Scene graph module
//!
//! The minimal node hierarchy skinning binds against:
//! - Node: named scene node (hierarchy links plus transform)
//! - Transform: TRS component with cached local/world matrices
//! - NodeTree: arena container with name lookup
//! - NodeHierarchy: the collaborator trait skin instances are written against
//! - TransformSystem: world-matrix propagation

pub mod hierarchy;
pub mod node;
pub mod transform;
pub mod transform_system;
pub mod tree;

pub use hierarchy::NodeHierarchy;
pub use node::Node;
pub use transform::Transform;
pub use tree::NodeTree;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
}
