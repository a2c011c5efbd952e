use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::hierarchy::NodeHierarchy;
use crate::scene::node::Node;
use crate::scene::transform_system;
use crate::scene::NodeHandle;

/// Arena-backed node hierarchy.
///
/// Nodes live in a [`SlotMap`] and refer to each other by [`NodeHandle`], so
/// removing a node never invalidates handles held elsewhere (they simply stop
/// resolving).
#[derive(Debug, Default)]
pub struct NodeTree {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
}

impl NodeTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
        }
    }

    /// Adds a node at the root level.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    /// Creates a named root node.
    pub fn create_node_with_name(&mut self, name: &str) -> NodeHandle {
        self.add_node(Node::new(name))
    }

    /// Creates a named node directly under `parent`.
    pub fn add_child(&mut self, name: &str, parent: NodeHandle) -> NodeHandle {
        let handle = self.create_node_with_name(name);
        self.attach(handle, parent);
        handle
    }

    /// Re-parents `child` under `parent`.
    ///
    /// Attaching a node to itself or to one of its own descendants is refused.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent || self.is_ancestor_of(child, parent) {
            log::warn!("Refusing to attach {child:?} under {parent:?}: would create a cycle");
            return;
        }
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            log::error!("Attach failed: unknown node handle");
            return;
        }

        self.detach_from_parent(child);

        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.transform.mark_dirty();
    }

    /// Moves `child` back to the root level.
    pub fn detach(&mut self, child: NodeHandle) {
        if !self.nodes.contains_key(child) {
            return;
        }
        self.detach_from_parent(child);
        self.nodes[child].parent = None;
        self.nodes[child].transform.mark_dirty();
        self.root_nodes.push(child);
    }

    fn detach_from_parent(&mut self, child: NodeHandle) {
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p)
                && let Some(i) = n.children.iter().position(|&x| x == child)
            {
                n.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&x| x == child) {
            self.root_nodes.remove(i);
        }
    }

    /// Removes a node and its whole subtree.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        if !self.nodes.contains_key(handle) {
            return;
        }
        self.detach_from_parent(handle);

        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
    }

    fn is_ancestor_of(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.nodes.get(node).and_then(Node::parent);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.nodes.get(handle).and_then(Node::parent);
        }
        false
    }

    #[inline]
    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn get_name(&self, handle: NodeHandle) -> Option<&str> {
        self.nodes.get(handle).map(|n| n.name.as_str())
    }

    /// Recomputes world matrices for the whole tree. Call once per frame.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy(&mut self.nodes, &self.root_nodes);
    }

    pub fn update_subtree(&mut self, root: NodeHandle) {
        transform_system::update_subtree(&mut self.nodes, root);
    }
}

impl NodeHierarchy for NodeTree {
    fn find_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if node.name == name {
                return Some(handle);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    fn world_matrix(&self, node: NodeHandle) -> Affine3A {
        self.nodes
            .get(node)
            .map_or(Affine3A::IDENTITY, |n| n.transform.world_matrix)
    }
}
