//! Tree nodes and the arena that owns them.

use std::ops::{Index, IndexMut};

use crate::store::PointId;

use super::builder::{Body, Subtree};

/// Index of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// A GNAT node.
///
/// Every node but the root is reached through its pivot. The radius and range
/// bounds are conservative: insertion widens them, removal never tightens them.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// `None` only for the root.
    pub pivot: Option<PointId>,
    /// Number of children this node gets when it splits.
    pub degree: usize,
    /// Min/max distance from the pivot to the other points of this subtree.
    pub min_radius: f64,
    pub max_radius: f64,
    /// Min/max distance from the pivot to the points of each sibling subtree,
    /// indexed by sibling position (this node's own position included).
    pub min_range: Vec<f64>,
    pub max_range: Vec<f64>,
    /// Leaf bucket. Empty on internal nodes.
    pub bucket: Vec<PointId>,
    pub children: Vec<NodeId>,
    /// Live points in the subtree, own pivot included.
    pub live: usize,
    /// Tombstoned ids still sitting in `bucket`.
    pub tombstones: usize,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            pivot: None,
            degree: 0,
            min_radius: f64::INFINITY,
            max_radius: 0.0,
            min_range: Vec::new(),
            max_range: Vec::new(),
            bucket: Vec::new(),
            children: Vec::new(),
            live: 0,
            tombstones: 0,
        }
    }
}

impl Node {
    /// An empty root leaf.
    pub fn root(degree: usize) -> Self {
        Self {
            degree,
            min_radius: 0.0,
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn update_radius(&mut self, dist: f64) {
        if self.min_radius > dist {
            self.min_radius = dist;
        }
        if self.max_radius < dist {
            self.max_radius = dist;
        }
    }

    /// Loosen every bound by `shift`, the distance from the old pivot to a
    /// new one. By the triangle inequality the bounds then hold for the new
    /// pivot.
    pub fn widen(&mut self, shift: f64) {
        self.min_radius = (self.min_radius - shift).max(0.0);
        self.max_radius += shift;
        for (lo, hi) in self.min_range.iter_mut().zip(self.max_range.iter_mut()) {
            *lo = (*lo - shift).max(0.0);
            *hi += shift;
        }
    }

    pub fn update_range(&mut self, sibling: usize, dist: f64) {
        if self.min_range[sibling] > dist {
            self.min_range[sibling] = dist;
        }
        if self.max_range[sibling] < dist {
            self.max_range[sibling] = dist;
        }
    }
}

/// Owns every node of a tree. Freed slots are recycled through a free list.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Free every descendant of `id`, leaving `id` itself allocated with no
    /// children.
    pub fn release_children(&mut self, id: NodeId) {
        let mut stack = std::mem::take(&mut self.nodes[id.0].children);
        while let Some(child) = stack.pop() {
            let node = std::mem::take(&mut self.nodes[child.0]);
            stack.extend(node.children);
            self.free.push(child);
        }
    }

    /// Free `id` and everything below it.
    pub fn release(&mut self, id: NodeId) {
        self.release_children(id);
        self.nodes[id.0] = Node::default();
        self.free.push(id);
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }

    /// Replace the contents of `id` with a freshly built body. The node keeps
    /// its pivot and bounds, which describe it relative to its parent.
    pub fn install(&mut self, id: NodeId, degree: usize, body: Body) {
        self.release_children(id);
        self.nodes[id.0].degree = degree;
        self.nodes[id.0].tombstones = 0;
        match body {
            Body::Leaf(bucket) => {
                self.nodes[id.0].bucket = bucket;
            }
            Body::Internal(subtrees) => {
                self.nodes[id.0].bucket = Vec::new();
                let children = subtrees
                    .into_iter()
                    .map(|subtree| self.alloc_subtree(subtree))
                    .collect();
                self.nodes[id.0].children = children;
            }
        }
    }

    fn alloc_subtree(&mut self, subtree: Subtree) -> NodeId {
        let Subtree {
            pivot,
            degree,
            min_radius,
            max_radius,
            min_range,
            max_range,
            live,
            body,
        } = subtree;
        let id = self.alloc(Node {
            pivot: Some(pivot),
            degree,
            min_radius,
            max_radius,
            min_range,
            max_range,
            live,
            ..Node::default()
        });
        self.install(id, degree, body);
        id
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}
