//! Priority queues for branch-and-bound search; handles f64 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::store::PointId;

use super::node::NodeId;

/// A candidate result: a point id and its distance to the query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f64,
    pub id: PointId,
}

impl Candidate {
    pub fn new(id: PointId, distance: f64) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Closer first; equal distances fall back to insertion order.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Receives candidates during a traversal and exposes the current pruning
/// radius.
pub(crate) trait Collector {
    /// Distance beyond which nothing can be collected any more.
    fn bound(&self) -> f64;

    fn offer(&mut self, candidate: Candidate);
}

/// Keeps the `k` best candidates. The worst kept candidate sits on top of the
/// max-heap. Storage grows with the candidates offered, not with `k`.
const PREALLOCATED: usize = 64;

pub(crate) struct KNearest {
    heap: BinaryHeap<Candidate>,
    k: usize,
}

impl KNearest {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k.min(PREALLOCATED).saturating_add(1)),
            k,
        }
    }

    /// Drain into a sorted Vec (ascending by distance, then id).
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

impl Collector for KNearest {
    fn bound(&self) -> f64 {
        match self.heap.peek() {
            Some(worst) if self.heap.len() >= self.k => worst.distance,
            _ => f64::INFINITY,
        }
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }
}

/// Collects every candidate within a fixed radius (inclusive).
pub(crate) struct WithinRadius {
    radius: f64,
    found: Vec<Candidate>,
}

impl WithinRadius {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            found: Vec::new(),
        }
    }

    pub fn into_sorted_vec(mut self) -> Vec<Candidate> {
        self.found.sort();
        self.found
    }
}

impl Collector for WithinRadius {
    fn bound(&self) -> f64 {
        self.radius
    }

    fn offer(&mut self, candidate: Candidate) {
        if candidate.distance <= self.radius {
            self.found.push(candidate);
        }
    }
}

/// A node waiting to be visited, keyed by a lower bound on the distance from
/// the query to anything in its subtree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingNode {
    pub lower_bound: f64,
    pub node: NodeId,
}

impl PartialEq for PendingNode {
    fn eq(&self, other: &Self) -> bool {
        self.lower_bound.total_cmp(&other.lower_bound) == Ordering::Equal
    }
}

impl Eq for PendingNode {}

impl PartialOrd for PendingNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that BinaryHeap pops the smallest bound first.
impl Ord for PendingNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.lower_bound.total_cmp(&self.lower_bound)
    }
}

/// Min-heap of nodes to visit (smallest lower bound on top).
pub(crate) struct NodeQueue {
    heap: BinaryHeap<PendingNode>,
}

impl NodeQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, node: NodeId, lower_bound: f64) {
        self.heap.push(PendingNode { lower_bound, node });
    }

    pub fn pop(&mut self) -> Option<PendingNode> {
        self.heap.pop()
    }
}
