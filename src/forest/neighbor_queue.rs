//! Priority queues for forest search: handles f32 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A neighbor entry with a distance and item ID.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f32,
    pub id: usize,
}

impl Neighbor {
    pub fn new(id: usize, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}

impl Eq for Neighbor {}

// Max-heap ordering: largest distance on top, higher ID loses ties so that
// equal-distance results come out lowest ID first.
impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Max-heap of neighbors (largest distance on top). Keeps the closest `k` seen so far.
pub struct MaxHeap {
    heap: BinaryHeap<Neighbor>,
}

impl MaxHeap {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Push and pop the max if size exceeds limit, keeping only the closest `limit` neighbors.
    pub fn push_bounded(&mut self, n: Neighbor, limit: usize) {
        self.heap.push(n);
        if self.heap.len() > limit {
            self.heap.pop();
        }
    }

    pub fn peek(&self) -> Option<&Neighbor> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a sorted Vec (ascending by distance, then ID).
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}

impl Default for MaxHeap {
    fn default() -> Self {
        Self::new()
    }
}

/// A subtree waiting to be explored, keyed by how far the query is from its boundary.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    pub node: usize,
    pub priority: f32,
}

impl Branch {
    pub fn new(node: usize, priority: f32) -> Self {
        Self { node, priority }
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Highest priority first; on ties the lower node index pops first.
impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Best-first frontier over tree branches.
pub struct Frontier {
    heap: BinaryHeap<Branch>,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, branch: Branch) {
        self.heap.push(branch);
    }

    pub fn pop(&mut self) -> Option<Branch> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
