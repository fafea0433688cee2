//! Random projection trees: construction and best-first traversal.
//!
//! Each tree recursively splits the item set with a hyperplane chosen by a
//! sampled two-means clustering of the items under the node, the approach used
//! by Annoy. Queries walk all trees at once through a shared priority queue
//! keyed by the query's margin to every hyperplane on the path.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::vector::Vector;

use super::neighbor_queue::{Branch, Frontier};

/// Sample count for the two-means centroid refinement.
const TWO_MEANS_ITERATIONS: usize = 200;

/// A node of a random projection tree. Nodes of all trees share one arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum TreeNode {
    Leaf {
        items: Vec<usize>,
    },
    /// `normal` is empty for a degenerate split, which sends queries both ways.
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: usize,
        right: usize,
    },
}

/// A forest of random projection trees over a set of item vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Forest {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
}

impl Forest {
    /// Build `n_trees` trees over every present item.
    pub(crate) fn build(
        items: &[Option<Vector>],
        metric: DistanceMetric,
        n_trees: usize,
        leaf_size: usize,
        rng: &mut StdRng,
    ) -> Self {
        let ids: Vec<usize> = items
            .iter()
            .enumerate()
            .filter_map(|(id, v)| v.as_ref().map(|_| id))
            .collect();

        let mut forest = Forest::default();
        for _ in 0..n_trees {
            let root = forest.build_tree(items, ids.clone(), metric, leaf_size.max(1), rng);
            forest.roots.push(root);
        }
        forest
    }

    pub(crate) fn n_trees(&self) -> usize {
        self.roots.len()
    }

    pub(crate) fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Check that every child and leaf reference stays in bounds.
    pub(crate) fn is_consistent(&self, n_items: usize) -> bool {
        let n_nodes = self.nodes.len();
        self.roots.iter().all(|&r| r < n_nodes)
            && self.nodes.iter().all(|node| match node {
                TreeNode::Leaf { items } => items.iter().all(|&id| id < n_items),
                TreeNode::Split { left, right, .. } => *left < n_nodes && *right < n_nodes,
            })
    }

    fn push_placeholder(&mut self) -> usize {
        self.nodes.push(TreeNode::Leaf { items: Vec::new() });
        self.nodes.len() - 1
    }

    fn build_tree(
        &mut self,
        items: &[Option<Vector>],
        ids: Vec<usize>,
        metric: DistanceMetric,
        leaf_size: usize,
        rng: &mut StdRng,
    ) -> usize {
        let root = self.push_placeholder();
        let mut stack = vec![(root, ids)];

        while let Some((slot, ids)) = stack.pop() {
            if ids.len() <= leaf_size {
                self.nodes[slot] = TreeNode::Leaf { items: ids };
                continue;
            }

            let (normal, offset) = split_plane(items, &ids, metric, rng);
            let (mut left_ids, mut right_ids) = (Vec::new(), Vec::new());
            for &id in &ids {
                let v = vector_of(items, id);
                if margin(&normal, offset, v) > 0.0 {
                    right_ids.push(id);
                } else {
                    left_ids.push(id);
                }
            }

            let (normal, offset) = if left_ids.is_empty() || right_ids.is_empty() {
                // Every item landed on one side: split evenly and let queries
                // explore both halves.
                let mid = ids.len() / 2;
                left_ids = ids[..mid].to_vec();
                right_ids = ids[mid..].to_vec();
                (Vec::new(), 0.0)
            } else {
                (normal, offset)
            };

            let left = self.push_placeholder();
            let right = self.push_placeholder();
            self.nodes[slot] = TreeNode::Split {
                normal,
                offset,
                left,
                right,
            };
            stack.push((right, right_ids));
            stack.push((left, left_ids));
        }

        root
    }

    /// Collect candidate item IDs for `query`, best-first across all trees.
    ///
    /// Stops once `search_k` leaf entries have been visited and at least
    /// `min_unique` distinct items are known, or the trees are exhausted.
    pub(crate) fn candidates(&self, query: &[f32], search_k: usize, min_unique: usize) -> Vec<usize> {
        let mut frontier = Frontier::new();
        for &root in &self.roots {
            frontier.push(Branch::new(root, f32::INFINITY));
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut visited = 0;

        while visited < search_k || found.len() < min_unique {
            let Some(branch) = frontier.pop() else {
                break;
            };
            match &self.nodes[branch.node] {
                TreeNode::Leaf { items } => {
                    visited += items.len();
                    for &id in items {
                        if seen.insert(id) {
                            found.push(id);
                        }
                    }
                }
                TreeNode::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    let m = margin(normal, *offset, query);
                    frontier.push(Branch::new(*right, branch.priority.min(m)));
                    frontier.push(Branch::new(*left, branch.priority.min(-m)));
                }
            }
        }

        found
    }
}

fn vector_of(items: &[Option<Vector>], id: usize) -> &[f32] {
    items[id].as_ref().map(|v| v.as_slice()).unwrap_or(&[])
}

/// Signed distance of `v` from the hyperplane; zero for a degenerate plane.
fn margin(normal: &[f32], offset: f32, v: &[f32]) -> f32 {
    if normal.is_empty() {
        return 0.0;
    }
    normal.iter().zip(v.iter()).map(|(a, b)| a * b).sum::<f32>() + offset
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Point used for clustering: unit-normalized under the angular metric.
fn clustering_point(items: &[Option<Vector>], id: usize, metric: DistanceMetric) -> Vec<f32> {
    match &items[id] {
        Some(v) if metric.requires_direction() => v
            .normalized()
            .map(Vector::into_inner)
            .unwrap_or_else(|_| v.as_slice().to_vec()),
        Some(v) => v.as_slice().to_vec(),
        None => Vec::new(),
    }
}

/// Pick a splitting hyperplane from a sampled two-means clustering of `ids`.
fn split_plane(
    items: &[Option<Vector>],
    ids: &[usize],
    metric: DistanceMetric,
    rng: &mut StdRng,
) -> (Vec<f32>, f32) {
    let count = ids.len();
    let i = rng.gen_range(0..count);
    let mut j = rng.gen_range(0..count - 1);
    if j >= i {
        j += 1;
    }

    let mut p = clustering_point(items, ids[i], metric);
    let mut q = clustering_point(items, ids[j], metric);
    let (mut ic, mut jc) = (1.0_f32, 1.0_f32);

    for _ in 0..TWO_MEANS_ITERATIONS {
        let k = rng.gen_range(0..count);
        let x = clustering_point(items, ids[k], metric);
        let di = ic * squared_distance(&p, &x);
        let dj = jc * squared_distance(&q, &x);
        if di < dj {
            p.iter_mut()
                .zip(x.iter())
                .for_each(|(pv, xv)| *pv = (*pv * ic + xv) / (ic + 1.0));
            ic += 1.0;
        } else if dj < di {
            q.iter_mut()
                .zip(x.iter())
                .for_each(|(qv, xv)| *qv = (*qv * jc + xv) / (jc + 1.0));
            jc += 1.0;
        }
    }

    let mut normal: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
    let norm = normal.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return (Vec::new(), 0.0);
    }
    normal.iter_mut().for_each(|x| *x /= norm);

    let offset = match metric {
        DistanceMetric::Angular => 0.0,
        DistanceMetric::Euclidean => {
            -normal
                .iter()
                .zip(p.iter().zip(q.iter()))
                .map(|(n, (a, b))| n * (a + b) / 2.0)
                .sum::<f32>()
        }
    };

    (normal, offset)
}
