//! Bounding-volume tree stored as a node arena
//!
//! Rebuilt from scratch every tick. Leaves index into a shared permutation of
//! the input boxes, so a build allocates nothing once the buffers have grown
//! to the working set.

use crate::math::{Aabb, Vec3};

/// Maximum items held by a leaf
pub const LEAF_SIZE: usize = 4;
/// Deepest level a node may sit at
pub const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// `count` items starting at `start` in the item permutation
    Leaf { start: u32, count: u32 },
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: NodeKind,
}

#[derive(Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    bounds: Vec<Aabb>,
    centroids: Vec<Vec3>,
    items: Vec<u32>,
}

impl Bvh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild over `boxes`. Item `i` in query results is the `i`th box.
    pub fn build<I>(&mut self, boxes: I)
    where
        I: IntoIterator<Item = Aabb>,
    {
        self.nodes.clear();
        self.bounds.clear();
        self.centroids.clear();
        self.items.clear();

        self.bounds.extend(boxes);
        self.centroids.extend(self.bounds.iter().map(Aabb::center));
        self.items.extend(0..self.bounds.len() as u32);

        if !self.bounds.is_empty() {
            self.build_node(0, self.items.len(), 0);
        }
    }

    fn build_node(&mut self, start: usize, end: usize, depth: usize) -> u32 {
        let node_bounds = self.items[start..end]
            .iter()
            .map(|&i| self.bounds[i as usize])
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();

        let index = self.nodes.len() as u32;
        let count = end - start;
        if count <= LEAF_SIZE || depth >= MAX_DEPTH {
            self.nodes.push(BvhNode {
                bounds: node_bounds,
                kind: NodeKind::Leaf {
                    start: start as u32,
                    count: count as u32,
                },
            });
            return index;
        }

        let mid = self.partition(start, end);

        // Placeholder, patched once both children exist
        self.nodes.push(BvhNode {
            bounds: node_bounds,
            kind: NodeKind::Leaf { start: 0, count: 0 },
        });
        let left = self.build_node(start, mid, depth + 1);
        let right = self.build_node(mid, end, depth + 1);
        self.nodes[index as usize].kind = NodeKind::Internal { left, right };
        index
    }

    /// Split `items[start..end]` around the midpoint of the centroid bounds on
    /// its longest axis. Both halves are always non-empty.
    fn partition(&mut self, start: usize, end: usize) -> usize {
        let first = self.centroids[self.items[start] as usize];
        let centroid_bounds = self.items[start..end]
            .iter()
            .map(|&i| self.centroids[i as usize])
            .fold(Aabb::new(first, first), |acc, c| Aabb::new(acc.min.min(c), acc.max.max(c)));

        let axis = centroid_bounds.longest_axis();
        let split = centroid_bounds.center().axis(axis);

        let mut mid = start;
        for i in start..end {
            if self.centroids[self.items[i] as usize].axis(axis) < split {
                self.items.swap(i, mid);
                mid += 1;
            }
        }

        if mid == start {
            start + 1
        } else if mid == end {
            end - 1
        } else {
            mid
        }
    }

    /// Collect every item whose box intersects `area` into `out` (cleared first).
    /// Results may still need an exact check by the caller.
    pub fn query(&self, area: &Aabb, out: &mut Vec<u32>) {
        out.clear();
        if self.nodes.is_empty() {
            return;
        }

        let mut stack: Vec<u32> = Vec::with_capacity(MAX_DEPTH + 2);
        stack.push(0);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects(area) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    let range = start as usize..(start + count) as usize;
                    for &item in &self.items[range] {
                        if self.bounds[item as usize].intersects(area) {
                            out.push(item);
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Box of `item` as captured at build time
    pub fn bounds(&self, item: u32) -> Option<&Aabb> {
        self.bounds.get(item as usize)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[BvhNode], index: u32) -> usize {
            match nodes[index as usize].kind {
                NodeKind::Leaf { .. } => 0,
                NodeKind::Internal { left, right } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}
