//! Tree node storage and the distance field used for branch repulsion.

use std::collections::HashSet;

use glam::DVec3;

use crate::spatial::PointGrid;

/// Finite difference step of the distance gradient.
const GRADIENT_DELTA: f64 = 0.01;

/// All nodes grown so far, in creation order.
#[derive(Debug)]
pub(crate) struct NodeStore {
    grid: PointGrid,
}

impl NodeStore {
    pub fn new(root: DVec3, cell_size: f64) -> Self {
        let mut grid = PointGrid::new(cell_size);
        grid.insert(root);
        Self { grid }
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn position(&self, node: usize) -> DVec3 {
        self.grid.point(node)
    }

    pub fn push(&mut self, position: DVec3) -> usize {
        self.grid.insert(position)
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        (0..self.len()).map(|id| self.position(id).to_array()).collect()
    }
}

/// Nodes a growing branch must keep away from.
///
/// Frozen when the branch starts: every node that existed at that time,
/// minus the branch's own lineage (its parent branch and sibling).
#[derive(Debug)]
pub(crate) struct CollisionSet {
    snapshot_len: usize,
    excluded: HashSet<usize>,
    empty: bool,
}

impl CollisionSet {
    pub fn new(nodes: &NodeStore, excluded: &[usize]) -> Self {
        let snapshot_len = nodes.len();
        let excluded: HashSet<usize> = excluded
            .iter()
            .copied()
            .filter(|&id| id < snapshot_len)
            .collect();
        let empty = excluded.len() >= snapshot_len;
        Self {
            snapshot_len,
            excluded,
            empty,
        }
    }

    /// Nearest colliding node and its distance.
    pub fn nearest(&self, nodes: &NodeStore, point: DVec3) -> Option<(usize, f64)> {
        if self.empty {
            return None;
        }
        nodes
            .grid
            .nearest_where(point, |id| id < self.snapshot_len && !self.excluded.contains(&id))
    }

    /// Central-difference gradient of the distance to the collision set.
    ///
    /// Zero when the set is empty.
    pub fn gradient(&self, nodes: &NodeStore, point: DVec3) -> DVec3 {
        if self.empty {
            return DVec3::ZERO;
        }
        let distance = |p: DVec3| self.nearest(nodes, p).map_or(0.0, |(_, d)| d);
        let axis = |unit: DVec3| {
            let step = unit * GRADIENT_DELTA;
            (distance(point + step) - distance(point - step)) / (2.0 * GRADIENT_DELTA)
        };
        DVec3::new(axis(DVec3::X), axis(DVec3::Y), axis(DVec3::Z))
    }
}
