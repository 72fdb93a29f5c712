//! Purkinje tree representation and structural invariants.

use std::collections::{BTreeSet, VecDeque};

use crate::error::GrowthError;

/// Root of every tree: the snapped His bundle attachment point.
pub const ROOT: usize = 0;

/// A rooted tree of line segments.
///
/// - `xyz`: node coordinates, node `0` is the root.
/// - `lines`: `(parent, child)` index pairs into `xyz`.
/// - `endnodes`: ascending indices of nodes without children.
#[derive(Debug, Clone, PartialEq)]
pub struct PurkinjeTree {
    pub xyz: Vec<[f64; 3]>,
    pub lines: Vec<[usize; 2]>,
    pub endnodes: Vec<usize>,
}

impl PurkinjeTree {
    /// Build a tree from nodes and edges, deriving the end nodes.
    pub fn from_edges(xyz: Vec<[f64; 3]>, lines: Vec<[usize; 2]>) -> Self {
        let endnodes = childless_nodes(xyz.len(), &lines);
        Self {
            xyz,
            lines,
            endnodes,
        }
    }

    /// Fail with [`GrowthError::InvalidTree`] when any invariant is broken.
    pub fn validate(&self) -> Result<(), GrowthError> {
        let violations = self.invariant_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(GrowthError::InvalidTree(violations))
        }
    }

    /// Check the tree invariants, returning one message per violation:
    /// - at least one node, every index in range
    /// - the root has no parent, every other node exactly one
    /// - every node reachable from the root
    /// - `endnodes` lists exactly the childless nodes, ascending
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let count = self.xyz.len();
        if count == 0 {
            errors.push("tree has no nodes".to_string());
            return errors;
        }

        let mut parents = vec![0usize; count];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, &[parent, child]) in self.lines.iter().enumerate() {
            if parent >= count || child >= count {
                errors.push(format!(
                    "lines[{index}] = ({parent}, {child}) out of range for {count} nodes"
                ));
                continue;
            }
            if parent == child {
                errors.push(format!("lines[{index}] is a self loop on node {parent}"));
                continue;
            }
            parents[child] += 1;
            children[parent].push(child);
        }
        if !errors.is_empty() {
            return errors;
        }

        if parents[ROOT] != 0 {
            errors.push(format!("root has {} parents", parents[ROOT]));
        }
        for (node, &parent_count) in parents.iter().enumerate().skip(1) {
            if parent_count != 1 {
                errors.push(format!("node {node} has {parent_count} parents"));
            }
        }

        let mut reached = vec![false; count];
        let mut queue = VecDeque::from([ROOT]);
        reached[ROOT] = true;
        while let Some(node) = queue.pop_front() {
            for &child in &children[node] {
                if !reached[child] {
                    reached[child] = true;
                    queue.push_back(child);
                }
            }
        }
        let unreached = reached.iter().filter(|&&seen| !seen).count();
        if unreached > 0 {
            errors.push(format!("{unreached} nodes unreachable from the root"));
        }

        let expected = childless_nodes(count, &self.lines);
        if self.endnodes != expected {
            errors.push(format!(
                "endnodes ({} entries) differ from the {} childless nodes",
                self.endnodes.len(),
                expected.len()
            ));
        }
        errors
    }
}

fn childless_nodes(count: usize, lines: &[[usize; 2]]) -> Vec<usize> {
    let parents: BTreeSet<usize> = lines.iter().map(|&[parent, _]| parent).collect();
    (0..count).filter(|node| !parents.contains(node)).collect()
}
