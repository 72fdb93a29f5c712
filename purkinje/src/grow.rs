//! Fractal tree growth driver.
//!
//! Growth order:
//! 1. First branch from the root along the initial direction.
//! 2. One fascicle per configured angle, starting at the first branch's tip.
//! 3. `generations` rounds of bifurcation of every still-growing branch,
//!    visited in shuffled order.

use glam::DVec3;
use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info, instrument};

use crate::branch::{Branch, BranchStart};
use crate::error::GrowthError;
use crate::nodes::NodeStore;
use crate::params::FractalTreeParameters;
use crate::surface::SurfaceMesh;
use crate::tree::PurkinjeTree;

/// Grow a Purkinje tree from `root` over `surface`.
///
/// `root` must lie on (or project onto) the surface. All randomness comes
/// from `rng`; a seeded generator gives a reproducible tree.
#[instrument(skip_all, fields(generations = params.generations, triangles = surface.triangle_count()))]
pub fn grow_tree<R: Rng + ?Sized>(
    surface: &SurfaceMesh,
    root: DVec3,
    params: &FractalTreeParameters,
    rng: &mut R,
) -> Result<PurkinjeTree, GrowthError> {
    params.validate()?;
    let search = params.search_vertices;
    let (root, root_triangle) = surface
        .project(root, search)
        .ok_or(GrowthError::RootProjection(root.to_array()))?;

    let mut nodes = NodeStore::new(root, params.length.max(params.segment_length));
    let mut branches: Vec<Branch> = Vec::new();

    let first = Branch::grow(
        surface,
        &mut nodes,
        BranchStart {
            node: 0,
            direction: params.direction(),
            triangle: root_triangle,
            length: params.init_length,
            angle: 0.0,
            repulsion: 0.0,
            segments: params.segments_for(params.init_length),
        },
        &[0],
        search,
    );
    debug!(nodes = first.nodes.len(), "first branch grown");
    branches.push(first);

    let mut growing = vec![0];
    if !params.fascicle_angles.is_empty() {
        let mut lineage = branches[0].nodes.clone();
        growing.clear();
        for (&angle, &length) in params.fascicle_angles.iter().zip(&params.fascicle_lengths) {
            let trunk = &branches[0];
            let fascicle = Branch::grow(
                surface,
                &mut nodes,
                BranchStart {
                    node: trunk.tip(),
                    direction: trunk.direction,
                    triangle: trunk.triangle,
                    length,
                    angle,
                    repulsion: 0.0,
                    segments: params.segments_for(length),
                },
                &lineage,
                search,
            );
            lineage.extend_from_slice(&fascicle.nodes);
            branches.push(fascicle);
            growing.push(branches.len() - 1);
        }
    }

    let lengths = branch_lengths(params)?;
    let min_length = params.effective_min_length();
    let segments = params.segments_for(params.length);
    for generation in 0..params.generations {
        growing.shuffle(rng);
        let mut next = Vec::with_capacity(growing.len() * 2);
        for &parent in &growing {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let mut angle = -params.branch_angle * sign;
            let mut first_child: Option<usize> = None;
            for _ in 0..2 {
                let mut lineage = branches[parent].nodes.clone();
                if let Some(sibling) = first_child {
                    lineage.extend_from_slice(&branches[sibling].nodes);
                }
                let length = lengths.sample(rng).max(min_length);
                let child = Branch::grow(
                    surface,
                    &mut nodes,
                    BranchStart {
                        node: branches[parent].tip(),
                        direction: branches[parent].direction,
                        triangle: branches[parent].triangle,
                        length,
                        angle,
                        repulsion: params.repulsion,
                        segments,
                    },
                    &lineage,
                    search,
                );
                let growing_child = child.growing;
                branches.push(child);
                let child_id = branches.len() - 1;
                if growing_child {
                    next.push(child_id);
                }
                first_child = Some(child_id);
                angle = -angle;
            }
        }
        debug!(
            generation,
            growing = next.len(),
            nodes = nodes.len(),
            "generation grown"
        );
        growing = next;
        if growing.is_empty() {
            break;
        }
    }

    let lines: Vec<[usize; 2]> = branches.iter().flat_map(|branch| branch.edges()).collect();
    let tree = PurkinjeTree::from_edges(nodes.positions(), lines);
    tree.validate()?;
    info!(
        nodes = tree.xyz.len(),
        segments = tree.lines.len(),
        endnodes = tree.endnodes.len(),
        "tree grown"
    );
    Ok(tree)
}

/// Gaussian of child branch lengths around `length`.
fn branch_lengths(params: &FractalTreeParameters) -> Result<Normal<f64>, GrowthError> {
    Normal::new(params.length, params.effective_length_std())
        .map_err(|err| GrowthError::InvalidParameter(format!("length_std: {err}")))
}
