//! Growth of a single branch across the surface.

use glam::DVec3;

use crate::nodes::{CollisionSet, NodeStore};
use crate::surface::SurfaceMesh;

/// Where and how a new branch starts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BranchStart {
    /// Node the branch grows from (tip of its parent).
    pub node: usize,
    /// Parent direction at that node.
    pub direction: DVec3,
    /// Surface triangle the start node lies on.
    pub triangle: usize,
    /// Target length of the branch.
    pub length: f64,
    /// In-plane rotation applied to `direction`.
    pub angle: f64,
    /// Repulsion weight.
    pub repulsion: f64,
    /// Number of growth steps.
    pub segments: usize,
}

/// A grown branch.
#[derive(Debug, Clone)]
pub(crate) struct Branch {
    /// Node ids along the branch, starting with the parent's tip.
    pub nodes: Vec<usize>,
    /// Direction at the tip.
    pub direction: DVec3,
    /// Triangle under the tip.
    pub triangle: usize,
    /// False when growth stopped early (left the surface or collided).
    pub growing: bool,
}

impl Branch {
    /// Grow a branch step by step, projecting every step onto the surface.
    ///
    /// `lineage` lists nodes excluded from collision checks.
    pub fn grow(
        surface: &SurfaceMesh,
        nodes: &mut NodeStore,
        start: BranchStart,
        lineage: &[usize],
        search: usize,
    ) -> Self {
        let collisions = CollisionSet::new(nodes, lineage);
        let normal = surface.normal(start.triangle);
        let in_plane = -start.direction.cross(normal);
        let mut direction = (start.direction * start.angle.cos() + in_plane * start.angle.sin())
            .normalize_or(start.direction);

        let origin = nodes.position(start.node);
        direction = nudge(direction, collisions.gradient(nodes, origin), start.repulsion);

        let step = start.length / start.segments.max(1) as f64;
        let mut tip = origin;
        let mut triangle = start.triangle;
        let mut queue = Vec::with_capacity(start.segments);
        let mut growing = true;
        for _ in 1..start.segments {
            let Some((point, next_triangle)) = surface.project(tip + direction * step, search)
            else {
                growing = false;
                break;
            };
            if let Some((_, distance)) = collisions.nearest(nodes, point)
                && distance < start.length / 5.0
            {
                growing = false;
                break;
            }
            queue.push(point);
            tip = point;
            triangle = next_triangle;

            let gradient = collisions.gradient(nodes, point);
            let normal = surface.normal(triangle);
            let tangential = gradient - normal * gradient.dot(normal);
            direction = nudge(direction, tangential, start.repulsion);
        }

        let mut branch_nodes = Vec::with_capacity(queue.len() + 1);
        branch_nodes.push(start.node);
        for point in queue {
            branch_nodes.push(nodes.push(point));
        }

        Self {
            nodes: branch_nodes,
            direction,
            triangle,
            growing,
        }
    }

    pub fn tip(&self) -> usize {
        self.nodes[self.nodes.len() - 1]
    }

    /// Consecutive `(parent, child)` pairs along the branch.
    pub fn edges(&self) -> impl Iterator<Item = [usize; 2]> + '_ {
        self.nodes.windows(2).map(|pair| [pair[0], pair[1]])
    }
}

fn nudge(direction: DVec3, gradient: DVec3, weight: f64) -> DVec3 {
    (direction + gradient * weight).normalize_or(direction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(size: usize) -> SurfaceMesh {
        let mut vertices = Vec::new();
        for y in 0..=size {
            for x in 0..=size {
                vertices.push([x as f64, y as f64, 0.0]);
            }
        }
        let row = size + 1;
        let mut triangles = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let v = y * row + x;
                triangles.push([v, v + 1, v + row + 1]);
                triangles.push([v, v + row + 1, v + row]);
            }
        }
        SurfaceMesh::new(vertices, triangles).expect("plane")
    }

    #[test]
    fn straight_branch_follows_direction() {
        let surface = plane(4);
        let root = DVec3::new(0.5, 2.0, 0.0);
        let (_, triangle) = surface.project(root, 1).expect("root projects");
        let mut nodes = NodeStore::new(root, 0.5);
        let branch = Branch::grow(
            &surface,
            &mut nodes,
            BranchStart {
                node: 0,
                direction: DVec3::X,
                triangle,
                length: 2.0,
                angle: 0.0,
                repulsion: 0.0,
                segments: 20,
            },
            &[0],
            1,
        );
        assert!(branch.growing);
        assert_eq!(branch.nodes.len(), 20);
        let tip = nodes.position(branch.tip());
        assert!((tip.x - 2.4).abs() < 1e-9);
        assert!((tip.y - 2.0).abs() < 1e-9);
        assert_eq!(branch.edges().count(), 19);
    }

    #[test]
    fn branch_stops_at_surface_boundary() {
        let surface = plane(2);
        let root = DVec3::new(1.5, 1.0, 0.0);
        let (_, triangle) = surface.project(root, 1).expect("root projects");
        let mut nodes = NodeStore::new(root, 0.5);
        let branch = Branch::grow(
            &surface,
            &mut nodes,
            BranchStart {
                node: 0,
                direction: DVec3::X,
                triangle,
                length: 2.0,
                angle: 0.0,
                repulsion: 0.0,
                segments: 20,
            },
            &[0],
            1,
        );
        assert!(!branch.growing);
        assert!(nodes.position(branch.tip()).x <= 2.0 + 1e-9);
    }
}
