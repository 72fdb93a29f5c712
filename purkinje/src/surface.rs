//! Triangulated surface used as the growth domain.

use glam::DVec3;

use crate::error::GrowthError;
use crate::spatial::PointGrid;

const BARYCENTRIC_TOLERANCE: f64 = 1e-10;

/// A triangle surface with per-triangle normals and vertex adjacency.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    vertices: Vec<DVec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<DVec3>,
    vertex_triangles: Vec<Vec<usize>>,
    grid: PointGrid,
}

impl SurfaceMesh {
    /// Build a surface from vertices and triangles indexing into them.
    pub fn new(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Result<Self, GrowthError> {
        if triangles.is_empty() {
            return Err(GrowthError::EmptySurface);
        }
        for (index, triangle) in triangles.iter().enumerate() {
            if let Some(&vertex) = triangle.iter().find(|&&v| v >= vertices.len()) {
                return Err(GrowthError::VertexOutOfRange {
                    triangle: index,
                    vertex,
                    vertex_count: vertices.len(),
                });
            }
        }
        let vertices: Vec<DVec3> = vertices.into_iter().map(DVec3::from_array).collect();

        let mut normals = Vec::with_capacity(triangles.len());
        let mut vertex_triangles = vec![Vec::new(); vertices.len()];
        let mut edge_total = 0.0;
        for (index, [a, b, c]) in triangles.iter().copied().enumerate() {
            let (pa, pb, pc) = (vertices[a], vertices[b], vertices[c]);
            normals.push((pb - pa).cross(pc - pa).normalize_or_zero());
            edge_total += pa.distance(pb) + pb.distance(pc) + pc.distance(pa);
            for vertex in [a, b, c] {
                vertex_triangles[vertex].push(index);
            }
        }

        let mean_edge = edge_total / (3 * triangles.len()) as f64;
        let mut grid = PointGrid::new(if mean_edge > 0.0 { mean_edge } else { 1.0 });
        for vertex in &vertices {
            grid.insert(*vertex);
        }

        Ok(Self {
            vertices,
            triangles,
            normals,
            vertex_triangles,
            grid,
        })
    }

    /// Restrict a larger vertex set to the vertices used by `triangles`.
    ///
    /// Vertex indices are renumbered in order of first use so the surface
    /// only stores what it needs.
    pub fn from_subset(vertices: &[[f64; 3]], triangles: &[[usize; 3]]) -> Result<Self, GrowthError> {
        let mut remap = vec![usize::MAX; vertices.len()];
        let mut compact_vertices = Vec::new();
        let mut compact_triangles = Vec::with_capacity(triangles.len());
        for (index, triangle) in triangles.iter().enumerate() {
            let mut compact = [0usize; 3];
            for (slot, &vertex) in triangle.iter().enumerate() {
                if vertex >= vertices.len() {
                    return Err(GrowthError::VertexOutOfRange {
                        triangle: index,
                        vertex,
                        vertex_count: vertices.len(),
                    });
                }
                if remap[vertex] == usize::MAX {
                    remap[vertex] = compact_vertices.len();
                    compact_vertices.push(vertices[vertex]);
                }
                compact[slot] = remap[vertex];
            }
            compact_triangles.push(compact);
        }
        Self::new(compact_vertices, compact_triangles)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex(&self, index: usize) -> DVec3 {
        self.vertices[index]
    }

    pub fn normal(&self, triangle: usize) -> DVec3 {
        self.normals[triangle]
    }

    /// Nearest surface vertex to `point` and its distance.
    pub fn nearest_vertex(&self, point: DVec3) -> (usize, f64) {
        self.grid
            .nearest_where(point, |_| true)
            .unwrap_or((0, point.distance(self.vertices[0])))
    }

    /// Snap an approximate point to the nearest surface vertex.
    ///
    /// Fails when that vertex is farther than `max_distance`.
    pub fn snap_to_vertex(&self, point: DVec3, max_distance: f64) -> Result<DVec3, GrowthError> {
        let (vertex, distance) = self.nearest_vertex(point);
        if distance > max_distance {
            return Err(GrowthError::RootOffSurface {
                point: point.to_array(),
                distance,
                limit: max_distance,
            });
        }
        Ok(self.vertices[vertex])
    }

    /// Project `point` onto a triangle incident to one of its nearest vertices.
    ///
    /// The `search` nearest vertices are tried in order; the first incident
    /// triangle whose plane projection falls inside it wins. Returns `None`
    /// when the point falls outside every candidate triangle.
    pub fn project(&self, point: DVec3, search: usize) -> Option<(DVec3, usize)> {
        for (vertex, _) in self.grid.k_nearest(point, search.max(1)) {
            for &triangle in &self.vertex_triangles[vertex] {
                let normal = self.normals[triangle];
                let [a, b, c] = self.triangles[triangle].map(|v| self.vertices[v]);
                let projected = point - normal * (point - a).dot(normal);
                if inside_triangle(projected, a, b, c) {
                    return Some((projected, triangle));
                }
            }
        }
        None
    }
}

fn inside_triangle(point: DVec3, a: DVec3, b: DVec3, c: DVec3) -> bool {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = point - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f64::EPSILON {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    u >= -BARYCENTRIC_TOLERANCE && v >= -BARYCENTRIC_TOLERANCE && w >= -BARYCENTRIC_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .expect("surface")
    }

    #[test]
    fn projects_points_onto_plane() {
        let surface = unit_square();
        let (projected, triangle) = surface
            .project(DVec3::new(0.9, 0.2, 0.5), 1)
            .expect("projection");
        assert!(projected.z.abs() < 1e-12);
        assert!((projected.x - 0.9).abs() < 1e-12);
        assert_eq!(triangle, 0);
    }

    #[test]
    fn points_outside_the_surface_do_not_project() {
        let surface = unit_square();
        assert!(surface.project(DVec3::new(3.0, 3.0, 0.0), 4).is_none());
    }

    #[test]
    fn snaps_to_nearest_vertex_within_limit() {
        let surface = unit_square();
        let snapped = surface
            .snap_to_vertex(DVec3::new(0.95, 1.05, 0.1), 0.5)
            .expect("snap");
        assert_eq!(snapped, DVec3::new(1.0, 1.0, 0.0));

        let err = surface
            .snap_to_vertex(DVec3::new(5.0, 5.0, 5.0), 0.5)
            .expect_err("off surface");
        assert!(matches!(err, GrowthError::RootOffSurface { .. }));
    }

    fn fine_square(n: usize) -> SurfaceMesh {
        let step = 1.0 / n as f64;
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push([i as f64 * step, j as f64 * step, 0.0]);
            }
        }
        let index = |i: usize, j: usize| j * (n + 1) + i;
        let mut triangles = Vec::new();
        for j in 0..n {
            for i in 0..n {
                triangles.push([index(i, j), index(i + 1, j), index(i + 1, j + 1)]);
                triangles.push([index(i, j), index(i + 1, j + 1), index(i, j + 1)]);
            }
        }
        SurfaceMesh::new(vertices, triangles).expect("surface")
    }

    #[test]
    fn distant_roots_are_rejected_not_searched_for() {
        let surface = fine_square(40);
        let err = surface
            .snap_to_vertex(DVec3::new(1e11, 0.0, 0.0), 1.0)
            .expect_err("far root");
        match err {
            GrowthError::RootOffSurface { distance, .. } => {
                assert!((distance - (1e11 - 1.0)).abs() < 1.0, "{distance}");
            }
            other => panic!("expected RootOffSurface, got {other:?}"),
        }
        let snapped = surface
            .snap_to_vertex(DVec3::new(1.04, 0.5, 0.0), 0.1)
            .expect("just outside the edge");
        assert_eq!(snapped, DVec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn subset_compacts_vertices() {
        let vertices = vec![
            [9.0, 9.0, 9.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let surface = SurfaceMesh::from_subset(&vertices, &[[1, 2, 3]]).expect("surface");
        assert_eq!(surface.vertex_count(), 3);
        assert_eq!(surface.triangle_count(), 1);
        assert_eq!(surface.vertex(0), DVec3::ZERO);
    }

    #[test]
    fn rejects_empty_and_out_of_range_surfaces() {
        assert!(matches!(
            SurfaceMesh::new(vec![[0.0; 3]], Vec::new()),
            Err(GrowthError::EmptySurface)
        ));
        assert!(matches!(
            SurfaceMesh::new(vec![[0.0; 3]], vec![[0, 1, 2]]),
            Err(GrowthError::VertexOutOfRange { .. })
        ));
    }
}
