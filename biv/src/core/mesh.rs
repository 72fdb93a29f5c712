//! Tetrahedral mesh with tagged boundary facets.
//!
//! Only what the pipeline needs is kept: vertex coordinates, tetrahedra and
//! the triangle facets carrying marker tags. Field data lives in the external
//! tools' files.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::markers::{FACET_DIM, MarkerRegistry};

/// A tagged triangle facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facet {
    pub vertices: [usize; 3],
    pub tag: i32,
}

/// A tetrahedral cell and its physical tag (`0` when untagged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub vertices: [usize; 4],
    pub tag: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub cells: Vec<Cell>,
    pub facets: Vec<Facet>,
    pub registry: MarkerRegistry,
}

type FaceKey = [usize; 3];

fn face_key(mut vertices: [usize; 3]) -> FaceKey {
    vertices.sort_unstable();
    vertices
}

impl Mesh {
    /// Triangle faces that belong to exactly one tetrahedron, as sorted vertex triples.
    pub fn boundary_faces(&self) -> BTreeSet<FaceKey> {
        let mut counts: BTreeMap<FaceKey, u32> = BTreeMap::new();
        for cell in &self.cells {
            let [a, b, c, d] = cell.vertices;
            for face in [[a, b, c], [a, b, d], [a, c, d], [b, c, d]] {
                *counts.entry(face_key(face)).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .filter_map(|(face, count)| (count == 1).then_some(face))
            .collect()
    }

    /// Distinct tags used by the facets.
    pub fn facet_tags(&self) -> BTreeSet<i32> {
        self.facets.iter().map(|facet| facet.tag).collect()
    }

    /// Triangles of every facet tagged `tag`.
    pub fn triangles_with_tag(&self, tag: i32) -> Vec<[usize; 3]> {
        self.facets
            .iter()
            .filter(|facet| facet.tag == tag)
            .map(|facet| facet.vertices)
            .collect()
    }

    /// Check marker coverage, returning one message per violation:
    /// - the mesh has cells and every index is in range
    /// - every facet tag is a registered facet marker
    /// - every boundary face carries exactly one label
    pub fn coverage_violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.cells.is_empty() {
            errors.push("mesh has no tetrahedral cells".to_string());
            return errors;
        }
        let count = self.vertices.len();
        let cell_out_of_range = self
            .cells
            .iter()
            .position(|cell| cell.vertices.iter().any(|&v| v >= count));
        if let Some(index) = cell_out_of_range {
            errors.push(format!("cell {index} references a vertex out of range"));
        }
        let facet_out_of_range = self
            .facets
            .iter()
            .position(|facet| facet.vertices.iter().any(|&v| v >= count));
        if let Some(index) = facet_out_of_range {
            errors.push(format!("facet {index} references a vertex out of range"));
        }
        if !errors.is_empty() {
            return errors;
        }

        for tag in self.facet_tags() {
            if self.registry.name_of(tag, FACET_DIM).is_none() {
                errors.push(format!("facet tag {tag} is not a registered marker"));
            }
        }

        let mut labels: BTreeMap<FaceKey, BTreeSet<i32>> = BTreeMap::new();
        for facet in &self.facets {
            labels
                .entry(face_key(facet.vertices))
                .or_default()
                .insert(facet.tag);
        }
        let mut unlabeled = 0usize;
        let mut ambiguous = 0usize;
        for face in self.boundary_faces() {
            match labels.get(&face).map(BTreeSet::len) {
                None => unlabeled += 1,
                Some(1) => {}
                Some(_) => ambiguous += 1,
            }
        }
        if unlabeled > 0 {
            errors.push(format!("{unlabeled} boundary facets carry no marker"));
        }
        if ambiguous > 0 {
            errors.push(format!("{ambiguous} boundary facets carry more than one marker"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single tetrahedron with all four faces tagged.
    fn tagged_tet() -> Mesh {
        let mut registry = MarkerRegistry::new();
        registry.insert("BASE", 1, 2);
        registry.insert("EPI", 2, 2);
        Mesh {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            cells: vec![Cell {
                vertices: [0, 1, 2, 3],
                tag: 0,
            }],
            facets: vec![
                Facet {
                    vertices: [0, 2, 1],
                    tag: 1,
                },
                Facet {
                    vertices: [0, 1, 3],
                    tag: 2,
                },
                Facet {
                    vertices: [0, 3, 2],
                    tag: 2,
                },
                Facet {
                    vertices: [1, 2, 3],
                    tag: 2,
                },
            ],
            registry,
        }
    }

    #[test]
    fn fully_tagged_boundary_is_covered() {
        let mesh = tagged_tet();
        assert_eq!(mesh.boundary_faces().len(), 4);
        assert!(mesh.coverage_violations().is_empty());
    }

    #[test]
    fn removing_a_label_breaks_coverage() {
        let mut mesh = tagged_tet();
        mesh.facets.pop();
        let errors = mesh.coverage_violations();
        assert_eq!(errors, vec!["1 boundary facets carry no marker".to_string()]);
    }

    #[test]
    fn conflicting_labels_are_reported() {
        let mut mesh = tagged_tet();
        mesh.facets.push(Facet {
            vertices: [3, 2, 1],
            tag: 1,
        });
        let errors = mesh.coverage_violations();
        assert!(errors[0].contains("more than one marker"));
    }

    #[test]
    fn unregistered_tags_are_reported() {
        let mut mesh = tagged_tet();
        mesh.facets[0].tag = 7;
        let errors = mesh.coverage_violations();
        assert!(errors.iter().any(|err| err.contains("facet tag 7")));
    }

    #[test]
    fn shared_faces_are_interior() {
        let mut mesh = tagged_tet();
        mesh.vertices.push([1.0, 1.0, 1.0]);
        mesh.cells.push(Cell {
            vertices: [1, 2, 3, 4],
            tag: 0,
        });
        let boundary = mesh.boundary_faces();
        assert_eq!(boundary.len(), 6);
        assert!(!boundary.contains(&[1, 2, 3]));
    }

    #[test]
    fn selects_triangles_by_tag() {
        let mesh = tagged_tet();
        assert_eq!(mesh.triangles_with_tag(1), vec![[0, 2, 1]]);
        assert_eq!(mesh.triangles_with_tag(2).len(), 3);
        assert_eq!(mesh.facet_tags(), BTreeSet::from([1, 2]));
    }
}
