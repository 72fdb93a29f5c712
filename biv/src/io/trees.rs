//! Purkinje generator adapter.
//!
//! The default [`FractalTreeGenerator`] grows the tree natively with the
//! `purkinje` crate on the endocardial facets of one ventricle.

use anyhow::{Context, Result, anyhow};
use glam::DVec3;
use purkinje::{FractalTreeParameters, PurkinjeTree, SurfaceMesh, grow_tree};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

use crate::core::mesh::Mesh;
use crate::core::ventricle::Ventricle;

/// Inputs of one tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeRequest<'a> {
    pub ventricle: Ventricle,
    pub mesh: &'a Mesh,
    /// Approximate root point, snapped to the nearest endocardial vertex.
    pub root: [f64; 3],
    pub params: &'a FractalTreeParameters,
    pub seed: u64,
    /// Largest accepted distance between `root` and its snapped vertex.
    pub max_seed_distance: f64,
}

/// Abstraction over Purkinje network generators.
pub trait PurkinjeGenerator {
    fn generate(&self, request: &TreeRequest<'_>) -> Result<PurkinjeTree>;
}

/// Native fractal tree growth.
#[derive(Debug, Clone, Copy, Default)]
pub struct FractalTreeGenerator;

impl PurkinjeGenerator for FractalTreeGenerator {
    #[instrument(skip_all, fields(ventricle = %request.ventricle, seed = request.seed))]
    fn generate(&self, request: &TreeRequest<'_>) -> Result<PurkinjeTree> {
        let surface = endocardium(request.mesh, request.ventricle)?;
        let requested = DVec3::from_array(request.root);
        let root = surface
            .snap_to_vertex(requested, request.max_seed_distance)
            .context("snap root to endocardium")?;
        debug!(
            requested = ?request.root,
            snapped = ?root.to_array(),
            "root snapped"
        );

        let mut rng = StdRng::seed_from_u64(request.seed);
        let tree = grow_tree(&surface, root, request.params, &mut rng)
            .with_context(|| format!("grow {} tree", request.ventricle))?;
        info!(
            nodes = tree.xyz.len(),
            endnodes = tree.endnodes.len(),
            "{} tree grown",
            request.ventricle
        );
        Ok(tree)
    }
}

/// Facets tagged with the ventricle's endocardial marker, as a growth surface.
pub fn endocardium(mesh: &Mesh, ventricle: Ventricle) -> Result<SurfaceMesh> {
    let name = ventricle.endo_marker();
    let marker = mesh
        .registry
        .get(name)
        .ok_or_else(|| anyhow!("mesh has no {name} marker"))?;
    let triangles = mesh.triangles_with_tag(marker.tag);
    SurfaceMesh::from_subset(&mesh.vertices, &triangles)
        .with_context(|| format!("build {name} surface"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{slab_mesh, slab_tree_config};

    fn request<'a>(
        mesh: &'a Mesh,
        params: &'a FractalTreeParameters,
        ventricle: Ventricle,
        root: [f64; 3],
    ) -> TreeRequest<'a> {
        TreeRequest {
            ventricle,
            mesh,
            root,
            params,
            seed: 1234,
            max_seed_distance: 0.5,
        }
    }

    #[test]
    fn endocardium_keeps_only_its_facets() {
        let mesh = slab_mesh();
        let lv = endocardium(&mesh, Ventricle::Lv).expect("lv surface");
        let rv = endocardium(&mesh, Ventricle::Rv).expect("rv surface");
        assert!(lv.triangle_count() > 0);
        assert_eq!(lv.triangle_count(), rv.triangle_count());
        assert!(lv.vertex_count() < mesh.vertices.len());
    }

    #[test]
    fn trees_grow_on_their_own_ventricle() {
        let mesh = slab_mesh();
        let config = slab_tree_config();
        for ventricle in Ventricle::ALL {
            let tree_config = config.tree(ventricle);
            let tree = FractalTreeGenerator
                .generate(&request(&mesh, &tree_config.growth, ventricle, tree_config.root))
                .expect("grow");
            assert!(tree.invariant_violations().is_empty());
            assert!(tree.xyz.len() > 10);
            assert!(tree.xyz.iter().all(|[_, _, z]| z.abs() < 1e-9));
            let on_lv_half = tree.xyz.iter().all(|[x, _, _]| *x <= 2.0 + 1e-9);
            let on_rv_half = tree.xyz.iter().all(|[x, _, _]| *x >= 2.0 - 1e-9);
            match ventricle {
                Ventricle::Lv => assert!(on_lv_half),
                Ventricle::Rv => assert!(on_rv_half),
            }
        }
    }

    #[test]
    fn same_seed_gives_same_tree() {
        let mesh = slab_mesh();
        let config = slab_tree_config();
        let lv = config.tree(Ventricle::Lv);
        let req = request(&mesh, &lv.growth, Ventricle::Lv, lv.root);
        let first = FractalTreeGenerator.generate(&req).expect("first");
        let second = FractalTreeGenerator.generate(&req).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn distant_root_is_rejected() {
        let mesh = slab_mesh();
        let params = slab_tree_config().lv.growth;
        let err = FractalTreeGenerator
            .generate(&request(&mesh, &params, Ventricle::Lv, [1.0, 1.0, 5.0]))
            .expect_err("root off surface");
        assert!(format!("{err:#}").contains("away from the surface"));
    }

    #[test]
    fn missing_endocardium_marker_is_reported() {
        let mut mesh = slab_mesh();
        mesh.registry = crate::core::markers::MarkerRegistry::new();
        let err = endocardium(&mesh, Ventricle::Rv).expect_err("no marker");
        assert!(err.to_string().contains("ENDO_RV"));
    }
}
