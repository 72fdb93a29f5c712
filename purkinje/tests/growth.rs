use glam::DVec3;
use purkinje::export::{read_tree, write_tree};
use purkinje::{FractalTreeParameters, GrowthError, SurfaceMesh, grow_tree};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

/// Flat square `[0, cells * spacing]^2` in the z = 0 plane.
fn flat_sheet(cells: usize, spacing: f64) -> SurfaceMesh {
    let row = cells + 1;
    let mut vertices = Vec::with_capacity(row * row);
    for y in 0..row {
        for x in 0..row {
            vertices.push([x as f64 * spacing, y as f64 * spacing, 0.0]);
        }
    }
    let mut triangles = Vec::with_capacity(2 * cells * cells);
    for y in 0..cells {
        for x in 0..cells {
            let v = y * row + x;
            triangles.push([v, v + 1, v + row + 1]);
            triangles.push([v, v + row + 1, v + row]);
        }
    }
    SurfaceMesh::new(vertices, triangles).expect("sheet")
}

fn small_params() -> FractalTreeParameters {
    FractalTreeParameters {
        init_length: 1.0,
        generations: 4,
        length: 0.3,
        segment_length: 0.05,
        fascicle_lengths: vec![0.5, 0.5],
        search_vertices: 3,
        ..FractalTreeParameters::default()
    }
}

#[test]
fn same_seed_grows_identical_trees() {
    let surface = flat_sheet(20, 0.25);
    let root = DVec3::new(0.5, 2.5, 0.0);
    let params = small_params();

    let first = grow_tree(&surface, root, &params, &mut StdRng::seed_from_u64(1234)).expect("grow");
    let second =
        grow_tree(&surface, root, &params, &mut StdRng::seed_from_u64(1234)).expect("grow");

    assert_eq!(first, second);
    assert!(first.xyz.len() > 20, "tree too small: {}", first.xyz.len());
}

#[test]
fn grown_tree_satisfies_structure_and_stays_on_surface() {
    let surface = flat_sheet(20, 0.25);
    let tree = grow_tree(
        &surface,
        DVec3::new(0.5, 2.5, 0.3),
        &small_params(),
        &mut StdRng::seed_from_u64(99),
    )
    .expect("grow");

    assert!(tree.invariant_violations().is_empty());
    assert_eq!(tree.xyz[0], [0.5, 2.5, 0.0]);
    assert_eq!(tree.lines.len(), tree.xyz.len() - 1);
    assert!(!tree.endnodes.is_empty());
    for [x, y, z] in &tree.xyz {
        assert!(z.abs() < 1e-9);
        assert!((-1e-9..=5.0 + 1e-9).contains(x));
        assert!((-1e-9..=5.0 + 1e-9).contains(y));
    }
}

#[test]
fn grown_tree_survives_a_disk_round_trip() {
    let surface = flat_sheet(20, 0.25);
    let tree = grow_tree(
        &surface,
        DVec3::new(0.5, 2.5, 0.0),
        &small_params(),
        &mut StdRng::seed_from_u64(5),
    )
    .expect("grow");

    let temp = tempdir().expect("tempdir");
    write_tree(temp.path(), "lv_tree", &tree).expect("write");
    assert_eq!(read_tree(temp.path(), "lv_tree").expect("read"), tree);
}

#[test]
fn root_outside_the_surface_is_rejected() {
    let surface = flat_sheet(4, 0.25);
    let err = grow_tree(
        &surface,
        DVec3::new(10.0, 10.0, 0.0),
        &small_params(),
        &mut StdRng::seed_from_u64(1),
    )
    .expect_err("root off surface");
    assert!(matches!(err, GrowthError::RootProjection(_)));
}

#[test]
fn invalid_parameters_fail_before_growth() {
    let surface = flat_sheet(4, 0.25);
    let params = FractalTreeParameters {
        segment_length: 2.0,
        ..small_params()
    };
    let err = grow_tree(
        &surface,
        DVec3::new(0.5, 0.5, 0.0),
        &params,
        &mut StdRng::seed_from_u64(1),
    )
    .expect_err("invalid params");
    assert!(matches!(err, GrowthError::InvalidParameter(_)));
}
