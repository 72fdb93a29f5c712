//! CLI tests for the `biv` binary.
//!
//! Spawns the binary and checks exit codes and the `error: <stage>: ...`
//! line for each failure class.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use biv::exit_codes;
use biv::io::trees::FractalTreeGenerator;
use biv::pipeline::{Stages, run_pipeline};
use biv::test_support::{ScriptedFiberGenerator, ScriptedMeshBuilder, TestRun, slab_mesh};

fn biv(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_biv"))
        .current_dir(dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run biv")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn invalid_geometry_exits_with_invalid_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("biv.toml"), "[geometry]\na_epi_lv = 1.0\n").expect("config");

    let output = biv(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = stderr(&output);
    assert!(stderr.contains("error: config: invalid parameter"), "{stderr}");
    assert!(stderr.contains("a_epi_lv"), "{stderr}");
    assert!(!temp.path().join("data").exists());
}

#[test]
fn missing_explicit_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = biv(temp.path(), &["--config", "nope.toml"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn non_empty_data_dir_exits_with_output_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join("data")).expect("data dir");
    fs::write(temp.path().join("data").join("old.txt"), "old").expect("old file");

    let output = biv(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::OUTPUT_DIR));
    assert!(stderr(&output).contains("error: output: output directory error"));
}

#[test]
fn missing_mesh_tool_exits_with_stage_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("biv.toml"),
        "[tools]\nmesh_command = [\"definitely-not-a-biv-mesher\"]\n",
    )
    .expect("config");

    let output = biv(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::STAGE_FAILED));
    let stderr = stderr(&output);
    assert!(stderr.contains("error: mesh: mesh generation failed"), "{stderr}");
    assert!(temp.path().join("logs").is_dir());
}

#[test]
fn validate_accepts_a_complete_run() {
    let test = TestRun::new().expect("test run");
    let stages = Stages {
        mesh: ScriptedMeshBuilder::new(slab_mesh()),
        fibers: ScriptedFiberGenerator::new(),
        purkinje: FractalTreeGenerator,
    };
    run_pipeline(&test.config, None, &stages).expect("pipeline");

    let root = test.root().to_string_lossy().into_owned();
    let output = biv(test.root(), &["validate", "--output", &root]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ok: 23 files, 4 markers"), "{stdout}");
}

#[test]
fn validate_rejects_an_empty_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = biv(temp.path(), &["validate", "--output", "."]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("missing data directory"));
}

#[cfg(unix)]
#[test]
fn full_run_with_shell_tools() {
    let mut test = TestRun::new().expect("test run");
    let source = test.root().join("source.msh");
    biv::io::msh::write_msh(&source, &slab_mesh()).expect("source mesh");
    test.config.tools.mesh_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            "cp '{}' \"$0/biv_ellipsoid.msh\" && \
             for f in mesh ffun triangle_mesh; do : > \"$0/$f.h5\"; : > \"$0/$f.xdmf\"; done",
            source.display()
        ),
    ];
    test.config.tools.fiber_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "cat > /dev/null; for f in fiber sheet sheet_normal; do : > $f.h5; : > $f.xdmf; done"
            .to_string(),
    ];
    test.write_config().expect("write config");

    let output = biv(test.root(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(test.layout().missing_files().is_empty());
    assert!(test.layout().log("mesh").is_file());
    assert!(test.layout().log("fibers").is_file());

    let manifest = biv::io::output::read_manifest(&test.layout()).expect("manifest");
    let digest = manifest.get("config_sha256").and_then(|value| value.as_str());
    assert_eq!(digest.map(str::len), Some(64));

    let again = biv(test.root(), &["--resume"]);
    assert_eq!(again.status.code(), Some(exit_codes::OK), "{}", stderr(&again));
}
