//! Stable exit codes of the `biv` binary.

/// The run (or `biv validate`) succeeded.
pub const OK: i32 = 0;
/// Invalid configuration or parameters; nothing was run. Also used when
/// `biv validate` finds a broken output directory.
pub const INVALID: i32 = 1;
/// A pipeline stage (mesh, fibers, Purkinje trees) failed.
pub const STAGE_FAILED: i32 = 2;
/// The output directory could not be prepared or written.
pub const OUTPUT_DIR: i32 = 3;
