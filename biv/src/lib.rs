//! Idealized bi-ventricular (BiV) heart model generator.
//!
//! One run produces a labeled tetrahedral mesh, fiber/sheet/sheet-normal
//! fields and a Purkinje network per ventricle under `<root>/data/`. The
//! crate keeps a strict separation:
//!
//! - **[`core`]**: Pure data and checks (geometry, markers, mesh coverage,
//!   the run manifest). No I/O.
//! - **[`io`]**: Side effects: config files, external tool processes, the
//!   `.msh` codec, output files.
//!
//! [`pipeline`] drives the stages in order and maps failures to
//! [`error::PipelineError`]; [`validate`] re-checks a finished output.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
