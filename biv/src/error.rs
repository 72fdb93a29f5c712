//! Error taxonomy of a pipeline run.
//!
//! Stages work with `anyhow` results internally; [`run_pipeline`] maps each
//! failure to one [`PipelineError`] variant naming the stage it came from.
//!
//! [`run_pipeline`]: crate::pipeline::run_pipeline

use std::fmt;

use thiserror::Error;

use crate::core::ventricle::Ventricle;
use crate::exit_codes;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Mesh,
    Fibers,
    Purkinje(Ventricle),
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => f.write_str("config"),
            Stage::Mesh => f.write_str("mesh"),
            Stage::Fibers => f.write_str("fibers"),
            Stage::Purkinje(ventricle) => write!(f, "purkinje-{ventricle}"),
            Stage::Output => f.write_str("output"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Bad configuration, caught before any external call.
    #[error("invalid parameter")]
    InvalidParameter {
        #[source]
        source: Source,
    },

    #[error("mesh generation failed")]
    MeshGenerationFailed {
        #[source]
        source: Source,
    },

    /// A boundary marker the fiber rule needs is absent from the mesh.
    #[error("missing marker {name}")]
    MissingMarker { name: String },

    #[error("fiber generation failed")]
    FiberGenerationFailed {
        #[source]
        source: Source,
    },

    #[error("{ventricle} purkinje generation failed")]
    PurkinjeGenerationFailed {
        ventricle: Ventricle,
        #[source]
        source: Source,
    },

    /// Filesystem failure preparing or writing the output directory.
    #[error("output directory error")]
    OutputDirectoryError {
        #[source]
        source: Source,
    },
}

impl PipelineError {
    pub fn invalid(err: anyhow::Error) -> Self {
        Self::InvalidParameter { source: err.into() }
    }

    pub fn mesh(err: anyhow::Error) -> Self {
        Self::MeshGenerationFailed { source: err.into() }
    }

    pub fn fibers(err: anyhow::Error) -> Self {
        Self::FiberGenerationFailed { source: err.into() }
    }

    pub fn purkinje(ventricle: Ventricle, err: impl Into<Source>) -> Self {
        Self::PurkinjeGenerationFailed {
            ventricle,
            source: err.into(),
        }
    }

    pub fn output(err: anyhow::Error) -> Self {
        Self::OutputDirectoryError { source: err.into() }
    }

    /// Stage the error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidParameter { .. } => Stage::Config,
            Self::MeshGenerationFailed { .. } => Stage::Mesh,
            Self::MissingMarker { .. } | Self::FiberGenerationFailed { .. } => Stage::Fibers,
            Self::PurkinjeGenerationFailed { ventricle, .. } => Stage::Purkinje(*ventricle),
            Self::OutputDirectoryError { .. } => Stage::Output,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidParameter { .. } => exit_codes::INVALID,
            Self::OutputDirectoryError { .. } => exit_codes::OUTPUT_DIR,
            _ => exit_codes::STAGE_FAILED,
        }
    }

    /// `<stage>: <message>: <cause>: ...`, the line printed on failure.
    pub fn report(&self) -> String {
        let mut line = format!("{}: {self}", self.stage());
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            line.push_str(": ");
            line.push_str(&cause.to_string());
            source = cause.source();
        }
        line
    }
}
