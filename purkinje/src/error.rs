//! Error types for tree growth and tree file handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing a surface, growing a tree, or reading tree files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GrowthError {
    /// A growth parameter is out of range.
    #[error("invalid growth parameter: {0}")]
    InvalidParameter(String),

    /// The surface has no triangles to grow on.
    #[error("surface has no triangles")]
    EmptySurface,

    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references vertex {vertex} but surface has {vertex_count} vertices")]
    VertexOutOfRange {
        /// Offending triangle index.
        triangle: usize,
        /// Offending vertex index.
        vertex: usize,
        /// Number of vertices available.
        vertex_count: usize,
    },

    /// The requested root point is too far from any surface vertex.
    #[error("root point {point:?} is {distance:.4} away from the surface (limit {limit:.4})")]
    RootOffSurface {
        /// Requested root point.
        point: [f64; 3],
        /// Distance to the nearest surface vertex.
        distance: f64,
        /// Accepted distance.
        limit: f64,
    },

    /// The root point could not be projected onto any triangle.
    #[error("root point {0:?} does not project onto the surface")]
    RootProjection([f64; 3]),

    /// A grown tree violates its structural invariants.
    #[error("tree invariant violations:\n- {}", .0.join("\n- "))]
    InvalidTree(Vec<String>),

    /// A tree text file could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error on {}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl GrowthError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
