//! Fractal Purkinje network growth on a triangulated endocardial surface.
//!
//! A tree starts at a root point on the surface, grows a long first branch
//! (the His bundle segment), splits into fascicles and then bifurcates for a
//! fixed number of generations. Every step is projected back onto the surface
//! and nudged away from existing branches so the network spreads out.
//!
//! - [`params`]: growth parameters and their validation.
//! - [`surface`]: the surface mesh and point projection.
//! - [`grow`]: the growth driver producing a [`PurkinjeTree`].
//! - [`tree`]: the resulting tree and its structural invariants.
//! - [`export`]: text and VTU serialization of a tree.
//!
//! Growth is deterministic for a given surface, parameter set and RNG state.

mod branch;
pub mod error;
pub mod export;
pub mod grow;
mod nodes;
pub mod params;
mod spatial;
pub mod surface;
pub mod tree;

pub use error::GrowthError;
pub use grow::grow_tree;
pub use params::FractalTreeParameters;
pub use surface::SurfaceMesh;
pub use tree::PurkinjeTree;
