//! Side-effecting parts of the pipeline: configuration files, external tool
//! processes, the mesh codec and the output directory.

pub mod config;
pub mod fibers;
pub mod layout;
pub mod mesh_builder;
pub mod msh;
pub mod output;
pub mod process;
pub mod trees;
