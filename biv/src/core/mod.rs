//! Deterministic, pure logic shared by the pipeline stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! parameter sets and meshes and return deterministic outputs suitable for
//! tests.

pub mod fibers;
pub mod geometry;
pub mod manifest;
pub mod markers;
pub mod mesh;
pub mod ventricle;
