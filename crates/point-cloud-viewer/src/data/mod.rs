// src/data/mod.rs
//! GPU-facing data layouts for the point cloud viewer.

pub mod types;

// Re-export commonly used types for convenience.
pub use self::types::{PointUniformStd140, PointUniforms, QUAD_CORNERS};
