// src/lib.rs
//! AR point cloud viewer library.
//!
//! Streams feature-point batches from a tracking session into a growable GPU
//! vertex buffer and draws them as fixed-size points with a camera transform.

pub mod app;
pub mod camera;
pub mod config;
pub mod data;
pub mod error;
pub mod renderer;

pub use renderer::PointCloudRenderer;
