//! Uniform and vertex layouts shared between Rust and the WGSL shaders.

use glam::Mat4;

/// Per-draw shader parameters, independent of any backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointUniforms {
    /// `projection * view`.
    pub model_view_projection: Mat4,
    pub color: [f32; 4],
    /// Point diameter in pixels.
    pub point_size: f32,
}

/// Uniform block of the point pipeline, respecting std140 layout.
/// Must match `PointUniforms` in `point_cloud_vertex.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointUniformStd140 {
    pub model_view_projection: [[f32; 4]; 4], // 64 B
    pub color: [f32; 4],                      // +16 -> 80
    /// Size of the render target in physical pixels.
    pub viewport_size: [f32; 2],              // +8
    pub point_size: f32,                      // +4
    pub _pad0: f32,                           // +4  -> 96
}

// Compile-time check: buffer size must match the WGSL struct.
const _: [(); 96] = [(); core::mem::size_of::<PointUniformStd140>()];

impl PointUniformStd140 {
    pub fn new(uniforms: &PointUniforms, viewport_size: [f32; 2]) -> Self {
        Self {
            model_view_projection: uniforms.model_view_projection.to_cols_array_2d(),
            color: uniforms.color,
            viewport_size,
            point_size: uniforms.point_size,
            _pad0: 0.0,
        }
    }
}

/// Two triangles covering [-1, 1]^2; each point instance is expanded onto it.
pub const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];
