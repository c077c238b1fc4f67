//! The graphics API surface consumed by [`PointCloudRenderer`](super::PointCloudRenderer).

use super::shaders::ShaderSources;
use crate::data::PointUniforms;
use crate::error::GraphicsApiError;

/// Call-site tags attached to [`GraphicsApiError`].
pub mod site {
    pub const BEFORE_CREATE: &str = "before create";
    pub const BUFFER_ALLOC: &str = "buffer alloc";
    pub const PROGRAM: &str = "program";
    pub const PROGRAM_PARAMS: &str = "program params";
    pub const BEFORE_UPDATE: &str = "before update";
    pub const AFTER_UPDATE: &str = "after update";
    pub const BEFORE_DRAW: &str = "before draw";
    pub const DRAW: &str = "draw";
}

/// Operations the renderer needs from a graphics API.
///
/// Every fallible call reports driver errors as [`GraphicsApiError`] tagged
/// with the caller's site. Implementations must leave no buffer bound and no
/// vertex attribute enabled once a call returns, whether it succeeded or not.
pub trait PointCloudBackend {
    type Buffer;
    type Pipeline;

    /// Reports any error the driver recorded since the last check.
    fn check_error(&mut self, site: &'static str) -> Result<(), GraphicsApiError>;

    /// Allocates a streaming vertex buffer of `size_bytes`, contents undefined.
    fn create_point_buffer(
        &mut self,
        site: &'static str,
        size_bytes: u64,
    ) -> Result<Self::Buffer, GraphicsApiError>;

    /// Copies `bytes` into `buffer` at `offset`.
    fn write_points(
        &mut self,
        site: &'static str,
        buffer: &Self::Buffer,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), GraphicsApiError>;

    /// Compiles and links both stages (checked at [`site::PROGRAM`]), then
    /// resolves the pipeline parameters (checked at [`site::PROGRAM_PARAMS`]).
    fn create_point_pipeline(
        &mut self,
        shaders: &ShaderSources,
    ) -> Result<Self::Pipeline, GraphicsApiError>;

    /// Draws the first `count` records of `buffer` as points.
    fn draw_points(
        &mut self,
        site: &'static str,
        pipeline: &Self::Pipeline,
        buffer: &Self::Buffer,
        uniforms: &PointUniforms,
        count: u32,
    ) -> Result<(), GraphicsApiError>;
}
