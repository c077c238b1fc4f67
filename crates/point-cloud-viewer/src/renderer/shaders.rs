//! Shader sources of the point pipeline.

use crate::error::ShaderAssetError;
use std::borrow::Cow;
use std::path::Path;

pub const VERTEX_SHADER_NAME: &str = "point_cloud_vertex";
pub const FRAGMENT_SHADER_NAME: &str = "passthrough_fragment";

pub const VERTEX_ENTRY_POINT: &str = "vs_main";
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

const EMBEDDED_VERTEX: &str = include_str!("../../shaders/point_cloud_vertex.wgsl");
const EMBEDDED_FRAGMENT: &str = include_str!("../../shaders/passthrough_fragment.wgsl");

/// WGSL source of the vertex and fragment stages.
///
/// The vertex stage reads `a_position` (vec4, location 1) per instance and
/// the `PointUniforms` block at group 0, binding 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    /// The shaders compiled into the binary.
    pub fn embedded() -> Self {
        Self {
            vertex: Cow::Borrowed(EMBEDDED_VERTEX),
            fragment: Cow::Borrowed(EMBEDDED_FRAGMENT),
        }
    }

    /// Loads `<dir>/point_cloud_vertex.wgsl` and `<dir>/passthrough_fragment.wgsl`.
    pub fn load(dir: &Path) -> Result<Self, ShaderAssetError> {
        Ok(Self {
            vertex: Cow::Owned(read_asset(dir, VERTEX_SHADER_NAME)?),
            fragment: Cow::Owned(read_asset(dir, FRAGMENT_SHADER_NAME)?),
        })
    }
}

fn read_asset(dir: &Path, name: &'static str) -> Result<String, ShaderAssetError> {
    let path = dir.join(format!("{name}.wgsl"));
    log::debug!("Loading shader '{}' from {}", name, path.display());
    std::fs::read_to_string(&path).map_err(|source| ShaderAssetError::Read { name, path, source })
}
