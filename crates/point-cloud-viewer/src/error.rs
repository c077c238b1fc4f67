//! Error types for the renderer and its configuration.

use std::path::PathBuf;
use thiserror::Error;

/// The graphics driver reported an error at `site`.
///
/// Not recoverable: the renderer returns it immediately and callers are
/// expected to stop rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graphics API error at '{site}': {message}")]
pub struct GraphicsApiError {
    pub site: &'static str,
    pub message: String,
}

impl GraphicsApiError {
    pub fn new(site: &'static str, message: impl Into<String>) -> Self {
        Self {
            site,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial capacity must be at least one point")]
    ZeroInitialCapacity,
    #[error("growth factor must be at least 2, got {0}")]
    GrowthFactorTooSmall(u32),
    #[error("point size must be a positive finite number, got {0}")]
    InvalidPointSize(f32),
    #[error("invalid point color '{0}', expected #rrggbb or #rrggbbaa")]
    InvalidColor(String),
}

#[derive(Debug, Error)]
pub enum ShaderAssetError {
    #[error("failed to read shader '{name}' from {path}: {source}")]
    Read {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a frame could not be produced.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Graphics(#[from] GraphicsApiError),
}
