use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use tracking::SimulatedTrackerConfig;

/// Cyan tone used for tracked points (31, 188, 210).
pub const DEFAULT_POINT_COLOR: [f32; 4] = [31.0 / 255.0, 188.0 / 255.0, 210.0 / 255.0, 1.0];
pub const DEFAULT_POINT_SIZE: f32 = 5.0;
pub const DEFAULT_INITIAL_CAPACITY_POINTS: u32 = 1000;
pub const DEFAULT_GROWTH_FACTOR: u32 = 2;

/// Tunables of the point cloud renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Points the GPU buffer holds before the first reallocation.
    pub initial_capacity_points: u32,
    /// Capacity multiplier applied until a batch fits.
    pub growth_factor: u32,
    /// Normalized RGBA.
    pub point_color: [f32; 4],
    /// Point diameter in physical pixels.
    pub point_size: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_capacity_points: DEFAULT_INITIAL_CAPACITY_POINTS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            point_color: DEFAULT_POINT_COLOR,
            point_size: DEFAULT_POINT_SIZE,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity_points == 0 {
            return Err(ConfigError::ZeroInitialCapacity);
        }
        if self.growth_factor < 2 {
            return Err(ConfigError::GrowthFactorTooSmall(self.growth_factor));
        }
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            return Err(ConfigError::InvalidPointSize(self.point_size));
        }
        Ok(())
    }
}

/// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional) into normalized RGBA.
pub fn parse_color(s: &str) -> Result<[f32; 4], ConfigError> {
    let hex = s.trim().trim_start_matches('#');
    let invalid = || ConfigError::InvalidColor(s.to_string());

    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let mut rgba = [1.0f32; 4];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
        let v = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        rgba[i] = v as f32 / 255.0;
    }
    Ok(rgba)
}

/// `point-cloud-viewer` - renders a simulated AR feature-point stream.
///
/// Every option can also be supplied through the environment.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ViewerArgs {
    /// Points the GPU buffer is sized for at startup.
    #[arg(long, env = "POINT_CLOUD_INITIAL_CAPACITY", default_value_t = DEFAULT_INITIAL_CAPACITY_POINTS)]
    pub initial_capacity_points: u32,

    /// Multiplier applied to the buffer capacity when a batch does not fit.
    #[arg(long, env = "POINT_CLOUD_GROWTH_FACTOR", default_value_t = DEFAULT_GROWTH_FACTOR)]
    pub growth_factor: u32,

    /// Point diameter in pixels.
    #[arg(long, env = "POINT_CLOUD_POINT_SIZE", default_value_t = DEFAULT_POINT_SIZE)]
    pub point_size: f32,

    /// Point color as #rrggbb or #rrggbbaa.
    #[arg(long, env = "POINT_CLOUD_COLOR", default_value = "#1fbcd2", value_parser = parse_color)]
    pub point_color: [f32; 4],

    /// Directory holding `point_cloud_vertex.wgsl` and
    /// `passthrough_fragment.wgsl`. The built-in shaders are used if unset.
    #[arg(long, env = "POINT_CLOUD_SHADER_DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Upper bound on points per simulated batch.
    #[arg(long, default_value_t = 6000)]
    pub max_points: usize,

    /// Points discovered per simulated batch.
    #[arg(long, default_value_t = 250)]
    pub points_per_update: usize,

    /// Frames that share one simulated batch.
    #[arg(long, default_value_t = 3)]
    pub frames_per_update: u32,

    /// Seed of the simulated tracker.
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,
}

impl ViewerArgs {
    pub fn renderer_config(&self) -> Result<RendererConfig, ConfigError> {
        let config = RendererConfig {
            initial_capacity_points: self.initial_capacity_points,
            growth_factor: self.growth_factor,
            point_color: self.point_color,
            point_size: self.point_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn tracker_config(&self) -> SimulatedTrackerConfig {
        SimulatedTrackerConfig {
            max_points: self.max_points,
            points_per_update: self.points_per_update,
            frames_per_update: self.frames_per_update,
            seed: self.seed,
        }
    }
}
