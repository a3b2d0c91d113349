//! # Bake Configuration
//!
//! Global bake settings consumed by the lighting, post-processing and packing
//! stages, plus the file-backed configuration the driver loads.
//!
//! ## Configuration Categories
//!
//! - **Glow Settings**: ambient occlusion, bounce, dilation and atlas parameters
//! - **Output Config**: where lightmaps and the updated scene are written
//! - **Bake Config**: the two above plus the log level, loadable from TOML or RON

use serde::{Serialize, Deserialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};
use crate::foundation::math::Color;

/// # Glow Settings
///
/// Parameters shared by every stage of a bake. All fields have defaults so a
/// configuration file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowSettings {
    /// Run hemispherical ambient occlusion for zone ambient light
    pub ao_enabled: bool,
    /// AO rays per texel
    pub nsamples: u32,
    /// Maximum AO ray distance
    pub ao_depth: f32,
    /// AO floor (0..1)
    pub ao_min: f32,
    /// Brightness scalar applied to the AO factor
    pub ao_multiply: f32,
    /// Width and height of each lightmap atlas
    pub lightmap_atlas_size: u32,
    /// Run the mesh-to-mesh bounce pass after direct lighting
    pub bounce_enabled: bool,
    /// Largest neighbour distance probed while filling unset texels
    pub dilation_max_distance: u32,
    /// Radiance magnitude ceiling applied before quantization
    pub radiance_ceiling: f32,
    /// Blur radiance maps within source triangles
    pub blur: bool,
    /// Halve radiance map resolution with a 2x2 box filter
    pub downsample: bool,
    /// Border texels added on each side of a packed radiance map
    pub atlas_padding: u32,
    /// Color of atlas texels not covered by any radiance map
    pub atlas_clear_color: Color,
    /// Run a 3x3 box filter over each finished atlas
    pub atlas_box_filter: bool,
}

impl Default for GlowSettings {
    fn default() -> Self {
        Self {
            ao_enabled: true,
            nsamples: 128,
            ao_depth: 0.5,
            ao_min: 0.45,
            ao_multiply: 1.0,
            lightmap_atlas_size: 1024,
            bounce_enabled: true,
            dilation_max_distance: 7,
            radiance_ceiling: 3.0,
            blur: true,
            downsample: false,
            atlas_padding: 2,
            atlas_clear_color: Color::zeros(),
            atlas_box_filter: false,
        }
    }
}

impl GlowSettings {
    /// Enable or disable ambient occlusion
    pub fn with_ao(mut self, enabled: bool) -> Self {
        self.ao_enabled = enabled;
        self
    }

    /// Set the AO ray count per texel
    pub fn with_samples(mut self, nsamples: u32) -> Self {
        self.nsamples = nsamples;
        self
    }

    /// Set AO depth, floor and multiplier
    pub fn with_ao_params(mut self, depth: f32, min: f32, multiply: f32) -> Self {
        self.ao_depth = depth;
        self.ao_min = min;
        self.ao_multiply = multiply;
        self
    }

    /// Set the atlas size
    pub fn with_atlas_size(mut self, size: u32) -> Self {
        self.lightmap_atlas_size = size;
        self
    }

    /// Enable or disable the bounce pass
    pub fn with_bounce(mut self, enabled: bool) -> Self {
        self.bounce_enabled = enabled;
        self
    }

    /// Enable or disable per-triangle blur
    pub fn with_blur(mut self, enabled: bool) -> Self {
        self.blur = enabled;
        self
    }

    /// Enable or disable 2x2 downsampling
    pub fn with_downsample(mut self, enabled: bool) -> Self {
        self.downsample = enabled;
        self
    }

    /// Set atlas border padding
    pub fn with_atlas_padding(mut self, padding: u32) -> Self {
        self.atlas_padding = padding;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.ao_enabled && self.nsamples == 0 {
            return Err("AO sample count must be at least 1 when AO is enabled".to_string());
        }

        if self.ao_enabled && self.ao_depth <= 0.0 {
            return Err(format!("AO depth must be positive, got {}", self.ao_depth));
        }

        if !(0.0..=1.0).contains(&self.ao_min) {
            return Err(format!("AO minimum must be within 0..1, got {}", self.ao_min));
        }

        if !(64..=8192).contains(&self.lightmap_atlas_size) {
            return Err(format!(
                "Lightmap atlas size must be within 64..8192, got {}",
                self.lightmap_atlas_size
            ));
        }

        if self.atlas_padding * 2 >= self.lightmap_atlas_size {
            return Err("Atlas padding leaves no room for radiance maps".to_string());
        }

        if self.radiance_ceiling <= 0.0 {
            return Err("Radiance ceiling must be positive".to_string());
        }

        Ok(())
    }
}

/// # Output Configuration
///
/// Destination of baked atlases and the rewritten scene description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving atlas images
    pub output_dir: PathBuf,
    /// Atlas file name prefix, followed by the atlas id and `.png`
    pub lightmap_prefix: String,
    /// Write the scene back with lightmap indices and tiling offsets
    pub write_scene: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Textures"),
            lightmap_prefix: "Scene_Lightmap".to_string(),
            write_scene: true,
        }
    }
}

impl OutputConfig {
    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// # Bake Configuration
///
/// Top-level document loaded by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Bake parameters
    pub settings: GlowSettings,
    /// Output locations
    pub output: OutputConfig,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            settings: GlowSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BakeConfig {
    /// Set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the bake settings
    pub fn with_settings(mut self, settings: GlowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.output.lightmap_prefix.is_empty() {
            return Err("Lightmap prefix cannot be empty".to_string());
        }
        self.settings.validate()
    }
}

impl Config for BakeConfig {}
