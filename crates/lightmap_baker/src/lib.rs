//! # Lightmap Baker
//!
//! Offline static lightmap baking for scenes of static meshes, lights and
//! ambient zones.
//!
//! ## Features
//!
//! - **Ray Traced Lighting**: directional and point lights with shadow rays, zone
//!   ambient with ambient occlusion, one bounce of mesh-to-mesh indirect light
//! - **Alpha Cutouts**: textured materials below their alpha threshold let light through
//! - **Seam Handling**: dilation, same-triangle blur and padded atlas borders
//! - **Atlas Packing**: greedy largest-first skyline packing into PNG atlases
//! - **Scene Write-Back**: lightmap index and UV tiling stamped onto each instance
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightmap_baker::prelude::*;
//!
//! fn main() -> Result<(), BakeError> {
//!     let mut baker = SceneBaker::new(GlowSettings::default())?;
//!     baker.load_scene("scenes/courtyard.ron")?;
//!     baker.preprocess()?;
//!     baker.light()?;
//!     baker.generate_lightmaps()?;
//!     baker.save_lightmaps("Textures", "Scene_Lightmap")?;
//!     baker.save_scene("scenes/courtyard.baked.ron")?;
//!     Ok(())
//! }
//! ```

// Core configuration
pub mod core;
pub mod config;

// Foundation and shared geometry
pub mod foundation;
pub mod geometry;
pub mod spatial;

// Inputs
pub mod assets;
pub mod scene;

// Backends
pub mod raster;
pub mod raytrace;

// Baking
pub mod bake;

mod error;

pub use error::BakeError;

/// Common imports for baker users
pub mod prelude {
    pub use crate::{
        BakeError,
        bake::{AtlasAssignment, BakePhase, BakeStats, SceneBaker},
        core::{BakeConfig, Config, GlowSettings, OutputConfig},
        foundation::math::{Color, Vec2, Vec3, Vec4},
        geometry::AABB,
        scene::{SceneDescription, SceneLoader},
    };
}
