//! Asset loading for the baker
//!
//! Diffuse textures are the only image inputs: their alpha channel decides
//! whether a shadow ray passes through a cutout surface.

pub mod texture;
pub mod material;

pub use texture::Texture;
pub use material::{BakeMaterial, MaterialCache};

/// Asset loading errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// Image could not be opened or decoded
    #[error("Failed to load texture {path}: {reason}")]
    TextureLoad {
        /// Texture path
        path: String,
        /// Decoder message
        reason: String,
    },

    /// Material name not present in the scene
    #[error("Unknown material: {0}")]
    UnknownMaterial(String),
}
