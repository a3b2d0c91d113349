//! Diffuse texture data sampled by the alpha cutout filter

use std::path::Path;

use crate::assets::AssetError;
use crate::foundation::math::Vec2;

/// Loaded RGBA8 texture
#[derive(Debug, Clone)]
pub struct Texture {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Texture {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();

        log::debug!("Loading texture from: {:?}", path_ref);

        let img = image::open(path_ref).map_err(|e| AssetError::TextureLoad {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        })?;

        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        log::debug!("Loaded texture {}x{} from {:?}", width, height, path_ref);

        Ok(Self {
            data: rgba_img.into_raw(),
            width,
            height,
        })
    }

    /// Create a texture from raw RGBA8 pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == (width * height * 4) as usize).then_some(Self { data, width, height })
    }

    /// Alpha at a texture coordinate, 0..1
    ///
    /// Nearest texel, coordinates wrap. Empty textures read as opaque.
    pub fn sample_alpha(&self, uv: Vec2) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 1.0;
        }

        let x = ((uv.x * self.width as f32).floor() as i64).rem_euclid(i64::from(self.width));
        let y = ((uv.y * self.height as f32).floor() as i64).rem_euclid(i64::from(self.height));
        let index = (y as usize * self.width as usize + x as usize) * 4 + 3;

        self.data.get(index).map_or(1.0, |&a| f32::from(a) / 255.0)
    }
}
