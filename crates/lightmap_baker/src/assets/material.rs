//! Materials as seen by the baker, and the cache that shares them across instances

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::assets::{AssetError, Texture};
use crate::foundation::math::Color;
use crate::scene::{MaterialDesc, SceneDescription, SceneLoader};

/// Material data needed for occlusion filtering and bounce tinting
#[derive(Debug, Clone)]
pub struct BakeMaterial {
    /// Material name
    pub name: String,
    /// Diffuse texture whose alpha decides cutouts
    pub diffuse_texture: Option<Arc<Texture>>,
    /// Diffuse color
    pub diffuse_color: Color,
    /// Alpha below this does not block shadow rays
    pub alpha_threshold: f32,
}

impl Default for BakeMaterial {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_texture: None,
            diffuse_color: Color::new(1.0, 1.0, 1.0),
            alpha_threshold: 1.0,
        }
    }
}

impl BakeMaterial {
    /// Whether shadow rays need to sample this material's texture
    pub fn has_cutout(&self) -> bool {
        self.diffuse_texture.is_some() && self.alpha_threshold > 0.0
    }
}

/// Loads each material and texture once per bake
#[derive(Debug, Default)]
pub struct MaterialCache {
    materials: HashMap<String, Arc<BakeMaterial>>,
    textures: HashMap<PathBuf, Arc<Texture>>,
    default_material: Arc<BakeMaterial>,
}

impl MaterialCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Material shared by geometries without an assignment
    pub fn default_material(&self) -> Arc<BakeMaterial> {
        Arc::clone(&self.default_material)
    }

    /// Get a material, loading its texture on first use
    pub fn get_or_load(&mut self, desc: &MaterialDesc, loader: &SceneLoader) -> Result<Arc<BakeMaterial>, AssetError> {
        if let Some(material) = self.materials.get(&desc.name) {
            return Ok(Arc::clone(material));
        }

        let diffuse_texture = match &desc.diffuse_texture {
            Some(path) => Some(self.texture(loader.resolve(path))?),
            None => None,
        };

        let material = Arc::new(BakeMaterial {
            name: desc.name.clone(),
            diffuse_texture,
            diffuse_color: desc.diffuse_color,
            alpha_threshold: desc.alpha_threshold,
        });
        self.materials.insert(desc.name.clone(), Arc::clone(&material));
        Ok(material)
    }

    /// Look a material up by name in the scene and load it
    pub fn load_named(&mut self, scene: &SceneDescription, name: &str, loader: &SceneLoader) -> Result<Arc<BakeMaterial>, AssetError> {
        let desc = scene
            .material(name)
            .ok_or_else(|| AssetError::UnknownMaterial(name.to_string()))?;
        self.get_or_load(desc, loader)
    }

    fn texture(&mut self, path: PathBuf) -> Result<Arc<Texture>, AssetError> {
        if let Some(texture) = self.textures.get(&path) {
            return Ok(Arc::clone(texture));
        }
        let texture = Arc::new(Texture::from_file(&path)?);
        self.textures.insert(path, Arc::clone(&texture));
        Ok(texture)
    }

    /// Number of distinct materials loaded
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Number of distinct textures loaded
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materials_are_shared() {
        let mut cache = MaterialCache::new();
        let loader = SceneLoader::default();
        let desc = MaterialDesc {
            name: "stone".to_string(),
            ..MaterialDesc::default()
        };

        let a = cache.get_or_load(&desc, &loader).unwrap();
        let b = cache.get_or_load(&desc, &loader).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.material_count(), 1);
        assert_eq!(cache.texture_count(), 0);
        assert!(!a.has_cutout());
    }

    #[test]
    fn test_missing_texture_fails() {
        let mut cache = MaterialCache::new();
        let loader = SceneLoader::new("/nonexistent");
        let desc = MaterialDesc {
            name: "leaves".to_string(),
            diffuse_texture: Some(PathBuf::from("leaves.png")),
            ..MaterialDesc::default()
        };
        assert!(matches!(
            cache.get_or_load(&desc, &loader),
            Err(AssetError::TextureLoad { .. })
        ));
    }

    #[test]
    fn test_unknown_material_name() {
        let mut cache = MaterialCache::new();
        let loader = SceneLoader::default();
        let scene = SceneDescription {
            materials: vec![MaterialDesc {
                name: "stone".to_string(),
                ..MaterialDesc::default()
            }],
            ..SceneDescription::default()
        };

        assert!(cache.load_named(&scene, "stone", &loader).is_ok());
        assert!(matches!(
            cache.load_named(&scene, "marble", &loader),
            Err(AssetError::UnknownMaterial(name)) if name == "marble"
        ));
        assert_eq!(cache.material_count(), 1);
    }
}
