//! Scene file loading and write-back

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError};
use crate::scene::description::{GeometryDesc, ModelFile, SceneDescription};

/// Scene loading errors
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// Scene or model file could not be read or parsed
    #[error("Failed to read {path}: {source}")]
    File {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: ConfigError,
    },

    /// Model geometry is inconsistent
    #[error("Model '{model}' is invalid: {reason}")]
    InvalidModel {
        /// Model name
        model: String,
        /// What is wrong
        reason: String,
    },
}

/// Reads scene descriptions and resolves external model files relative to the scene
#[derive(Debug, Clone, Default)]
pub struct SceneLoader {
    base_dir: PathBuf,
}

impl SceneLoader {
    /// Loader resolving relative paths against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a scene-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load a scene file and every external model it references
    pub fn load(path: impl AsRef<Path>) -> Result<(SceneDescription, Self), SceneError> {
        let path = path.as_ref();
        let mut scene = SceneDescription::load_from_file(path).map_err(|source| SceneError::File {
            path: path.display().to_string(),
            source,
        })?;

        let loader = Self::new(path.parent().map(Path::to_path_buf).unwrap_or_default());
        loader.resolve_models(&mut scene)?;

        log::info!(
            "Loaded scene {:?}: {} models, {} static models, {} lights, {} zones",
            path,
            scene.models.len(),
            scene.static_models.len(),
            scene.lights.len(),
            scene.zones.len()
        );

        Ok((scene, loader))
    }

    /// Replace the geometry of every model with a `path` by the file contents
    pub fn resolve_models(&self, scene: &mut SceneDescription) -> Result<(), SceneError> {
        for model in &mut scene.models {
            if let Some(model_path) = &model.path {
                let full_path = self.resolve(model_path);
                let file = ModelFile::load_from_file(&full_path).map_err(|source| SceneError::File {
                    path: full_path.display().to_string(),
                    source,
                })?;
                log::debug!("Loaded model '{}' from {:?}", model.name, full_path);
                model.geometries = file.geometries;
            }
        }
        Ok(())
    }

    /// Write the scene back, leaving externally stored geometry out
    pub fn save(scene: &SceneDescription, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let path = path.as_ref();
        let mut output = scene.clone();
        for model in &mut output.models {
            if model.path.is_some() {
                model.geometries.clear();
            }
        }

        output.save_to_file(path).map_err(|source| SceneError::File {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Wrote updated scene to {:?}", path);
        Ok(())
    }
}

/// Check stream lengths and index ranges of one geometry
pub fn validate_geometry(model: &str, geometry: &GeometryDesc) -> Result<(), SceneError> {
    let invalid = |reason: String| SceneError::InvalidModel {
        model: model.to_string(),
        reason,
    };

    let vertex_count = geometry.positions.len();
    if geometry.normals.len() != vertex_count {
        return Err(invalid(format!(
            "{} normals for {} positions",
            geometry.normals.len(),
            vertex_count
        )));
    }
    if !geometry.uv0.is_empty() && geometry.uv0.len() != vertex_count {
        return Err(invalid(format!("{} uv0 for {} positions", geometry.uv0.len(), vertex_count)));
    }
    if let Some(uv1) = &geometry.uv1 {
        if uv1.len() != vertex_count {
            return Err(invalid(format!("{} uv1 for {} positions", uv1.len(), vertex_count)));
        }
    }
    if geometry.indices.len() % 3 != 0 {
        return Err(invalid(format!("{} indices is not a triangle list", geometry.indices.len())));
    }
    if let Some(&index) = geometry.indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(invalid(format!("index {index} out of range for {vertex_count} vertices")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Vec2, Vec3};
    use crate::scene::description::{ModelDesc, StaticModelDesc};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lightmap_baker_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn triangle_geometry() -> GeometryDesc {
        GeometryDesc {
            positions: vec![Vec3::zeros(), Vec3::x(), Vec3::z()],
            normals: vec![Vec3::y(); 3],
            uv0: vec![Vec2::zeros(); 3],
            uv1: Some(vec![Vec2::zeros(), Vec2::x(), Vec2::y()]),
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_validate_geometry() {
        let mut geometry = triangle_geometry();
        assert!(validate_geometry("tri", &geometry).is_ok());

        geometry.indices = vec![0, 1, 3];
        assert!(validate_geometry("tri", &geometry).is_err());

        geometry.indices = vec![0, 1];
        assert!(validate_geometry("tri", &geometry).is_err());

        let mut geometry = triangle_geometry();
        geometry.normals.pop();
        assert!(validate_geometry("tri", &geometry).is_err());
    }

    #[test]
    fn test_load_resolves_external_model() {
        let dir = temp_dir("scene_loader");
        let model_file = ModelFile {
            geometries: vec![triangle_geometry()],
        };
        model_file.save_to_file(dir.join("tri.ron")).unwrap();

        let scene = SceneDescription {
            models: vec![ModelDesc {
                name: "tri".to_string(),
                path: Some(PathBuf::from("tri.ron")),
                geometries: Vec::new(),
            }],
            static_models: vec![StaticModelDesc {
                name: "floor".to_string(),
                model: Some("tri".to_string()),
                lightmap: true,
                ..StaticModelDesc::default()
            }],
            ..SceneDescription::default()
        };
        let scene_path = dir.join("scene.ron");
        scene.save_to_file(&scene_path).unwrap();

        let (loaded, loader) = SceneLoader::load(&scene_path).unwrap();
        assert_eq!(loader.base_dir(), dir.as_path());
        assert_eq!(loaded.models[0].geometries.len(), 1);
        assert_eq!(loaded.static_models[0].model.as_deref(), Some("tri"));

        // Written scenes keep external geometry external
        let out_path = dir.join("scene_out.ron");
        SceneLoader::save(&loaded, &out_path).unwrap();
        let reread = SceneDescription::load_from_file(&out_path).unwrap();
        assert!(reread.models[0].geometries.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_scene_is_an_error() {
        let result = SceneLoader::load("/nonexistent/scene.ron");
        assert!(matches!(result, Err(SceneError::File { .. })));
    }
}
