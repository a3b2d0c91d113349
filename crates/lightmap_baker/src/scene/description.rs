//! Serializable scene types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::foundation::math::{Color, Transform, Vec2, Vec3, Vec4};
use crate::geometry::AABB;

/// Node transform as authored: position, euler rotation in degrees, scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDesc {
    /// World position
    pub position: Vec3,
    /// Euler angles in degrees, applied X then Y then Z
    pub rotation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for TransformDesc {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformDesc {
    /// Transform at a position with no rotation
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the euler rotation in degrees
    pub fn with_rotation(mut self, degrees: Vec3) -> Self {
        self.rotation = degrees;
        self
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Resolve into a math transform
    pub fn to_transform(&self) -> Transform {
        Transform::from_euler_degrees(self.position, self.rotation, self.scale)
    }
}

/// One LOD-0 vertex stream and its triangle list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryDesc {
    /// Object-space positions
    pub positions: Vec<Vec3>,
    /// Object-space normals, one per position
    pub normals: Vec<Vec3>,
    /// Material texture coordinates; may be empty
    pub uv0: Vec<Vec2>,
    /// Lightmap texture coordinates; `None` disqualifies the model from lightmapping
    pub uv1: Option<Vec<Vec2>>,
    /// Flat triangle index list
    pub indices: Vec<u32>,
}

/// Geometry shared by static model instances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDesc {
    /// Name referenced by instances
    pub name: String,
    /// External model file, relative to the scene file; replaces `geometries` when set
    pub path: Option<PathBuf>,
    /// Geometries, one per material slot
    pub geometries: Vec<GeometryDesc>,
}

/// On-disk model file referenced by `ModelDesc::path`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFile {
    /// Geometries, one per material slot
    pub geometries: Vec<GeometryDesc>,
}

impl Config for ModelFile {}

/// Surface material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// Name referenced by instances
    pub name: String,
    /// Diffuse texture, relative to the scene file; its alpha drives shadow cutouts
    pub diffuse_texture: Option<PathBuf>,
    /// Diffuse color, tints bounced light
    pub diffuse_color: Color,
    /// Texture alpha below this lets shadow rays through
    pub alpha_threshold: f32,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_texture: None,
            diffuse_color: Color::new(1.0, 1.0, 1.0),
            alpha_threshold: 1.0,
        }
    }
}

/// Static model instance; the baker writes `lightmap_index` and `lightmap_tiling_offset` back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticModelDesc {
    /// Instance name used in logs
    pub name: String,
    /// World transform
    pub transform: TransformDesc,
    /// Model name, or `None` for an empty component
    pub model: Option<String>,
    /// Material names, one per geometry; missing entries use the default material
    pub materials: Vec<String>,
    /// Request a baked lightmap
    pub lightmap: bool,
    /// Explicit lightmap resolution; 0 derives it from the bounds
    pub lightmap_size: u32,
    /// Multiplier on the derived lightmap resolution
    pub lightmap_scale: f32,
    /// Block light for other instances
    pub cast_shadows: bool,
    /// Zones this instance may be assigned to
    pub zone_mask: u32,
    /// Dynamic light mask, cleared once a lightmap is assigned
    pub light_mask: u32,
    /// Atlas index written by the baker
    pub lightmap_index: Option<u32>,
    /// Atlas scale and offset `[sx, sy, ox, oy]` written by the baker
    pub lightmap_tiling_offset: Vec4,
}

impl Default for StaticModelDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: TransformDesc::default(),
            model: None,
            materials: Vec::new(),
            lightmap: false,
            lightmap_size: 0,
            lightmap_scale: 1.0,
            cast_shadows: true,
            zone_mask: u32::MAX,
            light_mask: u32::MAX,
            lightmap_index: None,
            lightmap_tiling_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
        }
    }
}

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinitely distant light travelling along the node forward axis
    Directional,
    /// Omni light with a finite range
    Point,
}

/// Light component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightDesc {
    /// Light name used in logs
    pub name: String,
    /// Light type
    pub kind: LightKind,
    /// Node transform; position for point lights, orientation for directional lights
    pub transform: TransformDesc,
    /// Linear color
    pub color: Color,
    /// Scalar applied to color
    pub brightness: f32,
    /// Point light range
    pub range: f32,
}

impl Default for LightDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: LightKind::Directional,
            transform: TransformDesc::default(),
            color: Color::new(1.0, 1.0, 1.0),
            brightness: 1.0,
            range: 10.0,
        }
    }
}

impl LightDesc {
    /// Color multiplied by brightness
    pub fn effective_color(&self) -> Color {
        self.color * self.brightness
    }
}

/// Ambient zone volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneDesc {
    /// Zone name used in logs
    pub name: String,
    /// World-space volume
    pub bounds: AABB,
    /// Ambient color
    pub ambient_color: Color,
    /// Higher priority wins when zones overlap
    pub priority: i32,
    /// Instances whose zone mask shares a bit may be assigned
    pub zone_mask: u32,
}

impl Default for ZoneDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            bounds: AABB::new(Vec3::repeat(-1000.0), Vec3::repeat(1000.0)),
            ambient_color: Color::new(0.1, 0.1, 0.1),
            priority: 0,
            zone_mask: u32::MAX,
        }
    }
}

/// Complete bake input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    /// Model library
    pub models: Vec<ModelDesc>,
    /// Material library
    pub materials: Vec<MaterialDesc>,
    /// Static model instances
    pub static_models: Vec<StaticModelDesc>,
    /// Lights
    pub lights: Vec<LightDesc>,
    /// Ambient zones
    pub zones: Vec<ZoneDesc>,
}

impl Config for SceneDescription {}

impl SceneDescription {
    /// Find a model by name
    pub fn model(&self, name: &str) -> Option<&ModelDesc> {
        self.models.iter().find(|model| model.name == name)
    }

    /// Find a material by name
    pub fn material(&self, name: &str) -> Option<&MaterialDesc> {
        self.materials.iter().find(|material| material.name == name)
    }
}
