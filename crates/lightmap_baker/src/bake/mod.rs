//! Lightmap baking
//!
//! Mesh bake records, the light models evaluated per texel, radiance map
//! post-processing, atlas packing and the [`SceneBaker`] that sequences them.

pub mod bounce;
pub mod light;
pub mod light_ray;
pub mod mesh;
pub mod packer;
pub mod radiance_map;
pub mod scene_baker;
pub mod skyline;

pub use bounce::{BounceRegistry, BounceSample};
pub use light::{BakeLight, DirectionalLight, LightingContext, PointLight, ZoneAmbientLight, BounceLight};
pub use light_ray::{LightRay, RadianceMode, RadianceSink, SamplePoint};
pub use mesh::{BakeMesh, BakeMeshId, BakeMeshState, MeshError};
pub use packer::{AtlasAssignment, LightmapAtlas, LightmapError, LightmapPacker};
pub use radiance_map::{RadianceGrid, RadianceMap};
pub use scene_baker::{BakePhase, BakeStats, SceneBaker};
