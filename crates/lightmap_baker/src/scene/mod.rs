//! Scene description consumed and rewritten by the baker
//!
//! A scene is a flat list of static model instances, lights and zones with
//! their world transforms, plus the model geometry and materials they
//! reference. It is read from and written back to TOML or RON.

pub mod description;
pub mod loader;

pub use description::{
    GeometryDesc,
    LightDesc,
    LightKind,
    MaterialDesc,
    ModelDesc,
    SceneDescription,
    StaticModelDesc,
    TransformDesc,
    ZoneDesc,
};
pub use loader::{SceneError, SceneLoader};
