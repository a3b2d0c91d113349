//! Top-level bake error

use crate::bake::mesh::MeshError;
use crate::bake::packer::LightmapError;
use crate::bake::scene_baker::BakePhase;
use crate::raytrace::RayTraceError;
use crate::scene::SceneError;

/// Errors that stop a bake phase
#[derive(thiserror::Error, Debug)]
pub enum BakeError {
    /// Settings rejected by validation
    #[error("Invalid bake settings: {0}")]
    InvalidSettings(String),

    /// The worker pool running the ray queries could not be created
    #[error("Failed to create the ray tracing worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Scene could not be read, parsed or written
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Ray tracer setup failed
    #[error("Ray tracer error: {0}")]
    RayTrace(#[from] RayTraceError),

    /// A mesh was driven out of order
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Atlases could not be written
    #[error(transparent)]
    Lightmap(#[from] LightmapError),

    /// Phase called out of order
    #[error("{operation} requires phase {expected:?}, baker is {actual:?}")]
    InvalidPhase {
        /// Operation attempted
        operation: &'static str,
        /// Phase the operation needs
        expected: BakePhase,
        /// Current phase
        actual: BakePhase,
    },
}
