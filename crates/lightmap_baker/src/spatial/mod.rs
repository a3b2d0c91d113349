//! Spatial partitioning for point queries

pub mod octree;

pub use octree::{Octree, OctreeConfig, OctreeEntry};
