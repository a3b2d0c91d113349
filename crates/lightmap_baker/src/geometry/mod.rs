//! Geometric primitives shared by the ray tracer, rasterizer and bake records

pub mod bounds;
pub mod primitives;

pub use bounds::AABB;
pub use primitives::{Ray, Triangle};
