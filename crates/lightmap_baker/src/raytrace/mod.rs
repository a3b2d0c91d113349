//! Ray tracing backend
//!
//! Static triangle meshes are registered one by one, then the scene is
//! committed once, which builds the acceleration structure. After commit the
//! tracer is read-only and may be queried from any number of threads.
//!
//! ```
//! use lightmap_baker::foundation::math::Vec3;
//! use lightmap_baker::geometry::Ray;
//! use lightmap_baker::raytrace::{RayTracer, RtVertex};
//!
//! let mut tracer = RayTracer::new();
//! let vertices = [
//!     RtVertex::from(Vec3::new(-1.0, 0.0, -1.0)),
//!     RtVertex::from(Vec3::new(1.0, 0.0, -1.0)),
//!     RtVertex::from(Vec3::new(0.0, 0.0, 1.0)),
//! ];
//! tracer.register_mesh(&vertices, &[0, 1, 2]).unwrap();
//! tracer.commit().unwrap();
//!
//! let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.001, 10.0);
//! assert!(tracer.occluded(&ray));
//! ```

pub mod bvh;
pub mod filter;
pub mod fp_mode;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;
use crate::geometry::{Ray, Triangle};
use bvh::Bvh;

pub use filter::{AlphaCutoutFilter, OcclusionFilter};

/// Vertex layout accepted by [`RayTracer::register_mesh`], 16 bytes per vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct RtVertex {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Z coordinate
    pub z: f32,
    /// Padding to 16 bytes
    pub pad: f32,
}

impl From<Vec3> for RtVertex {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z, pad: 0.0 }
    }
}

impl RtVertex {
    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Handle to a registered mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u32);

impl GeometryId {
    /// Raw index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closest-hit query result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Mesh that was hit
    pub geometry: GeometryId,
    /// Triangle within that mesh
    pub primitive: u32,
    /// Ray distance
    pub t: f32,
    /// Barycentric weight of the triangle's second vertex
    pub u: f32,
    /// Barycentric weight of the triangle's third vertex
    pub v: f32,
}

/// Ray tracing errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RayTraceError {
    /// A mesh without vertices or triangles
    #[error("Mesh has no geometry ({vertices} vertices, {indices} indices)")]
    EmptyGeometry {
        /// Vertex count
        vertices: usize,
        /// Index count
        indices: usize,
    },

    /// Index count not divisible by three
    #[error("Index count {0} is not a multiple of 3")]
    RaggedIndices(usize),

    /// Index past the end of the vertex array
    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Vertex count of the mesh
        vertex_count: usize,
    },

    /// Geometry changes after the scene was committed
    #[error("Scene is already committed")]
    AlreadyCommitted,

    /// Handle not issued by this tracer
    #[error("Unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),
}

#[derive(Debug)]
struct Geometry {
    vertices: Vec<RtVertex>,
    triangles: Vec<[u32; 3]>,
    filter: Option<Arc<dyn OcclusionFilter>>,
}

/// Static scene ray tracer
#[derive(Debug)]
pub struct RayTracer {
    geometries: Vec<Geometry>,
    /// (geometry, primitive) of each triangle in BVH build order
    triangle_owners: Vec<(u32, u32)>,
    bvh: Option<Bvh>,
    flush_to_zero: bool,
}

impl Default for RayTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl RayTracer {
    /// Create an empty tracer
    ///
    /// Enables flush-to-zero and denormals-are-zero on the calling thread;
    /// worker threads enable them through [`fp_mode::enable_flush_to_zero`].
    pub fn new() -> Self {
        let flush_to_zero = fp_mode::enable_flush_to_zero();
        if !flush_to_zero {
            log::debug!("Flush-to-zero is not available on this target");
        }

        Self {
            geometries: Vec::new(),
            triangle_owners: Vec::new(),
            bvh: None,
            flush_to_zero,
        }
    }

    /// Whether FTZ/DAZ were enabled at construction
    pub const fn flush_to_zero(&self) -> bool {
        self.flush_to_zero
    }

    /// Register a static triangle mesh given as a flat index list
    pub fn register_mesh(&mut self, vertices: &[RtVertex], indices: &[u32]) -> Result<GeometryId, RayTraceError> {
        if self.is_committed() {
            return Err(RayTraceError::AlreadyCommitted);
        }
        if vertices.is_empty() || indices.is_empty() {
            return Err(RayTraceError::EmptyGeometry {
                vertices: vertices.len(),
                indices: indices.len(),
            });
        }

        let triangles: &[[u32; 3]] = bytemuck::try_cast_slice(indices)
            .map_err(|_| RayTraceError::RaggedIndices(indices.len()))?;
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RayTraceError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }

        let id = GeometryId(self.geometries.len() as u32);
        self.geometries.push(Geometry {
            vertices: vertices.to_vec(),
            triangles: triangles.to_vec(),
            filter: None,
        });
        Ok(id)
    }

    /// Attach an occlusion filter consulted for hits on `geometry`
    pub fn set_occlusion_filter(&mut self, geometry: GeometryId, filter: Arc<dyn OcclusionFilter>) -> Result<(), RayTraceError> {
        if self.is_committed() {
            return Err(RayTraceError::AlreadyCommitted);
        }
        let entry = self
            .geometries
            .get_mut(geometry.index())
            .ok_or(RayTraceError::UnknownGeometry(geometry))?;
        entry.filter = Some(filter);
        Ok(())
    }

    /// Build the acceleration structure; must be called exactly once
    pub fn commit(&mut self) -> Result<(), RayTraceError> {
        if self.is_committed() {
            return Err(RayTraceError::AlreadyCommitted);
        }

        let mut triangles = Vec::new();
        let mut owners = Vec::new();
        for (geometry_index, geometry) in self.geometries.iter().enumerate() {
            for (primitive, tri) in geometry.triangles.iter().enumerate() {
                let [a, b, c] = tri.map(|i| geometry.vertices[i as usize].position());
                triangles.push(Triangle::new(a, b, c));
                owners.push((geometry_index as u32, primitive as u32));
            }
        }

        self.bvh = Some(Bvh::build(&triangles));
        self.triangle_owners = owners;

        log::info!(
            "Committed ray tracing scene: {} meshes, {} triangles",
            self.geometries.len(),
            self.triangle_owners.len()
        );
        Ok(())
    }

    /// Whether `commit` has run
    pub const fn is_committed(&self) -> bool {
        self.bvh.is_some()
    }

    /// Number of registered meshes
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Whether anything blocks the ray segment
    ///
    /// Uncommitted scenes block nothing.
    pub fn occluded(&self, ray: &Ray) -> bool {
        self.bvh
            .as_ref()
            .is_some_and(|bvh| bvh.any_hit(ray, |triangle, u, v| self.keeps_hit(triangle, u, v)))
    }

    /// Closest hit along the ray segment
    pub fn intersect(&self, ray: &Ray) -> Option<RayHit> {
        let bvh = self.bvh.as_ref()?;
        let hit = bvh.closest_hit(ray, |triangle, u, v| self.keeps_hit(triangle, u, v))?;
        let (geometry, primitive) = self.triangle_owners[hit.triangle];
        Some(RayHit {
            geometry: GeometryId(geometry),
            primitive,
            t: hit.t,
            u: hit.u,
            v: hit.v,
        })
    }

    fn keeps_hit(&self, triangle: usize, u: f32, v: f32) -> bool {
        let (geometry, primitive) = self.triangle_owners[triangle];
        self.geometries[geometry as usize]
            .filter
            .as_ref()
            .map_or(true, |filter| filter.blocks(primitive, u, v))
    }
}
