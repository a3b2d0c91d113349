//! Bounce samples and the scene-owned registry the bounce light reads from
//!
//! After the direct pass every lit mesh emits one sample per triangle. The
//! registry owns copies of those samples; meshes and lights only refer to
//! them by index, so nothing here extends a mesh's lifetime.

use crate::bake::mesh::BakeMeshId;
use crate::foundation::math::{Color, Vec3};
use crate::geometry::AABB;
use crate::spatial::{Octree, OctreeConfig};

/// Radius over which a bounce sample with the given radiance has influence
pub fn influence_radius(radiance: Color) -> f32 {
    radiance.magnitude() / 3.0 * 8.0
}

/// Light re-emitted by one triangle after direct lighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceSample {
    /// Emitting mesh
    pub mesh: BakeMeshId,
    /// Emitting triangle within the mesh
    pub triangle: u32,
    /// World position (triangle centroid)
    pub position: Vec3,
    /// Face normal
    pub normal: Vec3,
    /// Emitted radiance (source color tinted by the material)
    pub radiance: Color,
    /// Mean direct radiance received by the triangle
    pub source_color: Color,
}

impl BounceSample {
    /// Radius this sample reaches
    pub fn radius(&self) -> f32 {
        influence_radius(self.radiance)
    }
}

/// All bounce samples of a scene, indexed spatially
#[derive(Debug, Clone)]
pub struct BounceRegistry {
    samples: Vec<BounceSample>,
    index: Octree<usize>,
}

impl BounceRegistry {
    /// Build the registry from every mesh's samples
    pub fn new(samples: Vec<BounceSample>) -> Self {
        let mut bounds = AABB::from_points(samples.iter().map(|s| &s.position));
        if bounds.is_empty() {
            bounds = AABB::new(Vec3::zeros(), Vec3::zeros());
        }
        // Cubic root cell so subdivision is even along every axis
        let half = bounds.extents().max() + 1.0;
        let cube = AABB::from_center_extents(bounds.center(), Vec3::repeat(half));

        let mut index = Octree::new(cube, OctreeConfig::default());
        for (i, sample) in samples.iter().enumerate() {
            if !index.insert(i, sample.position, sample.radius()) {
                log::warn!("Bounce sample {} at {:?} fell outside the registry bounds", i, sample.position);
            }
        }

        log::debug!("Bounce registry holds {} samples", samples.len());
        Self { samples, index }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample by index
    pub fn get(&self, index: usize) -> Option<&BounceSample> {
        self.samples.get(index)
    }

    /// Samples whose influence radius reaches `point`
    pub fn influencing(&self, point: Vec3) -> impl Iterator<Item = &BounceSample> + '_ {
        self.index
            .query_influencing(point)
            .into_iter()
            .filter_map(|entry| self.samples.get(entry.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(position: Vec3, radiance: Color) -> BounceSample {
        BounceSample {
            mesh: BakeMeshId::default(),
            triangle: 0,
            position,
            normal: Vec3::y(),
            radiance,
            source_color: radiance,
        }
    }

    #[test]
    fn test_influence_radius() {
        // |(3,0,0)| / 3 * 8
        assert_relative_eq!(influence_radius(Color::new(3.0, 0.0, 0.0)), 8.0);
        assert_relative_eq!(influence_radius(Color::zeros()), 0.0);
    }

    #[test]
    fn test_registry_queries_by_radius() {
        let registry = BounceRegistry::new(vec![
            sample(Vec3::zeros(), Color::new(0.375, 0.0, 0.0)), // radius 1
            sample(Vec3::new(10.0, 0.0, 0.0), Color::new(3.0, 0.0, 0.0)), // radius 8
        ]);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.influencing(Vec3::new(0.5, 0.0, 0.0)).count(), 1);
        assert_eq!(registry.influencing(Vec3::new(3.0, 0.0, 0.0)).count(), 1);
        assert_eq!(registry.influencing(Vec3::new(1.5, 0.0, 0.0)).count(), 0);
    }

    #[test]
    fn test_empty_registry() {
        let registry = BounceRegistry::new(Vec::new());
        assert!(registry.is_empty());
        assert_eq!(registry.influencing(Vec3::zeros()).count(), 0);
    }
}
