//! Octree spatial partitioning structure
//!
//! Divides 3D space into hierarchical regions for fast radius queries over
//! points that carry an influence radius. Each node subdivides into 8
//! octants when entry density exceeds a threshold.

use crate::foundation::math::Vec3;
use crate::geometry::AABB;

/// Configuration for octree behavior
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum entries per node before subdivision
    pub max_entries_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node size (prevents excessive subdivision)
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entries_per_node: 8,
            max_depth: 8,
            min_node_size: 0.25,
        }
    }
}

/// Point stored in the octree with the radius it influences
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeEntry<T> {
    /// Caller payload
    pub id: T,
    /// Position
    pub position: Vec3,
    /// Influence radius
    pub radius: f32,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
struct OctreeNode<T> {
    bounds: AABB,
    entries: Vec<OctreeEntry<T>>,
    children: Option<Box<[OctreeNode<T>; 8]>>,
    depth: u32,
}

impl<T: Copy> OctreeNode<T> {
    const fn new(bounds: AABB, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    // Octant layout: bit 0 = +X, bit 1 = +Y, bit 2 = +Z
    fn octant_index(&self, position: Vec3) -> usize {
        let center = self.bounds.center();
        let x_bit = usize::from(position.x >= center.x);
        let y_bit = usize::from(position.y >= center.y);
        let z_bit = usize::from(position.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let center = self.bounds.center();
        let quarter_extents = self.bounds.extents() * 0.5;
        let depth = self.depth + 1;

        let children = std::array::from_fn(|octant| {
            let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
            let child_center = Vec3::new(
                center.x + quarter_extents.x * sign(1),
                center.y + quarter_extents.y * sign(2),
                center.z + quarter_extents.z * sign(4),
            );
            OctreeNode::new(AABB::from_center_extents(child_center, quarter_extents), depth)
        });
        self.children = Some(Box::new(children));

        // Redistribute existing entries to children
        for entry in std::mem::take(&mut self.entries) {
            let octant = self.octant_index(entry.position);
            if let Some(children) = self.children.as_mut() {
                children[octant].entries.push(entry);
            }
        }
    }

    fn insert(&mut self, entry: OctreeEntry<T>, config: &OctreeConfig) -> bool {
        if !self.bounds.contains_point(entry.position) {
            return false;
        }

        if self.is_leaf() {
            let extents = self.bounds.extents();
            let should_subdivide = self.entries.len() >= config.max_entries_per_node
                && self.depth < config.max_depth
                && extents.x.max(extents.y).max(extents.z) > config.min_node_size;

            if !should_subdivide {
                self.entries.push(entry);
                return true;
            }
            self.subdivide();
        }

        let octant = self.octant_index(entry.position);
        self.children
            .as_mut()
            .is_some_and(|children| children[octant].insert(entry, config))
    }

    fn query_radius(&self, center: Vec3, radius: f32, results: &mut Vec<OctreeEntry<T>>) {
        // Sphere misses this node
        let closest_point = center.sup(&self.bounds.min).inf(&self.bounds.max);
        if (closest_point - center).magnitude_squared() > radius * radius {
            return;
        }

        for entry in &self.entries {
            let combined_radius = radius + entry.radius;
            if (entry.position - center).magnitude_squared() <= combined_radius * combined_radius {
                results.push(*entry);
            }
        }

        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_radius(center, radius, results);
            }
        }
    }

    fn count_entries(&self) -> usize {
        self.entries.len()
            + self
                .children
                .as_ref()
                .map_or(0, |children| children.iter().map(Self::count_entries).sum())
    }
}

/// Octree over points with an influence radius
#[derive(Debug, Clone)]
pub struct Octree<T> {
    root: OctreeNode<T>,
    config: OctreeConfig,
    /// Largest entry radius, used to widen queries
    max_entry_radius: f32,
}

impl<T: Copy> Octree<T> {
    /// Create a new octree with given world bounds
    pub const fn new(world_bounds: AABB, config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(world_bounds, 0),
            config,
            max_entry_radius: 0.0,
        }
    }

    /// Insert an entry; returns false when the position is outside the world bounds
    pub fn insert(&mut self, id: T, position: Vec3, radius: f32) -> bool {
        let inserted = self.root.insert(OctreeEntry { id, position, radius }, &self.config);
        if inserted {
            self.max_entry_radius = self.max_entry_radius.max(radius);
        }
        inserted
    }

    /// Entries whose sphere intersects the query sphere
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Vec<OctreeEntry<T>> {
        let mut results = Vec::new();
        self.root.query_radius(center, radius, &mut results);
        results
    }

    /// Entries whose influence sphere contains `point`
    ///
    /// Entries are stored by position only, so nodes are searched with the
    /// largest entry radius before the exact per-entry test.
    pub fn query_influencing(&self, point: Vec3) -> Vec<OctreeEntry<T>> {
        let mut results = Vec::new();
        self.root.query_radius(point, self.max_entry_radius, &mut results);
        results.retain(|entry| (entry.position - point).magnitude_squared() <= entry.radius * entry.radius);
        results
    }

    /// Largest entry radius inserted
    pub const fn max_entry_radius(&self) -> f32 {
        self.max_entry_radius
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.root.count_entries()
    }

    /// Whether the octree holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> AABB {
        AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0))
    }

    #[test]
    fn test_octree_basic_insertion() {
        let mut octree = Octree::new(world(), OctreeConfig::default());
        assert!(octree.insert(1u32, Vec3::zeros(), 1.0));
        assert!(!octree.insert(2u32, Vec3::new(500.0, 0.0, 0.0), 1.0));
        assert_eq!(octree.len(), 1);
    }

    #[test]
    fn test_octree_subdivision_keeps_entries() {
        let config = OctreeConfig {
            max_entries_per_node: 4,
            max_depth: 3,
            min_node_size: 1.0,
        };
        let mut octree = Octree::new(world(), config);

        // Insert entries at the same position to force subdivision down to max depth
        for i in 0..10u32 {
            assert!(octree.insert(i, Vec3::zeros(), 1.0));
        }
        assert_eq!(octree.len(), 10);
        assert_eq!(octree.query_radius(Vec3::zeros(), 0.5).len(), 10);
    }

    #[test]
    fn test_query_influencing_uses_entry_radius() {
        let mut octree = Octree::new(world(), OctreeConfig::default());
        for i in 0..50u32 {
            octree.insert(i, Vec3::new(i as f32 * 2.0 - 50.0, 0.0, 0.0), 1.0);
        }
        // A wide entry far from the query point still reaches it
        octree.insert(100, Vec3::new(0.0, 40.0, 0.0), 45.0);

        let ids: Vec<u32> = octree
            .query_influencing(Vec3::new(0.5, 0.0, 0.0))
            .iter()
            .map(|e| e.id)
            .collect();
        assert!(ids.contains(&100));
        assert!(ids.contains(&25)); // at x = 0
        assert!(!ids.contains(&30)); // at x = 10
        assert!((octree.max_entry_radius() - 45.0).abs() < f32::EPSILON);
    }
}
