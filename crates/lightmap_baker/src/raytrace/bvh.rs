//! Bounding volume hierarchy over world-space triangles
//!
//! Built once when the ray tracer is committed. Nodes are stored depth-first
//! in a flat array: an interior node's left child directly follows it and
//! `offset` holds the right child index; a leaf's `offset` is the start of
//! its run of triangles.

use crate::foundation::math::Vec3;
use crate::geometry::{Ray, Triangle, AABB};

/// Triangles per leaf before splitting
const MAX_LEAF_TRIANGLES: usize = 4;

/// Traversal stack depth; median splits keep the tree depth near log2(n)
const MAX_STACK_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: AABB,
    offset: u32,
    count: u32,
}

impl BvhNode {
    const fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// A hit reported by traversal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    /// Index of the triangle in build order
    pub triangle: usize,
    /// Ray distance
    pub t: f32,
    /// Barycentric weight of the second vertex
    pub u: f32,
    /// Barycentric weight of the third vertex
    pub v: f32,
}

/// Triangle BVH
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
    /// Original index of each reordered triangle
    indices: Vec<u32>,
}

impl Bvh {
    /// Build a hierarchy; triangle indices in hits refer to `triangles` order
    pub fn build(triangles: &[Triangle]) -> Self {
        let count = triangles.len();
        if count == 0 {
            return Self::default();
        }

        let tri_bounds: Vec<AABB> = triangles
            .iter()
            .map(|tri| AABB::from_points([tri.v0, tri.v1, tri.v2].iter()))
            .collect();
        let centroids: Vec<Vec3> = triangles.iter().map(Triangle::centroid).collect();

        let mut order: Vec<u32> = (0..count as u32).collect();
        let mut nodes = Vec::with_capacity(count * 2 / MAX_LEAF_TRIANGLES + 1);
        build_node(&mut nodes, &mut order, 0, &tri_bounds, &centroids);

        let reordered = order.iter().map(|&i| triangles[i as usize]).collect();

        log::debug!("Built BVH: {} triangles, {} nodes", count, nodes.len());

        Self {
            nodes,
            triangles: reordered,
            indices: order,
        }
    }

    /// Number of triangles in the hierarchy
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of everything in the hierarchy
    pub fn bounds(&self) -> AABB {
        self.nodes.first().map_or_else(AABB::empty, |node| node.bounds)
    }

    /// Closest hit within the ray segment that `accept` keeps
    pub fn closest_hit(&self, ray: &Ray, accept: impl FnMut(usize, f32, f32) -> bool) -> Option<BvhHit> {
        self.trace(ray, false, accept)
    }

    /// Whether any hit within the ray segment is kept by `accept`
    pub fn any_hit(&self, ray: &Ray, accept: impl FnMut(usize, f32, f32) -> bool) -> bool {
        self.trace(ray, true, accept).is_some()
    }

    fn trace(&self, ray: &Ray, any_hit: bool, mut accept: impl FnMut(usize, f32, f32) -> bool) -> Option<BvhHit> {
        if self.nodes.is_empty() || ray.t_near > ray.t_far {
            return None;
        }

        let inv_dir = ray.inv_direction();
        let mut t_far = ray.t_far;
        let mut best = None;

        let mut stack = [0u32; MAX_STACK_DEPTH];
        let mut stack_len = 1;

        while stack_len > 0 {
            stack_len -= 1;
            let node_index = stack[stack_len] as usize;
            let node = &self.nodes[node_index];

            if node.bounds.intersect_segment(ray.origin, inv_dir, ray.t_near, t_far).is_none() {
                continue;
            }

            if node.is_leaf() {
                let start = node.offset as usize;
                for slot in start..start + node.count as usize {
                    let Some((t, u, v)) = self.triangles[slot].intersect_ray(ray.origin, ray.direction) else {
                        continue;
                    };
                    if t < ray.t_near || t > t_far {
                        continue;
                    }

                    let triangle = self.indices[slot] as usize;
                    if !accept(triangle, u, v) {
                        continue;
                    }

                    best = Some(BvhHit { triangle, t, u, v });
                    if any_hit {
                        return best;
                    }
                    t_far = t;
                }
            } else if stack_len + 2 <= MAX_STACK_DEPTH {
                stack[stack_len] = node.offset;
                stack[stack_len + 1] = (node_index + 1) as u32;
                stack_len += 2;
            } else {
                log::warn!("BVH traversal stack exhausted, ray result may be incomplete");
            }
        }

        best
    }
}

fn build_node(
    nodes: &mut Vec<BvhNode>,
    order: &mut [u32],
    offset: usize,
    tri_bounds: &[AABB],
    centroids: &[Vec3],
) -> usize {
    let mut bounds = AABB::empty();
    let mut centroid_bounds = AABB::empty();
    for &i in order.iter() {
        bounds.merge(&tri_bounds[i as usize]);
        centroid_bounds.merge_point(centroids[i as usize]);
    }

    let index = nodes.len();
    if order.len() <= MAX_LEAF_TRIANGLES {
        nodes.push(BvhNode {
            bounds,
            offset: offset as u32,
            count: order.len() as u32,
        });
        return index;
    }

    // Placeholder until the right child index is known
    nodes.push(BvhNode { bounds, offset: 0, count: 0 });

    let axis = centroid_bounds.longest_axis();
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
    });

    let (left, right) = order.split_at_mut(mid);
    build_node(nodes, left, offset, tri_bounds, centroids);
    let right_index = build_node(nodes, right, offset + mid, tri_bounds, centroids);
    nodes[index].offset = right_index as u32;

    index
}
