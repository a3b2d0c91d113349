//! Ray and triangle primitives

use crate::foundation::math::Vec3;

/// A ray segment `origin + t * direction` for `t` in `[t_near, t_far]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin point
    pub origin: Vec3,
    /// Ray direction (should be normalized)
    pub direction: Vec3,
    /// Start of the valid segment
    pub t_near: f32,
    /// End of the valid segment
    pub t_far: f32,
}

impl Ray {
    /// Create a new ray segment
    pub const fn new(origin: Vec3, direction: Vec3, t_near: f32, t_far: f32) -> Self {
        Self { origin, direction, t_near, t_far }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Component-wise reciprocal of the direction, infinite on zero components
    pub fn inv_direction(&self) -> Vec3 {
        self.direction.map(|d| if d != 0.0 { 1.0 / d } else { f32::INFINITY })
    }
}

/// A triangle in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Create a new triangle
    pub const fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal following the winding order
    pub fn cross(&self) -> Vec3 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal, zero for degenerate triangles
    pub fn normal(&self) -> Vec3 {
        self.cross().try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros)
    }

    /// Triangle area
    pub fn area(&self) -> f32 {
        self.cross().magnitude() * 0.5
    }

    /// Get the centroid of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Test ray intersection using the Möller–Trumbore algorithm
    ///
    /// Returns `(t, u, v)` where the hit point is `(1-u-v)*v0 + u*v1 + v*v2`.
    /// Both faces are hit; the caller checks `t` against its segment.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 1e-9;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        Some((t, u, v))
    }
}
