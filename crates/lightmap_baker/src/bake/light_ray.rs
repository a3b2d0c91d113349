//! Per-texel sample context handed to the light models

use crate::bake::mesh::BakeMeshId;
use crate::foundation::math::{Color, Vec2, Vec3};
use crate::geometry::Ray;
use crate::raytrace::{RayHit, RayTracer};

/// Surface point seeded from one lightmap texel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Owning mesh
    pub mesh: BakeMeshId,
    /// Texel column
    pub x: u32,
    /// Texel row
    pub y: u32,
    /// World position
    pub position: Vec3,
    /// World normal, unit length
    pub normal: Vec3,
    /// Material texture coordinate
    pub uv0: Vec2,
    /// Lightmap texture coordinate
    pub uv1: Vec2,
    /// Source triangle within the mesh
    pub triangle: u32,
    /// Zone the mesh was assigned to
    pub zone: Option<usize>,
}

impl SamplePoint {
    /// Stable per-texel seed for stochastic sampling
    pub fn seed(&self) -> u64 {
        use slotmap::Key;

        let texel = (u64::from(self.y) << 32) | u64::from(self.x);
        self.mesh.data().as_ffi() ^ texel.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// Reusable ray plus the sample it is cast from
#[derive(Debug, Clone, Copy)]
pub struct LightRay {
    /// Current ray segment
    pub ray: Ray,
    /// Result of the last intersection query
    pub hit: Option<RayHit>,
    /// Sample being lit
    pub sample: SamplePoint,
}

impl LightRay {
    /// Ray context for a sample, with an empty segment at the sample position
    pub fn new(sample: SamplePoint) -> Self {
        Self {
            ray: Ray::new(sample.position, sample.normal, 0.0, 0.0),
            hit: None,
            sample,
        }
    }

    /// Aim the ray from the sample position
    pub fn set(&mut self, direction: Vec3, t_near: f32, t_far: f32) {
        self.ray = Ray::new(self.sample.position, direction, t_near, t_far);
        self.hit = None;
    }

    /// Shadow query for the current segment
    pub fn occluded(&self, tracer: &RayTracer) -> bool {
        tracer.occluded(&self.ray)
    }

    /// Closest-hit query for the current segment; the hit is kept on the ray
    pub fn intersect(&mut self, tracer: &RayTracer) -> Option<RayHit> {
        self.hit = tracer.intersect(&self.ray);
        self.hit
    }
}

/// Light category a contribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadianceMode {
    /// Zone ambient
    Ambient,
    /// Directional and point lights
    Direct,
    /// Bounce light
    Indirect,
}

/// Receives light model output for one texel
pub trait RadianceSink {
    /// Add radiance to texel `(x, y)`
    fn contribute_radiance(&mut self, x: u32, y: u32, color: Color, mode: RadianceMode);
}

/// Number of contributions per mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributionCounts {
    /// Ambient contributions
    pub ambient: u64,
    /// Direct contributions
    pub direct: u64,
    /// Indirect contributions
    pub indirect: u64,
}

impl ContributionCounts {
    /// Count one contribution
    pub fn record(&mut self, mode: RadianceMode) {
        match mode {
            RadianceMode::Ambient => self.ambient += 1,
            RadianceMode::Direct => self.direct += 1,
            RadianceMode::Indirect => self.indirect += 1,
        }
    }

    /// Add another set of counts
    pub fn merge(&mut self, other: &Self) {
        self.ambient += other.ambient;
        self.direct += other.direct;
        self.indirect += other.indirect;
    }

    /// Total contributions
    pub const fn total(&self) -> u64 {
        self.ambient + self.direct + self.indirect
    }
}

/// Collects the contributions for a single texel on a worker thread
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TexelAccumulator {
    /// Summed radiance, `None` until something contributes
    pub radiance: Option<Color>,
    /// Contributions per mode
    pub counts: ContributionCounts,
}

impl RadianceSink for TexelAccumulator {
    fn contribute_radiance(&mut self, _x: u32, _y: u32, color: Color, mode: RadianceMode) {
        self.radiance = Some(self.radiance.map_or(color, |sum| sum + color));
        self.counts.record(mode);
    }
}
