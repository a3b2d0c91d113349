//! Light models
//!
//! Every light category evaluates one texel sample at a time and reports at
//! most one contribution to the sink. Evaluation is read-only with respect to
//! the scene, so samples can be lit in parallel.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::bake::bounce::{influence_radius, BounceRegistry};
use crate::bake::light_ray::{LightRay, RadianceMode, RadianceSink};
use crate::core::config::GlowSettings;
use crate::foundation::math::{constants, Color, Vec3};
use crate::raytrace::RayTracer;
use crate::scene::{LightDesc, LightKind, ZoneDesc};

/// Offset keeping rays off the surface they start on
pub const RAY_EPSILON: f32 = 0.001;

/// Shadow ray length for directional lights
pub const DIRECTIONAL_TFAR: f32 = 100_000.0;

/// Squared magnitude below which a contribution is dropped
pub const CONTRIBUTION_EPSILON: f32 = 1e-4;

/// AO directions closer than this to the surface plane are rejected
pub const AO_MIN_COSINE: f32 = 0.1;

/// Shared state for evaluating lights
#[derive(Debug, Clone, Copy)]
pub struct LightingContext<'a> {
    /// Committed ray tracer
    pub tracer: &'a RayTracer,
    /// Bake settings
    pub settings: &'a GlowSettings,
    /// Bounce samples, present during the bounce pass only
    pub bounce: Option<&'a BounceRegistry>,
}

/// Sun-like light travelling along `direction`
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, unit length
    pub direction: Vec3,
    /// Linear color
    pub color: Color,
}

/// Omni light with a linear falloff to `range`
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    /// World position
    pub position: Vec3,
    /// Linear color
    pub color: Color,
    /// Distance at which the light stops contributing
    pub range: f32,
}

/// Ambient term of one zone, optionally darkened by ambient occlusion
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneAmbientLight {
    /// Index of the zone in the scene
    pub zone: usize,
    /// Ambient color
    pub color: Color,
}

/// Indirect light gathered from other meshes' bounce samples
#[derive(Debug, Clone, PartialEq)]
pub struct BounceLight {
    /// Scale applied to gathered light
    pub intensity: f32,
}

impl Default for BounceLight {
    fn default() -> Self {
        Self { intensity: 1.0 }
    }
}

/// A light model
#[derive(Debug, Clone, PartialEq)]
pub enum BakeLight {
    /// Directional light
    Directional(DirectionalLight),
    /// Point light
    Point(PointLight),
    /// Zone ambient light
    ZoneAmbient(ZoneAmbientLight),
    /// Bounce light
    Bounce(BounceLight),
}

impl BakeLight {
    /// Light model for a scene light
    pub fn from_desc(desc: &LightDesc) -> Option<Self> {
        let color = desc.effective_color();
        match desc.kind {
            LightKind::Directional => {
                let direction = desc.transform.to_transform().forward().try_normalize(f32::EPSILON)?;
                Some(Self::Directional(DirectionalLight { direction, color }))
            }
            LightKind::Point => (desc.range > 0.0).then(|| {
                Self::Point(PointLight {
                    position: desc.transform.position,
                    color,
                    range: desc.range,
                })
            }),
        }
    }

    /// Ambient light model for a scene zone
    pub fn from_zone(zone: usize, desc: &ZoneDesc) -> Self {
        Self::ZoneAmbient(ZoneAmbientLight {
            zone,
            color: desc.ambient_color,
        })
    }

    /// Evaluate this light for the sample carried by `ray`
    pub fn contribute(&self, ray: &mut LightRay, ctx: &LightingContext<'_>, sink: &mut impl RadianceSink) {
        let contribution = match self {
            Self::Directional(light) => light.evaluate(ray, ctx),
            Self::Point(light) => light.evaluate(ray, ctx),
            Self::ZoneAmbient(light) => light.evaluate(ray, ctx),
            Self::Bounce(light) => light.evaluate(ray, ctx),
        };

        if let Some((color, mode)) = contribution {
            sink.contribute_radiance(ray.sample.x, ray.sample.y, color, mode);
        }
    }
}

impl DirectionalLight {
    fn evaluate(&self, ray: &mut LightRay, ctx: &LightingContext<'_>) -> Option<(Color, RadianceMode)> {
        let to_light = -self.direction;
        let cos_theta = ray.sample.normal.dot(&to_light);
        if cos_theta <= 0.0 {
            return None;
        }

        ray.set(to_light, RAY_EPSILON, DIRECTIONAL_TFAR);
        if ray.occluded(ctx.tracer) {
            return None;
        }

        Some((self.color * cos_theta, RadianceMode::Direct))
    }
}

impl PointLight {
    fn evaluate(&self, ray: &mut LightRay, ctx: &LightingContext<'_>) -> Option<(Color, RadianceMode)> {
        let offset = self.position - ray.sample.position;
        let distance = offset.magnitude();
        if distance >= self.range {
            return None;
        }

        // A sample at the light itself has no direction to shadow test
        if distance <= RAY_EPSILON {
            return Some((self.color, RadianceMode::Direct));
        }

        let to_light = offset / distance;
        let cos_theta = ray.sample.normal.dot(&to_light);
        if cos_theta <= 0.0 {
            return None;
        }

        let attenuation = (1.0 - 1.2 * distance / self.range).max(0.0) * cos_theta;
        let color = self.color * attenuation;
        if color.magnitude_squared() < CONTRIBUTION_EPSILON {
            return None;
        }

        ray.set(to_light, RAY_EPSILON, distance);
        if ray.occluded(ctx.tracer) {
            return None;
        }

        Some((color, RadianceMode::Direct))
    }
}

impl ZoneAmbientLight {
    fn evaluate(&self, ray: &mut LightRay, ctx: &LightingContext<'_>) -> Option<(Color, RadianceMode)> {
        if ray.sample.zone != Some(self.zone) {
            return None;
        }

        let settings = ctx.settings;
        let factor = if settings.ao_enabled {
            ambient_occlusion(ray, ctx)
        } else {
            1.0
        };

        Some((self.color * factor, RadianceMode::Ambient))
    }
}

/// AO factor in `[ao_min, 1]` from uniformly distributed sphere directions
fn ambient_occlusion(ray: &mut LightRay, ctx: &LightingContext<'_>) -> f32 {
    let settings = ctx.settings;
    let normal = ray.sample.normal;
    let mut rng = SmallRng::seed_from_u64(ray.sample.seed());

    let mut accepted = 0u32;
    let mut occlusion = 0.0f32;

    for _ in 0..settings.nsamples {
        let z = 2.0 * rng.gen::<f32>() - 1.0;
        let t = constants::TAU * rng.gen::<f32>();
        let r = (1.0 - z * z).max(0.0).sqrt();
        let direction = Vec3::new(r * t.cos(), r * t.sin(), z);

        if normal.dot(&direction) < AO_MIN_COSINE {
            continue;
        }
        accepted += 1;

        ray.set(direction, RAY_EPSILON, settings.ao_depth);
        if let Some(hit) = ray.intersect(ctx.tracer) {
            occlusion += 1.0 - hit.t / settings.ao_depth;
        }
    }

    let ao = if accepted == 0 {
        1.0
    } else {
        1.0 - occlusion / accepted as f32
    };

    (ao * settings.ao_multiply).clamp(settings.ao_min.min(1.0), 1.0)
}

impl BounceLight {
    fn evaluate(&self, ray: &mut LightRay, ctx: &LightingContext<'_>) -> Option<(Color, RadianceMode)> {
        let registry = ctx.bounce?;
        let sample = &ray.sample;

        let mut sum = Color::zeros();
        let mut count = 0u32;

        for donor in registry.influencing(sample.position) {
            // Other meshes only
            if donor.mesh == sample.mesh {
                continue;
            }
            // Donor and receiver must face each other
            if donor.normal.dot(&sample.normal) > 0.0 {
                continue;
            }

            let radius = influence_radius(donor.radiance);
            let distance = (donor.position - sample.position).magnitude();
            if radius <= 0.0 || distance > radius {
                continue;
            }

            sum += donor.radiance * (1.0 - distance / radius);
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let color = sum / count as f32 * self.intensity;
        (color.magnitude_squared() >= CONTRIBUTION_EPSILON).then_some((color, RadianceMode::Indirect))
    }
}
