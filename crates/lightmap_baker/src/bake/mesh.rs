//! Mesh bake records
//!
//! One [`BakeMesh`] exists per static model instance that either receives a
//! lightmap or casts shadows. It owns the instance's world-space geometry and,
//! for lightmapped instances, the texel grid lighting accumulates into.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> Preprocessed -> Lit -> Packed
//!        \-> Occluder   (registered for shadows only)
//!        \-> Excluded   (no lightmap UVs)
//! ```
//!
//! Preprocessing registers the geometry with the ray tracer and sizes the
//! grid. Lighting rasterizes every triangle's lightmap footprint, seeds one
//! [`SamplePoint`] per covered texel, and evaluates the applicable lights for
//! each sample on the rayon pool. Packing writes the atlas index and UV
//! remap back onto the scene instance.

use std::sync::Arc;

use rayon::prelude::*;

use crate::assets::BakeMaterial;
use crate::bake::bounce::BounceSample;
use crate::bake::light::{BakeLight, LightingContext};
use crate::bake::light_ray::{ContributionCounts, LightRay, SamplePoint, TexelAccumulator};
use crate::bake::radiance_map::{RadianceGrid, RadianceMap};
use crate::core::config::GlowSettings;
use crate::foundation::math::utils::{barycentric2, barycentric3, is_power_of_two};
use crate::foundation::math::{Color, Vec2, Vec3, Vec4};
use crate::geometry::{Triangle, AABB};
use crate::raster::{draw_triangle, FillRule};
use crate::raytrace::{AlphaCutoutFilter, GeometryId, RayTracer, RtVertex};
use crate::scene::loader::validate_geometry;
use crate::scene::{ModelDesc, SceneError, StaticModelDesc};

slotmap::new_key_type! {
    /// Handle of a mesh bake record
    pub struct BakeMeshId;
}

/// Smallest lightmap edge
pub const MIN_LIGHTMAP_SIZE: u32 = 128;

/// Largest lightmap edge
pub const MAX_LIGHTMAP_SIZE: u32 = 4096;

/// Mesh bake errors
#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    /// The model has no second UV channel to lay the lightmap out in
    #[error("Mesh '{0}' has no lightmap UV channel")]
    MissingLightmapUv(String),

    /// The model produced no triangles
    #[error("Mesh '{0}' has no geometry")]
    NoGeometry(String),

    /// The model's streams are inconsistent
    #[error(transparent)]
    InvalidModel(#[from] SceneError),

    /// Operation called out of lifecycle order
    #[error("Mesh '{mesh}' is {actual:?}, expected {expected:?}")]
    InvalidState {
        /// Mesh name
        mesh: String,
        /// State the operation needs
        expected: BakeMeshState,
        /// Current state
        actual: BakeMeshState,
    },
}

/// Lifecycle state of a mesh bake record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeMeshState {
    /// Geometry gathered
    Created,
    /// Registered and grid allocated
    Preprocessed,
    /// Lighting accumulated and radiance map generated
    Lit,
    /// Placed in an atlas
    Packed,
    /// Shadow caster without a lightmap
    Occluder,
    /// Failed preprocessing; not lightmapped
    Excluded,
}

/// World-space vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    /// Position
    pub position: Vec3,
    /// Unit normal
    pub normal: Vec3,
    /// Material texture coordinate
    pub uv0: Vec2,
    /// Lightmap texture coordinate
    pub uv1: Vec2,
}

/// Triangle of a mesh with the material it was authored with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTriangle {
    /// Index into the mesh materials (the source geometry index)
    pub material_index: usize,
    /// Vertex indices
    pub indices: [u32; 3],
}

/// Per-instance lightmap settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightmapParams {
    /// Whether the instance receives a lightmap
    pub lightmap: bool,
    /// Explicit grid edge, 0 for the heuristic
    pub size_override: u32,
    /// Texel density multiplier
    pub scale: f32,
    /// Whether the instance blocks rays
    pub cast_shadows: bool,
}

impl LightmapParams {
    /// Lightmap settings of a scene instance
    pub const fn from_instance(instance: &StaticModelDesc) -> Self {
        Self {
            lightmap: instance.lightmap,
            size_override: instance.lightmap_size,
            scale: instance.lightmap_scale,
            cast_shadows: instance.cast_shadows,
        }
    }

    /// Whether the instance gets a texel grid at all
    pub fn wants_lightmap(&self) -> bool {
        self.lightmap && self.scale > 0.0
    }
}

/// Lightmap edge for a mesh with world bounds `size`
///
/// Small objects get a higher texel density than large ones. Sizes above 512
/// that are not a power of two round down to one; the result is clamped to
/// `[MIN_LIGHTMAP_SIZE, MAX_LIGHTMAP_SIZE]`. A non-zero `size_override` wins.
pub fn lightmap_size(size: Vec3, scale: f32, size_override: u32) -> u32 {
    if size_override > 0 {
        return size_override.clamp(MIN_LIGHTMAP_SIZE, MAX_LIGHTMAP_SIZE);
    }

    let density = (1.0 - size.magnitude().min(32.0) / 32.0) * 1.5;
    let lexel_scale = 16.0 + 64.0 * density;
    let mut edge = ((size.x + size.y + size.z) * lexel_scale * scale).max(0.0) as u32;

    if edge > 512 && !is_power_of_two(edge) {
        edge = edge.next_power_of_two() / 2;
    }
    edge.clamp(MIN_LIGHTMAP_SIZE, MAX_LIGHTMAP_SIZE)
}

/// Bake record of one static model instance
#[derive(Debug)]
pub struct BakeMesh {
    id: BakeMeshId,
    name: String,
    instance: usize,
    vertices: Vec<MeshVertex>,
    triangles: Vec<MeshTriangle>,
    materials: Vec<Arc<BakeMaterial>>,
    bounds: AABB,
    params: LightmapParams,
    has_lightmap_uv: bool,
    zone: Option<usize>,
    ambient: Color,
    state: BakeMeshState,
    geometry: Option<GeometryId>,
    lights: Vec<usize>,
    grid: Option<RadianceGrid>,
    samples: Vec<SamplePoint>,
    counts: ContributionCounts,
    radiance_map: Option<RadianceMap>,
}

impl BakeMesh {
    /// Flatten a model instance into world space
    ///
    /// `instance` is the index of the static model in the scene; `materials`
    /// holds one entry per model geometry.
    pub fn from_instance(
        id: BakeMeshId,
        instance: usize,
        desc: &StaticModelDesc,
        model: &ModelDesc,
        materials: Vec<Arc<BakeMaterial>>,
    ) -> Result<Self, MeshError> {
        let transform = desc.transform.to_transform();
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        let mut has_lightmap_uv = true;

        for (geometry_index, geometry) in model.geometries.iter().enumerate() {
            validate_geometry(&model.name, geometry)?;

            let base = vertices.len() as u32;
            has_lightmap_uv &= geometry.uv1.is_some();

            for (i, position) in geometry.positions.iter().enumerate() {
                vertices.push(MeshVertex {
                    position: transform.transform_point(*position),
                    normal: transform.transform_normal(geometry.normals[i]),
                    uv0: geometry.uv0.get(i).copied().unwrap_or_else(Vec2::zeros),
                    uv1: geometry
                        .uv1
                        .as_ref()
                        .and_then(|uv1| uv1.get(i).copied())
                        .unwrap_or_else(Vec2::zeros),
                });
            }

            triangles.extend(geometry.indices.chunks_exact(3).map(|tri| MeshTriangle {
                material_index: geometry_index,
                indices: [tri[0] + base, tri[1] + base, tri[2] + base],
            }));
        }

        let name = if desc.name.is_empty() { model.name.clone() } else { desc.name.clone() };
        if triangles.is_empty() {
            return Err(MeshError::NoGeometry(name));
        }

        let bounds = AABB::from_points(vertices.iter().map(|v| &v.position));
        log::debug!(
            "Mesh '{}': {} vertices, {} triangles, bounds size {:?}",
            name,
            vertices.len(),
            triangles.len(),
            bounds.size()
        );

        Ok(Self {
            id,
            name,
            instance,
            vertices,
            triangles,
            materials,
            bounds,
            params: LightmapParams::from_instance(desc),
            has_lightmap_uv,
            zone: None,
            ambient: Color::zeros(),
            state: BakeMeshState::Created,
            geometry: None,
            lights: Vec::new(),
            grid: None,
            samples: Vec::new(),
            counts: ContributionCounts::default(),
            radiance_map: None,
        })
    }

    /// Handle of this record
    pub const fn id(&self) -> BakeMeshId {
        self.id
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the source static model in the scene
    pub const fn instance(&self) -> usize {
        self.instance
    }

    /// World bounds
    pub const fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Lifecycle state
    pub const fn state(&self) -> BakeMeshState {
        self.state
    }

    /// Lightmap settings
    pub const fn params(&self) -> &LightmapParams {
        &self.params
    }

    /// World-space vertices
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    /// Triangles
    pub fn triangles(&self) -> &[MeshTriangle] {
        &self.triangles
    }

    /// Ray tracer handle, if registration succeeded
    pub const fn geometry(&self) -> Option<GeometryId> {
        self.geometry
    }

    /// Assigned zone
    pub const fn zone(&self) -> Option<usize> {
        self.zone
    }

    /// Indices of the lights applied to this mesh
    pub fn lights(&self) -> &[usize] {
        &self.lights
    }

    /// Raw texel grid, present between preprocessing and map generation
    pub const fn grid(&self) -> Option<&RadianceGrid> {
        self.grid.as_ref()
    }

    /// Generated radiance map, until the packer takes it
    pub const fn radiance_map(&self) -> Option<&RadianceMap> {
        self.radiance_map.as_ref()
    }

    /// Contributions received per mode
    pub const fn contribution_counts(&self) -> &ContributionCounts {
        &self.counts
    }

    /// Whether this mesh carries a grid through lighting
    pub fn is_lightmapped(&self) -> bool {
        matches!(
            self.state,
            BakeMeshState::Preprocessed | BakeMeshState::Lit | BakeMeshState::Packed
        )
    }

    /// Associate the zone whose ambient light reaches this mesh
    pub fn assign_zone(&mut self, zone: usize, ambient: Color) {
        self.zone = Some(zone);
        self.ambient = ambient;
    }

    fn expect_state(&self, expected: BakeMeshState) -> Result<(), MeshError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MeshError::InvalidState {
                mesh: self.name.clone(),
                expected,
                actual: self.state,
            })
        }
    }

    /// Register with the ray tracer and size the texel grid
    ///
    /// Shadow casters are registered even when they are not lightmapped. A
    /// registration failure leaves the mesh without shadows but still bakes
    /// its lightmap.
    pub fn preprocess(&mut self, tracer: &mut RayTracer, lights: Vec<usize>) -> Result<(), MeshError> {
        self.expect_state(BakeMeshState::Created)?;

        if self.params.cast_shadows {
            self.register(tracer);
        }

        if !self.params.wants_lightmap() {
            self.state = BakeMeshState::Occluder;
            return Ok(());
        }

        if !self.has_lightmap_uv {
            self.state = BakeMeshState::Excluded;
            return Err(MeshError::MissingLightmapUv(self.name.clone()));
        }

        let size = lightmap_size(self.bounds.size(), self.params.scale, self.params.size_override);
        self.grid = Some(RadianceGrid::new(size, size));
        self.lights = lights;
        self.state = BakeMeshState::Preprocessed;

        log::debug!("Mesh '{}' preprocessed with a {}x{} lightmap", self.name, size, size);
        Ok(())
    }

    fn register(&mut self, tracer: &mut RayTracer) {
        let vertices: Vec<RtVertex> = self.vertices.iter().map(|v| RtVertex::from(v.position)).collect();
        let indices: Vec<u32> = self.triangles.iter().flat_map(|t| t.indices).collect();

        let geometry = match tracer.register_mesh(&vertices, &indices) {
            Ok(geometry) => geometry,
            Err(e) => {
                log::error!("Mesh '{}' skipped for ray tracing: {}", self.name, e);
                return;
            }
        };
        self.geometry = Some(geometry);

        if AlphaCutoutFilter::is_needed(&self.materials) {
            let filter = AlphaCutoutFilter::new(
                self.triangles.iter().map(|t| t.indices).collect(),
                self.triangles.iter().map(|t| t.material_index).collect(),
                self.vertices.iter().map(|v| v.uv0).collect(),
                self.materials.clone(),
            );
            if let Err(e) = tracer.set_occlusion_filter(geometry, Arc::new(filter)) {
                log::warn!("Mesh '{}' cutout filter not installed: {}", self.name, e);
            }
        }
    }

    /// Seed the grid and accumulate every direct and ambient light
    pub fn light_direct(&mut self, ctx: &LightingContext<'_>, lights: &[BakeLight]) -> Result<(), MeshError> {
        self.expect_state(BakeMeshState::Preprocessed)?;

        self.seed_samples();
        let direct: Vec<&BakeLight> = self
            .lights
            .iter()
            .filter_map(|&i| lights.get(i))
            .filter(|light| !matches!(light, BakeLight::Bounce(_)))
            .collect();
        self.evaluate(ctx, &direct);

        self.state = BakeMeshState::Lit;
        log::debug!(
            "Mesh '{}' lit: {} samples, {} lights, {} contributions",
            self.name,
            self.samples.len(),
            direct.len(),
            self.counts.total()
        );
        Ok(())
    }

    /// Accumulate bounce light; runs after every mesh finished [`Self::light_direct`]
    pub fn light_indirect(&mut self, ctx: &LightingContext<'_>, lights: &[BakeLight]) -> Result<(), MeshError> {
        self.expect_state(BakeMeshState::Lit)?;

        let bounce: Vec<&BakeLight> = self
            .lights
            .iter()
            .filter_map(|&i| lights.get(i))
            .filter(|light| matches!(light, BakeLight::Bounce(_)))
            .collect();
        let before = self.counts.indirect;
        self.evaluate(ctx, &bounce);

        log::debug!(
            "Mesh '{}' received {} bounce contributions",
            self.name,
            self.counts.indirect - before
        );
        Ok(())
    }

    /// Rasterize each triangle's lightmap footprint and record one sample per new texel
    fn seed_samples(&mut self) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        let extents = Vec2::new(grid.width() as f32, grid.height() as f32);
        let vertices = &self.vertices;
        let samples = &mut self.samples;
        samples.clear();

        for (triangle_index, triangle) in self.triangles.iter().enumerate() {
            let [a, b, c] = triangle.indices.map(|i| vertices[i as usize]);
            let face_normal = Triangle::new(a.position, b.position, c.position).normal();
            let uv = [a.uv1, b.uv1, c.uv1].map(|uv| uv.component_mul(&extents));

            draw_triangle(true, extents, FillRule::TopLeft, uv, |fragment| {
                if !grid.seed(fragment.x, fragment.y, triangle_index as u32) {
                    return false;
                }

                let w = fragment.barycentric;
                let normal = barycentric3(w, a.normal, b.normal, c.normal)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or(face_normal);

                samples.push(SamplePoint {
                    mesh: self.id,
                    x: fragment.x,
                    y: fragment.y,
                    position: barycentric3(w, a.position, b.position, c.position),
                    normal,
                    uv0: barycentric2(w, a.uv0, b.uv0, c.uv0),
                    uv1: barycentric2(w, a.uv1, b.uv1, c.uv1),
                    triangle: triangle_index as u32,
                    zone: self.zone,
                });
                true
            });
        }
    }

    /// Evaluate `lights` for every sample in parallel, then fold the results into the grid
    fn evaluate(&mut self, ctx: &LightingContext<'_>, lights: &[&BakeLight]) {
        if lights.is_empty() {
            return;
        }

        let results: Vec<TexelAccumulator> = self
            .samples
            .par_iter()
            .map(|sample| {
                let mut ray = LightRay::new(*sample);
                let mut acc = TexelAccumulator::default();
                for light in lights {
                    light.contribute(&mut ray, ctx, &mut acc);
                }
                acc
            })
            .collect();

        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        for (sample, acc) in self.samples.iter().zip(&results) {
            if let Some(radiance) = acc.radiance {
                grid.contribute(sample.x, sample.y, radiance);
            }
            self.counts.merge(&acc.counts);
        }
    }

    /// One bounce sample per triangle that received light
    pub fn generate_bounce_samples(&self) -> Vec<BounceSample> {
        let Some(grid) = self.grid.as_ref() else {
            return Vec::new();
        };

        let mut sums = vec![Color::zeros(); self.triangles.len()];
        let mut counts = vec![0u32; self.triangles.len()];
        for (_, _, radiance, triangle) in grid.valid_texels() {
            if let Some(t) = triangle.map(|t| t as usize).filter(|&t| t < sums.len()) {
                sums[t] += radiance;
                counts[t] += 1;
            }
        }

        self.triangles
            .iter()
            .enumerate()
            .filter(|&(i, _)| counts[i] > 0)
            .filter_map(|(i, triangle)| {
                let source_color = sums[i] / counts[i] as f32;
                if source_color.magnitude_squared() <= 0.0 {
                    return None;
                }

                let [a, b, c] = triangle.indices.map(|v| self.vertices[v as usize].position);
                let world = Triangle::new(a, b, c);
                let normal = world.normal().try_normalize(f32::EPSILON)?;
                let diffuse = self
                    .materials
                    .get(triangle.material_index)
                    .map_or_else(|| Color::repeat(1.0), |m| m.diffuse_color);

                Some(BounceSample {
                    mesh: self.id,
                    triangle: i as u32,
                    position: world.centroid(),
                    normal,
                    radiance: source_color.component_mul(&diffuse),
                    source_color,
                })
            })
            .collect()
    }

    /// Post-process the grid into a radiance map and release the raw buffers
    pub fn generate_radiance_map(&mut self, settings: &GlowSettings) -> Result<(), MeshError> {
        self.expect_state(BakeMeshState::Lit)?;

        if let Some(grid) = self.grid.take() {
            let invalid = grid.invalid_count();
            self.radiance_map = Some(RadianceMap::from_grid(self.id, grid, settings, self.ambient));
            log::debug!("Mesh '{}' radiance map ready ({} texels dilated or filled)", self.name, invalid);
        }
        self.samples = Vec::new();
        Ok(())
    }

    /// Hand the radiance map to the packer
    pub fn take_radiance_map(&mut self) -> Option<RadianceMap> {
        self.radiance_map.take()
    }

    /// Stamp the atlas placement onto the scene instance
    ///
    /// Dynamic light influence is switched off for the instance; its lighting
    /// now comes from the atlas.
    pub fn pack(&mut self, lightmap_index: u32, tiling_offset: Vec4, instance: &mut StaticModelDesc) -> Result<(), MeshError> {
        self.expect_state(BakeMeshState::Lit)?;

        instance.light_mask = 0;
        instance.lightmap_index = Some(lightmap_index);
        instance.lightmap_tiling_offset = tiling_offset;
        self.state = BakeMeshState::Packed;

        log::debug!(
            "Mesh '{}' packed into lightmap {} with tiling {:?}",
            self.name,
            lightmap_index,
            tiling_offset
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::light::DirectionalLight;
    use crate::scene::{GeometryDesc, TransformDesc};
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    /// 2x2 quad in the XZ plane facing +Y, lightmap UVs over the full square
    fn quad_model(with_uv1: bool) -> ModelDesc {
        let positions = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        let uv = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        ModelDesc {
            name: "quad".to_string(),
            path: None,
            geometries: vec![GeometryDesc {
                positions,
                normals: vec![Vec3::y(); 4],
                uv0: uv.clone(),
                uv1: with_uv1.then_some(uv),
                indices: vec![0, 2, 1, 0, 3, 2],
            }],
        }
    }

    fn instance(size: u32) -> StaticModelDesc {
        StaticModelDesc {
            name: "floor".to_string(),
            model: Some("quad".to_string()),
            lightmap: true,
            lightmap_size: size,
            ..StaticModelDesc::default()
        }
    }

    fn build(desc: &StaticModelDesc, model: &ModelDesc) -> BakeMesh {
        let mut ids: SlotMap<BakeMeshId, ()> = SlotMap::with_key();
        let id = ids.insert(());
        BakeMesh::from_instance(id, 0, desc, model, vec![Arc::new(BakeMaterial::default())]).unwrap()
    }

    #[test]
    fn test_lightmap_size_heuristic() {
        // len 2.83: density 1.367, lexel scale 103.5, 4 * 103.5
        assert_eq!(lightmap_size(Vec3::new(2.0, 0.0, 2.0), 1.0, 0), 414);
        // 20 * 69.57 = 1391, rounded down to a power of two
        assert_eq!(lightmap_size(Vec3::new(10.0, 0.0, 10.0), 1.0, 0), 1024);
        assert_eq!(lightmap_size(Vec3::new(100.0, 100.0, 100.0), 1.0, 0), MAX_LIGHTMAP_SIZE);
        assert_eq!(lightmap_size(Vec3::new(0.1, 0.1, 0.1), 1.0, 0), MIN_LIGHTMAP_SIZE);
        assert_eq!(lightmap_size(Vec3::new(2.0, 0.0, 2.0), 0.5, 0), 207);
    }

    #[test]
    fn test_lightmap_size_override_wins() {
        assert_eq!(lightmap_size(Vec3::new(100.0, 100.0, 100.0), 1.0, 256), 256);
        assert_eq!(lightmap_size(Vec3::zeros(), 1.0, 16), MIN_LIGHTMAP_SIZE);
        assert_eq!(lightmap_size(Vec3::zeros(), 1.0, 10_000), MAX_LIGHTMAP_SIZE);
    }

    #[test]
    fn test_from_instance_transforms_to_world() {
        let desc = StaticModelDesc {
            transform: TransformDesc::at(Vec3::new(0.0, 3.0, 0.0)).with_scale(Vec3::new(2.0, 1.0, 2.0)),
            ..instance(0)
        };
        let mesh = build(&desc, &quad_model(true));

        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.triangles().len(), 2);
        assert_relative_eq!(mesh.bounds().min, Vec3::new(-2.0, 3.0, -2.0));
        assert_relative_eq!(mesh.bounds().max, Vec3::new(2.0, 3.0, 2.0));
        assert_relative_eq!(mesh.vertices()[0].normal, Vec3::y());
        assert_eq!(mesh.state(), BakeMeshState::Created);
    }

    #[test]
    fn test_empty_model_is_rejected() {
        let model = ModelDesc {
            name: "empty".to_string(),
            ..ModelDesc::default()
        };
        let mut ids: SlotMap<BakeMeshId, ()> = SlotMap::with_key();
        let result = BakeMesh::from_instance(ids.insert(()), 0, &instance(0), &model, Vec::new());
        assert!(matches!(result, Err(MeshError::NoGeometry(_))));
    }

    #[test]
    fn test_missing_uv1_still_registers_occluder() {
        let mut mesh = build(&instance(128), &quad_model(false));
        let mut tracer = RayTracer::new();

        let result = mesh.preprocess(&mut tracer, Vec::new());
        assert!(matches!(result, Err(MeshError::MissingLightmapUv(_))));
        assert_eq!(mesh.state(), BakeMeshState::Excluded);
        assert!(mesh.geometry().is_some());
        assert!(mesh.grid().is_none());
    }

    #[test]
    fn test_non_lightmapped_mesh_is_occluder() {
        let desc = StaticModelDesc {
            lightmap: false,
            ..instance(0)
        };
        let mut mesh = build(&desc, &quad_model(true));
        let mut tracer = RayTracer::new();

        mesh.preprocess(&mut tracer, Vec::new()).unwrap();
        assert_eq!(mesh.state(), BakeMeshState::Occluder);
        assert!(!mesh.is_lightmapped());
        assert_eq!(tracer.geometry_count(), 1);
    }

    #[test]
    fn test_direct_lighting_fills_grid() {
        let mut mesh = build(&instance(128), &quad_model(true));
        let mut tracer = RayTracer::new();
        mesh.preprocess(&mut tracer, vec![0]).unwrap();
        tracer.commit().unwrap();

        let lights = vec![BakeLight::Directional(DirectionalLight {
            direction: -Vec3::y(),
            color: Color::new(0.8, 0.6, 0.4),
        })];
        let settings = GlowSettings::default();
        let ctx = LightingContext { tracer: &tracer, settings: &settings, bounce: None };
        mesh.light_direct(&ctx, &lights).unwrap();

        let grid = mesh.grid().unwrap();
        assert_eq!((grid.width(), grid.height()), (128, 128));
        assert_eq!(grid.invalid_count(), 0);
        for (_, _, radiance, triangle) in grid.valid_texels() {
            assert_relative_eq!(radiance, Color::new(0.8, 0.6, 0.4), epsilon = 1e-5);
            assert!(triangle.is_some());
        }
        assert_eq!(mesh.contribution_counts().direct, 128 * 128);

        let samples = mesh.generate_bounce_samples();
        assert_eq!(samples.len(), 2);
        assert_relative_eq!(samples[0].normal, Vec3::y(), epsilon = 1e-5);
        assert_relative_eq!(samples[0].source_color, Color::new(0.8, 0.6, 0.4), epsilon = 1e-5);

        mesh.generate_radiance_map(&settings).unwrap();
        assert!(mesh.grid().is_none());
        let map = mesh.take_radiance_map().unwrap();
        assert_eq!((map.width(), map.height()), (128, 128));
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut mesh = build(&instance(128), &quad_model(true));
        let mut tracer = RayTracer::new();
        tracer.commit().unwrap();
        let settings = GlowSettings::default();
        let ctx = LightingContext { tracer: &tracer, settings: &settings, bounce: None };

        assert!(matches!(
            mesh.light_direct(&ctx, &[]),
            Err(MeshError::InvalidState { expected: BakeMeshState::Preprocessed, .. })
        ));
        let mut scene_instance = instance(128);
        assert!(mesh.pack(0, Vec4::new(1.0, 1.0, 0.0, 0.0), &mut scene_instance).is_err());
        assert!(scene_instance.lightmap_index.is_none());
    }

    #[test]
    fn test_pack_stamps_instance() {
        let mut mesh = build(&instance(128), &quad_model(true));
        let mut tracer = RayTracer::new();
        mesh.preprocess(&mut tracer, Vec::new()).unwrap();
        tracer.commit().unwrap();
        let settings = GlowSettings::default();
        let ctx = LightingContext { tracer: &tracer, settings: &settings, bounce: None };
        mesh.light_direct(&ctx, &[]).unwrap();

        let mut scene_instance = instance(128);
        let tiling = Vec4::new(0.25, 0.25, 0.5, 0.0);
        mesh.pack(3, tiling, &mut scene_instance).unwrap();

        assert_eq!(mesh.state(), BakeMeshState::Packed);
        assert_eq!(scene_instance.lightmap_index, Some(3));
        assert_eq!(scene_instance.light_mask, 0);
        assert_relative_eq!(scene_instance.lightmap_tiling_offset, tiling);
    }
}
