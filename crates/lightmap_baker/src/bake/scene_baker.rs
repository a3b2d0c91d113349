//! Bake orchestration
//!
//! [`SceneBaker`] drives the phases strictly in order:
//!
//! ```text
//! Unloaded -> Loaded -> Preprocessed -> Lit -> Packed
//! ```
//!
//! Loading a scene again from any phase starts over. Per-mesh failures are
//! logged and isolated to that mesh; failures that invalidate a phase (scene
//! parse errors, the ray tracer commit) are returned.

use std::path::{Path, PathBuf};

use slotmap::SlotMap;

use crate::assets::{BakeMaterial, MaterialCache};
use crate::bake::bounce::BounceRegistry;
use crate::bake::light::{BakeLight, BounceLight, LightingContext};
use crate::bake::light_ray::ContributionCounts;
use crate::bake::mesh::{BakeMesh, BakeMeshId, BakeMeshState};
use crate::bake::packer::{AtlasAssignment, LightmapPacker};
use crate::core::config::GlowSettings;
use crate::error::BakeError;
use crate::foundation::math::Vec3;
use crate::foundation::time::Stopwatch;
use crate::geometry::AABB;
use crate::raytrace::{fp_mode, RayTracer};
use crate::scene::{SceneDescription, SceneLoader, StaticModelDesc, ZoneDesc};

/// Bake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakePhase {
    /// No scene
    Unloaded,
    /// Scene parsed, mesh records and lights created
    Loaded,
    /// Geometry registered and committed
    Preprocessed,
    /// Lighting done, radiance maps generated
    Lit,
    /// Atlases built and instances stamped
    Packed,
}

/// Summary of a bake
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BakeStats {
    /// Mesh records created
    pub meshes: usize,
    /// Meshes that received a lightmap grid
    pub lightmapped: usize,
    /// Shadow casters without a lightmap
    pub occluders: usize,
    /// Meshes excluded by preprocessing failures
    pub excluded: usize,
    /// Light models, zone ambients and the bounce light included
    pub lights: usize,
    /// Bounce samples emitted after the direct pass
    pub bounce_samples: usize,
    /// Contributions per mode over all meshes
    pub contributions: ContributionCounts,
    /// Atlases emitted
    pub atlases: usize,
    /// Preprocess wall time in seconds
    pub preprocess_secs: f32,
    /// Lighting wall time in seconds
    pub light_secs: f32,
    /// Packing wall time in seconds
    pub pack_secs: f32,
}

/// Phase-sequenced lightmap bake of one scene
pub struct SceneBaker {
    settings: GlowSettings,
    phase: BakePhase,
    pool: rayon::ThreadPool,
    tracer: RayTracer,
    scene: Option<SceneDescription>,
    materials: MaterialCache,
    meshes: SlotMap<BakeMeshId, BakeMesh>,
    lights: Vec<BakeLight>,
    zones: Vec<ZoneDesc>,
    packer: LightmapPacker,
    stats: BakeStats,
}

impl std::fmt::Debug for SceneBaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBaker")
            .field("phase", &self.phase)
            .field("meshes", &self.meshes.len())
            .field("lights", &self.lights.len())
            .field("threads", &self.pool.current_num_threads())
            .finish_non_exhaustive()
    }
}

impl SceneBaker {
    /// Create a baker
    ///
    /// Builds the worker pool that runs the ray queries; every worker enables
    /// flush-to-zero before its first query. Failing to build the pool is
    /// fatal for the bake.
    pub fn new(settings: GlowSettings) -> Result<Self, BakeError> {
        settings.validate().map_err(BakeError::InvalidSettings)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("lightmap-bake-{i}"))
            .start_handler(|_| {
                fp_mode::enable_flush_to_zero();
            })
            .build()?;
        log::info!("Lightmap baker using {} worker threads", pool.current_num_threads());

        Ok(Self {
            packer: LightmapPacker::new(&settings),
            settings,
            phase: BakePhase::Unloaded,
            pool,
            tracer: RayTracer::new(),
            scene: None,
            materials: MaterialCache::new(),
            meshes: SlotMap::with_key(),
            lights: Vec::new(),
            zones: Vec::new(),
            stats: BakeStats::default(),
        })
    }

    /// Current phase
    pub const fn phase(&self) -> BakePhase {
        self.phase
    }

    /// Bake settings
    pub const fn settings(&self) -> &GlowSettings {
        &self.settings
    }

    /// Loaded scene, with placements stamped once packed
    pub const fn scene(&self) -> Option<&SceneDescription> {
        self.scene.as_ref()
    }

    /// Mesh record by handle
    pub fn mesh(&self, id: BakeMeshId) -> Option<&BakeMesh> {
        self.meshes.get(id)
    }

    /// Every mesh record
    pub fn meshes(&self) -> impl Iterator<Item = (BakeMeshId, &BakeMesh)> {
        self.meshes.iter()
    }

    /// Mesh record created for a scene static model
    pub fn mesh_for_instance(&self, instance: usize) -> Option<&BakeMesh> {
        self.meshes.values().find(|mesh| mesh.instance() == instance)
    }

    /// Light models of the scene
    pub fn lights(&self) -> &[BakeLight] {
        &self.lights
    }

    /// Atlas packer, holding the emitted atlases once packed
    pub const fn packer(&self) -> &LightmapPacker {
        &self.packer
    }

    /// Counts and timings so far
    pub const fn bake_stats(&self) -> &BakeStats {
        &self.stats
    }

    fn expect_phase(&self, operation: &'static str, expected: BakePhase) -> Result<(), BakeError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(BakeError::InvalidPhase {
                operation,
                expected,
                actual: self.phase,
            })
        }
    }

    fn reset(&mut self) {
        self.phase = BakePhase::Unloaded;
        self.tracer = RayTracer::new();
        self.scene = None;
        self.materials = MaterialCache::new();
        self.meshes.clear();
        self.lights.clear();
        self.zones.clear();
        self.packer = LightmapPacker::new(&self.settings);
        self.stats = BakeStats::default();
    }

    /// Parse a scene file and create the light and mesh records
    ///
    /// On failure the baker is left unloaded.
    pub fn load_scene(&mut self, path: impl AsRef<Path>) -> Result<(), BakeError> {
        self.reset();
        let (scene, loader) = SceneLoader::load(path)?;
        self.load_resolved(scene, &loader)
    }

    /// Load an in-memory scene; relative model and texture paths resolve against `base_dir`
    pub fn load_scene_description(&mut self, mut scene: SceneDescription, base_dir: impl Into<PathBuf>) -> Result<(), BakeError> {
        self.reset();
        let loader = SceneLoader::new(base_dir);
        loader.resolve_models(&mut scene)?;
        self.load_resolved(scene, &loader)
    }

    fn load_resolved(&mut self, scene: SceneDescription, loader: &SceneLoader) -> Result<(), BakeError> {
        self.create_lights(&scene);
        self.create_meshes(&scene, loader);
        self.scene = Some(scene);
        self.phase = BakePhase::Loaded;

        self.stats.meshes = self.meshes.len();
        self.stats.lights = self.lights.len();
        log::info!(
            "Scene loaded: {} bake meshes, {} light models, {} materials, {} textures",
            self.meshes.len(),
            self.lights.len(),
            self.materials.material_count(),
            self.materials.texture_count()
        );
        Ok(())
    }

    fn create_lights(&mut self, scene: &SceneDescription) {
        for desc in &scene.lights {
            match BakeLight::from_desc(desc) {
                Some(light) => self.lights.push(light),
                None => log::warn!("Light '{}' has no usable direction or range, skipped", desc.name),
            }
        }

        for (index, zone) in scene.zones.iter().enumerate() {
            self.lights.push(BakeLight::from_zone(index, zone));
        }
        self.zones = scene.zones.clone();

        if self.settings.bounce_enabled {
            self.lights.push(BakeLight::Bounce(BounceLight::default()));
        }
    }

    fn create_meshes(&mut self, scene: &SceneDescription, loader: &SceneLoader) {
        for (index, instance) in scene.static_models.iter().enumerate() {
            let Some(model_name) = instance.model.as_deref() else {
                continue;
            };
            if !instance.lightmap && !instance.cast_shadows {
                continue;
            }
            let Some(model) = scene.model(model_name) else {
                log::error!("Static model '{}' references unknown model '{}'", instance.name, model_name);
                continue;
            };

            let materials: Vec<_> = (0..model.geometries.len())
                .map(|slot| self.material_for(scene, loader, instance, slot))
                .collect();

            match self
                .meshes
                .try_insert_with_key(|id| BakeMesh::from_instance(id, index, instance, model, materials))
            {
                Ok(id) => {
                    let center = self.meshes[id].bounds().center();
                    if let Some(zone) = find_zone(&self.zones, center, instance.zone_mask) {
                        self.meshes[id].assign_zone(zone, self.zones[zone].ambient_color);
                    }
                }
                Err(e) => log::error!("Static model '{}' skipped: {}", instance.name, e),
            }
        }
    }

    fn material_for(
        &mut self,
        scene: &SceneDescription,
        loader: &SceneLoader,
        instance: &StaticModelDesc,
        slot: usize,
    ) -> std::sync::Arc<BakeMaterial> {
        let Some(name) = instance.materials.get(slot) else {
            return self.materials.default_material();
        };
        self.materials.load_named(scene, name, loader).unwrap_or_else(|e| {
            log::warn!("Static model '{}': {}", instance.name, e);
            self.materials.default_material()
        })
    }

    /// Light models relevant to a bounding box
    ///
    /// Every light is returned; zone ambients and the bounce light filter
    /// per sample when evaluated.
    pub fn query_lights(&self, _bounds: &AABB) -> Vec<usize> {
        (0..self.lights.len()).collect()
    }

    /// Register every mesh with the ray tracer and commit it
    pub fn preprocess(&mut self) -> Result<(), BakeError> {
        self.expect_phase("preprocess", BakePhase::Loaded)?;
        let stopwatch = Stopwatch::start_new();

        let light_sets: Vec<(BakeMeshId, Vec<usize>)> = self
            .meshes
            .iter()
            .map(|(id, mesh)| (id, self.query_lights(mesh.bounds())))
            .collect();

        for (id, lights) in light_sets {
            let mesh = &mut self.meshes[id];
            if let Err(e) = mesh.preprocess(&mut self.tracer, lights) {
                log::error!("Mesh '{}' excluded from lightmapping: {}", mesh.name(), e);
            }
        }

        self.tracer.commit()?;
        self.phase = BakePhase::Preprocessed;

        let states: Vec<BakeMeshState> = self.meshes.values().map(BakeMesh::state).collect();
        self.stats.lightmapped = states.iter().filter(|&&s| s == BakeMeshState::Preprocessed).count();
        self.stats.occluders = states.iter().filter(|&&s| s == BakeMeshState::Occluder).count();
        self.stats.excluded = states.iter().filter(|&&s| s == BakeMeshState::Excluded).count();
        self.stats.preprocess_secs = stopwatch.elapsed_secs();

        log::info!(
            "Preprocess done in {:.2}s: {} lightmapped, {} occluders, {} excluded",
            self.stats.preprocess_secs,
            self.stats.lightmapped,
            self.stats.occluders,
            self.stats.excluded
        );
        Ok(())
    }

    /// Direct pass over every mesh, then the bounce pass, then radiance maps
    pub fn light(&mut self) -> Result<(), BakeError> {
        self.expect_phase("light", BakePhase::Preprocessed)?;
        let stopwatch = Stopwatch::start_new();

        let ctx = LightingContext {
            tracer: &self.tracer,
            settings: &self.settings,
            bounce: None,
        };
        for mesh in self.meshes.values_mut().filter(|m| m.is_lightmapped()) {
            self.pool.install(|| mesh.light_direct(&ctx, &self.lights))?;
        }
        log::info!("Direct lighting done in {:.2}s", stopwatch.elapsed_secs());

        // Every mesh finished its direct pass before any bounce is gathered
        if self.settings.bounce_enabled {
            let samples = self
                .meshes
                .values()
                .filter(|m| m.state() == BakeMeshState::Lit)
                .flat_map(BakeMesh::generate_bounce_samples)
                .collect();
            let registry = BounceRegistry::new(samples);
            self.stats.bounce_samples = registry.len();

            if !registry.is_empty() {
                let ctx = LightingContext {
                    bounce: Some(&registry),
                    ..ctx
                };
                for mesh in self.meshes.values_mut().filter(|m| m.state() == BakeMeshState::Lit) {
                    self.pool.install(|| mesh.light_indirect(&ctx, &self.lights))?;
                }
            }
            log::info!("Bounce lighting from {} samples", registry.len());
        }

        for mesh in self.meshes.values_mut().filter(|m| m.state() == BakeMeshState::Lit) {
            self.stats.contributions.merge(mesh.contribution_counts());
            mesh.generate_radiance_map(&self.settings)?;
        }

        self.phase = BakePhase::Lit;
        self.stats.light_secs = stopwatch.elapsed_secs();
        log::info!(
            "Lighting done in {:.2}s: {} ambient, {} direct, {} indirect contributions",
            self.stats.light_secs,
            self.stats.contributions.ambient,
            self.stats.contributions.direct,
            self.stats.contributions.indirect
        );
        Ok(())
    }

    /// Pack the radiance maps into atlases and stamp the placements onto the scene
    pub fn generate_lightmaps(&mut self) -> Result<Vec<AtlasAssignment>, BakeError> {
        self.expect_phase("generate_lightmaps", BakePhase::Lit)?;
        let stopwatch = Stopwatch::start_new();

        for mesh in self.meshes.values_mut() {
            if let Some(map) = mesh.take_radiance_map() {
                self.packer.add_radiance_map(map);
            }
        }
        let assignments = self.packer.pack();

        let Some(scene) = self.scene.as_mut() else {
            return Err(BakeError::InvalidPhase {
                operation: "generate_lightmaps",
                expected: BakePhase::Lit,
                actual: BakePhase::Unloaded,
            });
        };
        for assignment in &assignments {
            let Some(mesh) = self.meshes.get_mut(assignment.mesh) else {
                continue;
            };
            let Some(instance) = scene.static_models.get_mut(mesh.instance()) else {
                log::error!("Mesh '{}' lost its scene instance", mesh.name());
                continue;
            };
            mesh.pack(assignment.lightmap_index, assignment.tiling_offset, instance)?;
        }

        self.phase = BakePhase::Packed;
        self.stats.atlases = self.packer.atlases().len();
        self.stats.pack_secs = stopwatch.elapsed_secs();
        log::info!(
            "Packing done in {:.2}s: {} meshes in {} atlases",
            self.stats.pack_secs,
            assignments.len(),
            self.stats.atlases
        );
        Ok(assignments)
    }

    /// Write the atlases as `{prefix}{id}.png` into `dir`
    pub fn save_lightmaps(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>, BakeError> {
        self.expect_phase("save_lightmaps", BakePhase::Packed)?;
        Ok(self.packer.save_lightmaps(dir, prefix)?)
    }

    /// Write the scene with lightmap indices and tiling offsets
    pub fn save_scene(&self, path: impl AsRef<Path>) -> Result<(), BakeError> {
        self.expect_phase("save_scene", BakePhase::Packed)?;
        if let Some(scene) = &self.scene {
            SceneLoader::save(scene, path)?;
        }
        Ok(())
    }
}

/// Highest priority zone containing `center` whose mask overlaps `zone_mask`
///
/// Equal priorities go to the zone listed first.
pub fn find_zone(zones: &[ZoneDesc], center: Vec3, zone_mask: u32) -> Option<usize> {
    zones
        .iter()
        .enumerate()
        .filter(|(_, zone)| zone.zone_mask & zone_mask != 0 && zone.bounds.contains_point(center))
        .max_by_key(|&(index, zone)| (zone.priority, std::cmp::Reverse(index)))
        .map(|(index, _)| index)
}
