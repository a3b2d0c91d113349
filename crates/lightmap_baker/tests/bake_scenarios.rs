//! End-to-end bakes of small hand-built scenes

use approx::assert_relative_eq;
use image::{Rgb, RgbImage, RgbaImage};
use slotmap::SlotMap;

use lightmap_baker::bake::{BakeMeshId, BakeMeshState, LightmapAtlas, LightmapPacker, RadianceMap};
use lightmap_baker::prelude::*;
use lightmap_baker::scene::{
    GeometryDesc, LightDesc, LightKind, MaterialDesc, ModelDesc, StaticModelDesc, TransformDesc, ZoneDesc,
};

fn sun_color() -> Color {
    Color::new(0.8, 0.6, 0.4)
}

fn quad_model(name: &str, with_uv1: bool) -> ModelDesc {
    let uv = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    ModelDesc {
        name: name.to_string(),
        path: None,
        geometries: vec![GeometryDesc {
            positions: vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            normals: vec![Vec3::y(); 4],
            uv0: uv.clone(),
            uv1: with_uv1.then_some(uv),
            indices: vec![0, 2, 1, 0, 3, 2],
        }],
    }
}

fn floor(name: &str, model: &str, position: Vec3) -> StaticModelDesc {
    StaticModelDesc {
        name: name.to_string(),
        model: Some(model.to_string()),
        transform: TransformDesc::at(position),
        lightmap: true,
        lightmap_size: 128,
        ..StaticModelDesc::default()
    }
}

fn sun() -> LightDesc {
    LightDesc {
        name: "sun".to_string(),
        kind: LightKind::Directional,
        transform: TransformDesc::default().with_rotation(Vec3::new(90.0, 0.0, 0.0)),
        color: sun_color(),
        ..LightDesc::default()
    }
}

fn single_quad_scene() -> SceneDescription {
    SceneDescription {
        models: vec![quad_model("quad", true)],
        static_models: vec![floor("floor", "quad", Vec3::zeros())],
        lights: vec![sun()],
        ..SceneDescription::default()
    }
}

fn bake(scene: SceneDescription, settings: GlowSettings) -> SceneBaker {
    let mut baker = SceneBaker::new(settings).unwrap();
    baker.load_scene_description(scene, ".").unwrap();
    baker.preprocess().unwrap();
    baker.light().unwrap();
    baker.generate_lightmaps().unwrap();
    baker
}

fn instance_rect(baker: &SceneBaker, instance: usize) -> (&LightmapAtlas, u32, u32, u32, u32) {
    let scene = baker.scene().unwrap();
    let index = scene.static_models[instance].lightmap_index.unwrap();
    let atlas = &baker.packer().atlases()[index as usize];
    let (id, _) = baker.meshes().find(|(_, m)| m.instance() == instance).unwrap();
    let (_, rect) = atlas.placements.iter().find(|(mesh, _)| *mesh == id).unwrap();
    (atlas, rect.x, rect.y, rect.width, rect.height)
}

fn assert_uniform(image: &RgbImage, x: u32, y: u32, w: u32, h: u32, expected: Rgb<u8>) {
    for ty in y..y + h {
        for tx in x..x + w {
            let pixel = image.get_pixel(tx, ty);
            for c in 0..3 {
                assert!(
                    pixel[c].abs_diff(expected[c]) <= 1,
                    "texel ({tx}, {ty}) is {pixel:?}, expected {expected:?}"
                );
            }
        }
    }
}

#[test]
fn test_lit_quad_is_uniform_light_color() {
    let baker = bake(single_quad_scene(), GlowSettings::default());

    let stats = baker.bake_stats();
    assert_eq!(stats.lightmapped, 1);
    assert_eq!(stats.contributions.direct, 128 * 128);
    assert_eq!(stats.contributions.indirect, 0);

    let (atlas, x, y, w, h) = instance_rect(&baker, 0);
    assert_eq!((w, h), (128, 128));
    assert_uniform(&atlas.image, x, y, w, h, Rgb([204, 153, 102]));

    let instance = &baker.scene().unwrap().static_models[0];
    assert_eq!(instance.lightmap_index, Some(0));
    assert_relative_eq!(instance.lightmap_tiling_offset.x, 128.0 / 1024.0);
    assert_relative_eq!(instance.lightmap_tiling_offset.y, 128.0 / 1024.0);
    assert_relative_eq!(instance.lightmap_tiling_offset.z, 2.0 / 1024.0);
    assert_relative_eq!(instance.lightmap_tiling_offset.w, 2.0 / 1024.0);
}

#[test]
fn test_occluded_quad_stays_dark() {
    let mut scene = single_quad_scene();
    scene.static_models.push(StaticModelDesc {
        name: "roof".to_string(),
        model: Some("quad".to_string()),
        transform: TransformDesc::at(Vec3::new(0.0, 1.0, 0.0)).with_scale(Vec3::new(2.0, 1.0, 2.0)),
        lightmap: false,
        cast_shadows: true,
        ..StaticModelDesc::default()
    });

    let baker = bake(scene, GlowSettings::default().with_ao(false));

    assert_eq!(baker.bake_stats().occluders, 1);
    assert_eq!(baker.bake_stats().contributions.direct, 0);
    assert_eq!(baker.mesh_for_instance(1).unwrap().state(), BakeMeshState::Occluder);
    assert_eq!(baker.scene().unwrap().static_models[1].lightmap_index, None);

    let (atlas, x, y, w, h) = instance_rect(&baker, 0);
    assert_uniform(&atlas.image, x, y, w, h, Rgb([0, 0, 0]));
}

#[test]
fn test_occluded_quad_keeps_zone_ambient() {
    let mut scene = single_quad_scene();
    scene.static_models.push(StaticModelDesc {
        name: "roof".to_string(),
        model: Some("quad".to_string()),
        transform: TransformDesc::at(Vec3::new(0.0, 1.0, 0.0)).with_scale(Vec3::new(2.0, 1.0, 2.0)),
        lightmap: false,
        ..StaticModelDesc::default()
    });
    scene.zones.push(ZoneDesc {
        name: "yard".to_string(),
        ambient_color: Color::new(0.2, 0.2, 0.2),
        ..ZoneDesc::default()
    });

    let baker = bake(scene, GlowSettings::default().with_ao(false));

    assert_eq!(baker.bake_stats().contributions.direct, 0);
    assert_eq!(baker.bake_stats().contributions.ambient, 128 * 128);
    let (atlas, x, y, w, h) = instance_rect(&baker, 0);
    assert_uniform(&atlas.image, x, y, w, h, Rgb([51, 51, 51]));
}

#[test]
fn test_cutout_roof_lets_light_through_transparent_half() {
    let dir = std::env::temp_dir().join(format!("lightmap_baker_cutout_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    // Left texel column transparent, right column opaque
    let texels = [0, 0, 0, 0, 255, 255, 255, 255].repeat(2);
    RgbaImage::from_raw(2, 2, texels).unwrap().save(dir.join("fence.png")).unwrap();

    let mut scene = single_quad_scene();
    scene.materials.push(MaterialDesc {
        name: "fence".to_string(),
        diffuse_texture: Some("fence.png".into()),
        ..MaterialDesc::default()
    });
    // Roof spans x in [-2, 2] with uv0.x = (x + 2) / 4, so it is open over x < 0
    scene.static_models.push(StaticModelDesc {
        name: "roof".to_string(),
        model: Some("quad".to_string()),
        transform: TransformDesc::at(Vec3::new(0.0, 1.0, 0.0)).with_scale(Vec3::new(2.0, 1.0, 2.0)),
        materials: vec!["fence".to_string()],
        lightmap: false,
        ..StaticModelDesc::default()
    });

    let mut baker = SceneBaker::new(GlowSettings::default().with_ao(false)).unwrap();
    baker.load_scene_description(scene, &dir).unwrap();
    baker.preprocess().unwrap();
    baker.light().unwrap();
    baker.generate_lightmaps().unwrap();
    std::fs::remove_dir_all(&dir).ok();

    let (atlas, x, y, w, h) = instance_rect(&baker, 0);
    assert_eq!((w, h), (128, 128));
    // Floor texel column tx sits at x = (tx + 0.5) / 64 - 1; skip the blurred boundary
    assert_uniform(&atlas.image, x, y, 60, h, Rgb([204, 153, 102]));
    assert_uniform(&atlas.image, x + 68, y, 60, h, Rgb([0, 0, 0]));

    let direct = baker.bake_stats().contributions.direct;
    assert!(direct > 120 * 60 && direct < 128 * 68, "{direct} texels lit");
}

#[test]
fn test_packer_starts_new_atlas_when_full() {
    let mut ids: SlotMap<BakeMeshId, ()> = SlotMap::with_key();
    let mut packer = LightmapPacker::new(&GlowSettings::default());
    let sizes = [400_u32, 500, 600];
    let meshes: Vec<BakeMeshId> = sizes.iter().map(|_| ids.insert(())).collect();
    for (&size, &mesh) in sizes.iter().zip(&meshes) {
        packer.add_radiance_map(RadianceMap {
            mesh,
            image: RgbImage::from_pixel(size, size, Rgb([10, 20, 30])),
            packed: false,
        });
    }

    let assignments = packer.pack();
    assert_eq!(assignments.len(), 3);
    assert_eq!(packer.atlases().len(), 2);

    let index_of = |mesh| assignments.iter().find(|a| a.mesh == mesh).unwrap().lightmap_index;
    assert_eq!(index_of(meshes[2]), 0);
    assert_eq!(index_of(meshes[0]), 0);
    assert_eq!(index_of(meshes[1]), 1);

    for atlas in packer.atlases() {
        assert_eq!(atlas.image.dimensions(), (1024, 1024));
        for (i, (_, a)) in atlas.placements.iter().enumerate() {
            assert!(a.x >= 2 && a.y >= 2);
            assert!(a.x + a.width + 2 <= 1024 && a.y + a.height + 2 <= 1024);
            for (_, b) in &atlas.placements[i + 1..] {
                let apart = a.x + a.width + 2 <= b.x - 2
                    || b.x + b.width + 2 <= a.x - 2
                    || a.y + a.height + 2 <= b.y - 2
                    || b.y + b.height + 2 <= a.y - 2;
                assert!(apart, "{a:?} overlaps {b:?}");
            }
        }
    }
}

#[test]
fn test_instance_without_lightmap_uv_is_skipped() {
    let mut scene = single_quad_scene();
    scene.models.push(quad_model("bare_quad", false));
    scene.static_models.push(floor("wall", "bare_quad", Vec3::new(5.0, 0.0, 0.0)));

    let baker = bake(scene, GlowSettings::default().with_ao(false));

    assert_eq!(baker.bake_stats().excluded, 1);
    assert_eq!(baker.bake_stats().lightmapped, 1);
    assert_eq!(baker.mesh_for_instance(1).unwrap().state(), BakeMeshState::Excluded);
    assert_eq!(baker.mesh_for_instance(0).unwrap().state(), BakeMeshState::Packed);

    let scene = baker.scene().unwrap();
    assert_eq!(scene.static_models[0].lightmap_index, Some(0));
    assert_eq!(scene.static_models[1].lightmap_index, None);
    assert_eq!(scene.static_models[1].light_mask, u32::MAX);
    assert_eq!(baker.packer().atlases()[0].placements.len(), 1);
}

#[test]
fn test_second_quad_receives_bounce_light() {
    let mut scene = single_quad_scene();
    scene.static_models[0].cast_shadows = false;
    // Facing down and lit from below, so its bounce reaches the floor
    scene.static_models.push(StaticModelDesc {
        transform: TransformDesc::at(Vec3::new(0.0, 0.5, 0.0)).with_rotation(Vec3::new(180.0, 0.0, 0.0)),
        cast_shadows: false,
        ..floor("ceiling", "quad", Vec3::zeros())
    });
    scene.lights.push(LightDesc {
        name: "uplight".to_string(),
        kind: LightKind::Directional,
        transform: TransformDesc::default().with_rotation(Vec3::new(-90.0, 0.0, 0.0)),
        color: Color::new(0.5, 0.5, 0.5),
        ..LightDesc::default()
    });

    let baker = bake(scene, GlowSettings::default().with_ao(false));

    assert_eq!(baker.bake_stats().bounce_samples, 4);
    assert!(baker.bake_stats().contributions.indirect > 0);
}

#[test]
fn test_scene_file_round_trip() {
    let dir = std::env::temp_dir().join(format!("lightmap_baker_round_trip_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("scene.ron");
    let output = dir.join("scene.baked.ron");
    SceneLoader::save(&single_quad_scene(), &input).unwrap();

    let mut baker = SceneBaker::new(GlowSettings::default().with_ao(false)).unwrap();
    baker.load_scene(&input).unwrap();
    baker.preprocess().unwrap();
    baker.light().unwrap();
    baker.generate_lightmaps().unwrap();
    let written = baker.save_lightmaps(&dir, "Scene_Lightmap").unwrap();
    baker.save_scene(&output).unwrap();

    assert_eq!(written, vec![dir.join("Scene_Lightmap0.png")]);
    let atlas = image::open(&written[0]).unwrap().to_rgb8();
    assert_eq!(atlas.dimensions(), (1024, 1024));

    let (baked, _) = SceneLoader::load(&output).unwrap();
    assert_eq!(baked.static_models[0].lightmap_index, Some(0));
    assert_eq!(baked.static_models[0].light_mask, 0);
    assert_eq!(baked.lights, single_quad_scene().lights);

    std::fs::remove_dir_all(&dir).ok();
}
