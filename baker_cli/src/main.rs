use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

use lightmap_baker::foundation::logging;
use lightmap_baker::prelude::*;

fn cli() -> Command {
    Command::new("lightmap_bake")
        .about("Bakes static lightmaps for a scene and writes the atlases and the updated scene")
        .arg(
            Arg::new("scene")
                .short('s')
                .long("scene")
                .value_name("FILE")
                .help("Scene description to bake (.ron or .toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Bake configuration (.ron or .toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory the lightmap atlases are written to")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("scene-out")
                .long("scene-out")
                .value_name("FILE")
                .help("Where to write the updated scene (defaults to overwriting the input)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("atlas-size")
                .long("atlas-size")
                .value_name("PIXELS")
                .help("Lightmap atlas edge length")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("samples")
                .long("samples")
                .value_name("COUNT")
                .help("Ambient occlusion rays per texel")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("no-ao")
                .long("no-ao")
                .help("Disable ambient occlusion")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-bounce")
                .long("no-bounce")
                .help("Disable bounce lighting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (error, warn, info, debug, trace); RUST_LOG overrides it"),
        )
}

/// Configuration file merged with command line overrides
fn build_config(matches: &ArgMatches) -> Result<BakeConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => BakeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load bake configuration {}", path.display()))?,
        None => BakeConfig::default(),
    };

    if let Some(dir) = matches.get_one::<PathBuf>("output") {
        config.output.output_dir = dir.clone();
    }
    if let Some(&size) = matches.get_one::<u32>("atlas-size") {
        config.settings.lightmap_atlas_size = size;
    }
    if let Some(&samples) = matches.get_one::<u32>("samples") {
        config.settings.nsamples = samples;
    }
    if matches.get_flag("no-ao") {
        config.settings.ao_enabled = false;
    }
    if matches.get_flag("no-bounce") {
        config.settings.bounce_enabled = false;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level = level.clone();
    }

    config
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid bake configuration: {reason}"))?;
    Ok(config)
}

fn bake(config: &BakeConfig, scene_path: &Path, scene_out: &Path) -> Result<()> {
    let mut baker = SceneBaker::new(config.settings.clone()).context("Failed to create the baker")?;

    baker
        .load_scene(scene_path)
        .with_context(|| format!("Failed to load scene {}", scene_path.display()))?;
    baker.preprocess().context("Preprocessing failed")?;
    baker.light().context("Lighting failed")?;
    baker.generate_lightmaps().context("Packing failed")?;

    let written = baker
        .save_lightmaps(&config.output.output_dir, &config.output.lightmap_prefix)
        .context("Failed to write lightmaps")?;

    if config.output.write_scene {
        baker
            .save_scene(scene_out)
            .with_context(|| format!("Failed to write scene {}", scene_out.display()))?;
    }

    let stats = baker.bake_stats();
    log::info!(
        "Bake complete: {} of {} meshes lightmapped, {} excluded, {} atlases ({:.2}s preprocess, {:.2}s light, {:.2}s pack)",
        stats.lightmapped,
        stats.meshes,
        stats.excluded,
        written.len(),
        stats.preprocess_secs,
        stats.light_secs,
        stats.pack_secs
    );
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = build_config(&matches)?;
    logging::init(&config.log_level);

    let scene_path = matches
        .get_one::<PathBuf>("scene")
        .context("A scene file is required")?;
    let scene_out = matches.get_one::<PathBuf>("scene-out").unwrap_or(scene_path);

    log::info!("Baking {}", scene_path.display());
    bake(&config, scene_path, scene_out).map_err(|e| {
        log::error!("{e:#}");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "lightmap_bake",
                "--scene",
                "scene.ron",
                "--atlas-size",
                "2048",
                "--samples",
                "32",
                "--no-ao",
                "--no-bounce",
                "--output",
                "out",
            ])
            .unwrap();
        let config = build_config(&matches).unwrap();

        assert_eq!(config.settings.lightmap_atlas_size, 2048);
        assert_eq!(config.settings.nsamples, 32);
        assert!(!config.settings.ao_enabled);
        assert!(!config.settings.bounce_enabled);
        assert_eq!(config.output.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_scene_is_required() {
        assert!(cli().try_get_matches_from(["lightmap_bake"]).is_err());
    }

    #[test]
    fn test_invalid_atlas_size_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["lightmap_bake", "--scene", "scene.ron", "--atlas-size", "16"])
            .unwrap();
        assert!(build_config(&matches).is_err());
    }
}
