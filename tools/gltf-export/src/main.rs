//! gltf-export - scene to glTF 2.0 exporter
//!
//! Reads a traversed scene (JSON), deduplicates its renderable vertices and
//! writes a .gltf (embedded or with sidecars) or a .glb container.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gltf_export::{ExportConfig, OutputMode, SceneInput};

#[derive(Parser)]
#[command(name = "gltf-export")]
#[command(about = "Scene to glTF 2.0 exporter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene document
    Export {
        /// Scene JSON produced by the traversal
        scene: PathBuf,

        /// Export settings (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output folder (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output base name (overrides config)
        #[arg(short, long)]
        name: Option<String>,

        /// embedded, separate or glb (overrides config)
        #[arg(short, long)]
        mode: Option<OutputMode>,

        /// Always use 32-bit indices
        #[arg(long)]
        force_32bit_indices: bool,

        /// Also dump the pretty JSON to this file ("-" for stdout)
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Validate a scene and print dedup statistics without writing
    Check {
        /// Scene JSON produced by the traversal
        scene: PathBuf,

        /// Export settings (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    match path {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("Failed to load config: {:?}", path)),
        None => Ok(ExportConfig::default()),
    }
}

fn load_scene(path: &Path) -> Result<SceneInput> {
    SceneInput::load(path).with_context(|| format!("Failed to load scene: {:?}", path))
}

fn base_dir(scene: &Path) -> &Path {
    scene.parent().unwrap_or_else(|| Path::new("."))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            config,
            output,
            name,
            mode,
            force_32bit_indices,
            dump,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(output) = output {
                config.output_folder = output;
            }
            if let Some(name) = name {
                config.scene_name = name;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if force_32bit_indices {
                config.force_32bit_indices = true;
            }
            if dump.is_some() {
                config.dump_gltf = dump;
            }

            tracing::info!("Converting {:?} -> {:?}", scene, config.document_path());
            let input = load_scene(&scene)?;
            let report = gltf_export::export_scene(&input, base_dir(&scene), &config)
                .with_context(|| format!("Failed to export {:?}", scene))?;
            tracing::info!(
                "Done! Wrote {:?} and {} sidecar file(s)",
                report.document,
                report.sidecars.len()
            );
        }

        Commands::Check { scene, config } => {
            tracing::info!("Checking scene {:?}", scene);
            let config = load_config(config.as_deref())?;
            let input = load_scene(&scene)?;
            let reports = gltf_export::check_scene(&input, base_dir(&scene), &config)?;

            for report in &reports {
                println!(
                    "{}: {} corners, {} vertices, {} primitive(s), {} morph target(s)",
                    report.name,
                    report.corners,
                    report.vertices,
                    report.primitives,
                    report.morph_targets
                );
            }
            tracing::info!("Scene is valid!");
        }
    }

    Ok(())
}
