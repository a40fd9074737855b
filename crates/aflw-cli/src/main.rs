use aflw_core::{
    CocoDataset, DatasetProfile, FaceRecordBuilder, FsImageProbe, RawDocument, SchemaAssembler,
    SourceStore,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "aflw", about = "AFLW annotation conversion, merging and statistics")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the AFLW SQLite annotations into a COCO json document
    Convert {
        /// AFLW root directory
        #[arg(long)]
        dataset_root: PathBuf,
        /// Output COCO json annotation file
        #[arg(long, default_value = "aflw_annotations.json")]
        json: PathBuf,
        /// TOML profile replacing the embedded AFLW metadata
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Concatenate two COCO-style json annotation files
    Merge {
        /// First json annotation file
        #[arg(short = 'a', long)]
        first: PathBuf,
        /// Second json annotation file
        #[arg(short = 'b', long)]
        second: PathBuf,
        /// Merged json annotation file
        #[arg(short = 'm', long)]
        merged: PathBuf,
    },
    /// Compute dataset statistics over a converted dataset
    Stats {
        /// AFLW root directory
        #[arg(long)]
        dataset_root: PathBuf,
        /// COCO json annotation file, relative to the dataset root unless absolute
        #[arg(long, default_value = "aflw_annotations.json")]
        json: PathBuf,
        /// Statistics sidecar file (default: $AFLW_STATS_FILE)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Convert {
            dataset_root,
            json,
            profile,
        } => convert(&config, &dataset_root, &json, profile.as_deref()),
        Commands::Merge {
            first,
            second,
            merged,
        } => merge(&first, &second, &merged),
        Commands::Stats {
            dataset_root,
            json,
            output,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.stats_file));
            stats(&dataset_root, &json, &output)
        }
    }
}

fn convert(
    config: &Config,
    dataset_root: &Path,
    json: &Path,
    profile: Option<&Path>,
) -> Result<()> {
    let root = dataset_root
        .canonicalize()
        .with_context(|| format!("dataset root {}", dataset_root.display()))?;

    let profile = match profile {
        Some(path) => DatasetProfile::load(path)?,
        None => DatasetProfile::aflw()?,
    };

    let store = SourceStore::open(&root.join(&config.db_file))
        .context("cannot open the AFLW database")?;
    tracing::info!(root = %root.display(), "converting AFLW annotations");

    let builder = FaceRecordBuilder::new(&root, config.image_dir.as_str(), FsImageProbe);
    let output = builder.build(&store)?;
    let diagnostics = output.diagnostics;

    let doc = SchemaAssembler::new(&profile)
        .assemble(output.records)
        .context("assembling annotation document")?;

    // Nothing is written until the document has been assembled.
    let not_found = File::create(&config.not_found_file)
        .with_context(|| format!("creating {}", config.not_found_file))?;
    diagnostics
        .write_not_found(BufWriter::new(not_found))
        .with_context(|| format!("writing {}", config.not_found_file))?;
    doc.save(json)?;

    tracing::info!(
        images = doc.images.len(),
        annotations = doc.annotations.len(),
        not_found_images = diagnostics.not_found_paths().len(),
        invalid_face_ids = diagnostics.orphans.len(),
        invalid_landmarks = diagnostics.invalid_landmarks,
        json = %json.display(),
        "conversion complete"
    );
    if !diagnostics.missing_assets.is_empty() {
        tracing::warn!(
            side_file = %config.not_found_file,
            "some faces were excluded because their image could not be resolved"
        );
    }
    Ok(())
}

fn merge(first: &Path, second: &Path, merged: &Path) -> Result<()> {
    let a = RawDocument::load(first)?;
    tracing::info!(
        file = %first.display(),
        images = a.images.len(),
        annotations = a.annotations.len(),
        "loaded first document"
    );

    let b = RawDocument::load(second)?;
    tracing::info!(
        file = %second.display(),
        images = b.images.len(),
        annotations = b.annotations.len(),
        "loaded second document"
    );

    let out = aflw_core::merge(a, b);
    out.save(merged)?;
    tracing::info!(
        file = %merged.display(),
        images = out.images.len(),
        annotations = out.annotations.len(),
        "merged document saved"
    );
    Ok(())
}

fn stats(dataset_root: &Path, json: &Path, output: &Path) -> Result<()> {
    let json = if json.is_absolute() {
        json.to_path_buf()
    } else {
        dataset_root.join(json)
    };

    let dataset = CocoDataset::open(dataset_root, &json)?;
    let statistics = aflw_core::stats::aggregate(&dataset)?;
    statistics.log_summary();

    statistics.save(output)?;
    tracing::info!(file = %output.display(), "dataset statistics saved");
    Ok(())
}
