//! Sitereview CLI: run review image intake from the command line.
//!
//! Storage settings come from the environment (or `.env`), see `ReviewConfig`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sitereview_cli::{init_tracing, mime_for_path, report_json};
use sitereview_core::constants::{MAX_COMPRESSED_IMAGE_BYTES, REVIEW_IMAGE_FIELD};
use sitereview_core::{FieldSpec, ImageAsset, ReviewConfig};
use sitereview_services::{
    create_storage, CompressionEngine, ImageIntakePipeline, IntakeOptions, ReviewService,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitereview", about = "Sitereview image intake tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image to the size budget and report every attempt
    Compress {
        /// Path to the image
        file: PathBuf,
        /// Size budget in bytes
        #[arg(long, default_value_t = MAX_COMPRESSED_IMAGE_BYTES)]
        max_bytes: usize,
        /// Write the result here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compress and upload local images into the configured storage
    Upload {
        /// Upload field the files belong to
        #[arg(long, default_value = REVIEW_IMAGE_FIELD)]
        field: String,
        /// Storage folder (defaults to REVIEW_IMAGE_FOLDER)
        #[arg(long)]
        folder: Option<String>,
        /// Maximum files accepted (defaults to MAX_IMAGES_PER_REVIEW)
        #[arg(long)]
        max_count: Option<usize>,
        /// Image files, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the newest stored reviews
    Recent {
        /// Number of reviews (defaults to 10)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show rating statistics for a location
    Stats {
        location_id: i64,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn review_service() -> anyhow::Result<ReviewService> {
    let config = ReviewConfig::from_env().context("Invalid configuration")?;
    ReviewService::bootstrap(&config)
        .await
        .context("Failed to initialize review service")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            file,
            max_bytes,
            output,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let original_size = data.len();
            let mime_hint = mime_for_path(&file);

            let engine = CompressionEngine::new(max_bytes);
            let compressed =
                tokio::task::spawn_blocking(move || engine.compress(data, mime_hint))
                    .await
                    .context("Compression task failed")??;

            if let Some(ref output) = output {
                tokio::fs::write(output, &compressed.data)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
            }

            print_json(&serde_json::json!({
                "input": file.display().to_string(),
                "original_size": original_size,
                "compressed_size": compressed.size(),
                "content_type": compressed.content_type,
                "within_budget": compressed.within_budget,
                "attempts": compressed.attempts,
                "output": output.map(|p| p.display().to_string()),
            }))?;
        }
        Commands::Upload {
            field,
            folder,
            max_count,
            files,
        } => {
            let config = ReviewConfig::from_env().context("Invalid configuration")?;
            let storage = create_storage(&config)
                .await
                .context("Failed to initialize storage")?;
            let pipeline = ImageIntakePipeline::new(storage, IntakeOptions::from_config(&config));

            let spec = FieldSpec::new(
                field.clone(),
                folder.unwrap_or_else(|| config.review_image_folder.clone()),
                max_count.unwrap_or(config.max_images_per_review),
            );

            let mut assets = Vec::with_capacity(files.len());
            for path in &files {
                let data = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let mut asset = ImageAsset::new(field.clone(), data, mime_for_path(path));
                if let Some(name) = path.file_name() {
                    asset = asset.with_filename(name.to_string_lossy());
                }
                assets.push(asset);
            }

            let report = pipeline.process(&[spec], assets).await;
            print_json(&report_json(&report))?;

            let failed = report.failures().len();
            if failed > 0 {
                anyhow::bail!("{} of {} file(s) failed", failed, files.len());
            }
        }
        Commands::Recent { limit } => {
            let service = review_service().await?;
            print_json(&service.recent(limit).await?)?;
        }
        Commands::Stats { location_id } => {
            let service = review_service().await?;
            print_json(&service.location_stats(location_id).await?)?;
        }
    }

    Ok(())
}
