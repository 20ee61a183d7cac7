//! Regional extract clipping pipeline.
//!
//! Downloads an OSM extract, clips its layers to a boundary, and
//! derives thematic POI subsets from the points layer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use osmclip::config::Config;
use osmclip::pipeline::{run, PipelineOptions};

const DEFAULT_EXTRACT_URL: &str =
    "https://download.geofabrik.de/europe/poland/lodzkie-latest.osm.pbf";

#[derive(Parser, Debug)]
#[command(name = "osmclip")]
#[command(about = "Clip a regional OSM extract to a boundary and derive POI subsets")]
struct Args {
    /// Boundary polygon file (GeoJSON, optionally gzipped)
    #[arg(long, default_value = "data/boundary.geojson")]
    boundary: PathBuf,

    /// Extract download URL
    #[arg(long, default_value = DEFAULT_EXTRACT_URL)]
    extract_url: String,

    /// Directory holding the downloaded extract
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for layer exports and POI subsets
    #[arg(long, default_value = "generated_data")]
    out_dir: PathBuf,

    /// Region preset file (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Region preset to use from the config file
    #[arg(long, default_value = "lodzkie")]
    region: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut options = PipelineOptions {
        boundary: args.boundary,
        extract_url: args.extract_url,
        data_dir: args.data_dir,
        out_dir: args.out_dir,
    };

    if let Some(config_path) = &args.config {
        let config = Config::load_from_file(config_path)?;
        let region = config.region(&args.region).with_context(|| {
            format!("Region {} not found in {}", args.region, config_path.display())
        })?;
        info!("Using region preset {}", region.name);
        options.extract_url = region.extract_url.clone();
        options.boundary = region.boundary.clone();
    }

    let summary = run(&options).await?;

    info!(
        "Done: {} layers exported, {} skipped",
        summary.layers_exported.len(),
        summary.layers_skipped.len()
    );
    Ok(())
}
