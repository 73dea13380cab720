use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use listing_geocoder::{
    init_tracing, resolve_api_key, AppConfig, ConsolePrompt, PdfTableSource, Pipeline,
    PlacesService,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "listing-geocoder", version, about = "Geocode a PDF business listing into KML layers")]
struct Cli {
    /// Source PDF with one listing table per page
    #[arg(long, env = "LISTING_PDF_PATH")]
    pdf: Option<PathBuf>,

    /// Directory for the table cache, data.json and the KML layers
    #[arg(long, env = "RESULTS_DIR")]
    results_dir: Option<PathBuf>,

    /// Directory holding one cached places response per listing
    #[arg(long, env = "GEO_CACHE_DIR")]
    geo_dir: Option<PathBuf>,

    /// Manual corrections, rewritten whenever an answer is given
    #[arg(long, env = "GEO_FIX_PATH")]
    geo_fix: Option<PathBuf>,

    /// JSON file holding the places API key
    #[arg(long, env = "API_KEY_PATH")]
    api_key_file: Option<PathBuf>,

    /// Pause after each places request, in milliseconds
    #[arg(long)]
    request_delay_ms: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(path) = self.pdf {
            config.pdf_path = path;
        }
        if let Some(path) = self.results_dir {
            config.results_dir = path;
        }
        if let Some(path) = self.geo_dir {
            config.geo_cache_dir = path;
        }
        if let Some(path) = self.geo_fix {
            config.geo_fix_path = path;
        }
        if let Some(path) = self.api_key_file {
            config.api_key_path = path;
        }
        if let Some(delay) = self.request_delay_ms {
            config.places_request_delay_ms = delay;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let mut config = AppConfig::from_env();
    Cli::parse().apply(&mut config);
    info!(config = ?config.public_profile(), "starting run");

    let api_key = resolve_api_key(&config).context("loading places credentials")?;
    let places = PlacesService::from_config(&config, api_key).context("building places client")?;
    let source = PdfTableSource::open(&config.pdf_path)
        .with_context(|| format!("opening {}", config.pdf_path.display()))?;

    let mut prompt = ConsolePrompt;
    let summary = Pipeline::new(&config, places, &mut prompt)
        .run(&source)
        .await
        .context("pipeline aborted")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
