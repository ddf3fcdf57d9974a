//! Cube catalog configuration generator.
//!
//! Reads every product from the Open Data Cube index and writes an OGC API
//! configuration with one coverage collection per product.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cube_catalog::{OdcIndex, RasterLoader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config_synth::{
    collect_products, load_base, parse_exclusions, synthesize, write_atomic, SynthesisOptions,
};

#[derive(Parser, Debug)]
#[command(name = "config-synth")]
#[command(about = "Generate OGC API resources from an Open Data Cube index")]
struct Args {
    /// Base configuration to merge generated resources into
    #[arg(short, long)]
    infile: Option<PathBuf>,

    /// Output configuration path
    #[arg(short, long, default_value = "config_auto.yml")]
    outfile: PathBuf,

    /// Products never published, comma separated
    #[arg(long, env = "EXCLUDE_PRODUCTS", default_value = "")]
    exclude_products: String,

    /// Also publish a records collection under this key
    #[arg(long)]
    records_collection: Option<String>,

    /// PostgreSQL URL of the cube index
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    // A broken base document fails before the catalog is contacted.
    let base = load_base(args.infile.as_deref())?;
    let exclusions = parse_exclusions(&args.exclude_products);
    info!(excluded = ?exclusions, "Excluded products");

    let catalog = OdcIndex::connect(&args.database_url, Arc::new(RasterLoader::new(1)))
        .await
        .context("Failed to connect to the cube index")?;
    let products = collect_products(&catalog, &exclusions).await?;

    let options = SynthesisOptions {
        exclusions,
        records_collection: args.records_collection,
    };
    let (document, report) = synthesize(base, &products, &options)?;

    write_atomic(&args.outfile, &document.to_yaml_string()?)?;
    info!(
        path = %args.outfile.display(),
        added = report.added.len(),
        skipped = report.skipped_empty.len() + report.skipped_unprojectable.len(),
        "Configuration written"
    );
    Ok(())
}
