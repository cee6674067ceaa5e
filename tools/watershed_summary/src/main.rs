//! Re-aggregate an existing run directory into watershed statistics.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ash_core::context::RunDirectory;
use ash_core::manifest::{RunManifest, MANIFEST_FILE};
use ash_core::watershed::{aggregate, load_series, write_outputs};

#[derive(Parser, Debug)]
#[command(name = "watershed_summary", about = "Aggregate per-hillslope ash series into watershed tables")]
struct Args {
    /// Run directory holding H*_ash.parquet files
    #[arg(long, default_value = ".")]
    run_dir: PathBuf,

    /// Manifest with resolved hillslopes (defaults to <run-dir>/ash.manifest.json)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Override the reservoir capacity (m³)
    #[arg(long)]
    reservoir_capacity: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let manifest_path = args.manifest.clone().unwrap_or_else(|| args.run_dir.join(MANIFEST_FILE));
    let mut manifest = RunManifest::load(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;
    if manifest.hillslopes.is_empty() {
        bail!("{} lists no resolved hillslopes; run ash-run first", manifest_path.display());
    }
    if let Some(capacity) = args.reservoir_capacity {
        manifest.reservoir_capacity_m3 = capacity;
        manifest.validate().context("reservoir capacity override")?;
    }

    let series = load_series(&args.run_dir, &manifest.hillslopes);
    info!(series = series.len(), "loaded hillslope series");
    let summary = aggregate(&manifest.hillslopes, &series, &manifest.aggregation_config());

    let out = RunDirectory::new(&args.run_dir)?;
    for path in write_outputs(&out, &summary)? {
        println!("Wrote {}", path.display());
    }
    if !summary.missing_hillslopes.is_empty() {
        eprintln!("missing hillslopes: {}", summary.missing_hillslopes.join(", "));
    }
    Ok(())
}
