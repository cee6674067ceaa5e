//! Run the ash transport pipeline described by a run manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ash_core::context::RunContext;
use ash_core::manifest::RunManifest;
use ash_core::orchestrator::{self, CancelToken};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ash-run", about = "Simulate post-fire ash transport for every hillslope of a watershed")]
struct Args {
    /// Run manifest (JSON)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Output directory (defaults to the manifest's directory)
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Worker threads; 1 runs sequentially, 0 uses every logical CPU
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut manifest = RunManifest::load(&args.manifest)
        .with_context(|| format!("loading manifest {}", args.manifest.display()))?;
    if args.workers.is_some() {
        manifest.num_workers = args.workers;
    }

    let run_dir = match args.run_dir {
        Some(dir) => dir,
        None => args
            .manifest
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let ctx = RunContext::filesystem(&manifest.inputs.hydrology_dir, &manifest.inputs.climate, &run_dir)
        .with_context(|| format!("preparing run directory {}", run_dir.display()))?;

    info!(run_dir = %run_dir.display(), "starting run");
    let outcome = orchestrator::run(&manifest, &ctx, &CancelToken::new()).context("ash run failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    if !outcome.summary.hillslopes_failed.is_empty() {
        eprintln!(
            "{} hillslopes failed; see {}",
            outcome.summary.hillslopes_failed.len(),
            run_dir.join("status.log").display()
        );
    }
    Ok(())
}
