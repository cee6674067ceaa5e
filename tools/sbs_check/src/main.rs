//! SBS raster inspector: sanity check, class map and burn-class counts as
//! JSON, optional 4-class export.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use ash_core::sbs::{sbs_map_sanity_check, ClassMapEntry, SbsOptions, SoilBurnSeverityMap};

#[derive(Parser, Debug)]
#[command(name = "sbs_check", about = "Validate and summarise a soil burn severity raster")]
struct Args {
    /// SBS GeoTIFF
    sbs: PathBuf,

    /// Extra nodata pixel values, e.g. --nodata 255 --nodata 0
    #[arg(long)]
    nodata: Vec<i32>,

    /// Classify by breakpoints even when the raster carries a color table
    #[arg(long)]
    ignore_color_table: bool,

    /// Write the 4-class (0–3, 255) raster here
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report {
    status: u8,
    message: String,
    classifier: String,
    breaks: Option<[i32; 4]>,
    nodata_vals: Vec<i32>,
    class_map: Vec<ClassMapEntry>,
    class_pixel_map: BTreeMap<String, String>,
    burn_class_counts: BTreeMap<String, usize>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let check = sbs_map_sanity_check(&args.sbs);
    if !check.is_ok() {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(ExitCode::FAILURE);
    }

    let options = SbsOptions {
        ignore_color_table: args.ignore_color_table,
        nodata_vals: args.nodata.clone(),
    };
    let sbs = SoilBurnSeverityMap::open(&args.sbs, &options)
        .with_context(|| format!("classifying {}", args.sbs.display()))?;

    let classifier = if sbs.breaks().is_none() {
        "palette"
    } else if sbs.is_barc() {
        "barc"
    } else {
        "breakpoints"
    };
    let report = Report {
        status: check.status,
        message: check.message.clone(),
        classifier: classifier.to_string(),
        breaks: sbs.breaks(),
        nodata_vals: sbs.nodata_vals().to_vec(),
        class_map: sbs.class_map(),
        class_pixel_map: sbs.class_pixel_map(),
        burn_class_counts: sbs.burn_class_counts(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &args.export {
        sbs.export_4class_map(path)
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
