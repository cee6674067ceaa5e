//! Diagnostic plots for per-hillslope ash series.
//!
//! For every `H{wepp_id}_ash.parquet` in the run directory writes
//! `H{wepp_id}_ash.png` (remaining ash and cumulative delivery over the
//! largest fire run) and `H{wepp_id}_ash_scatter.png` (daily runoff against
//! water transport across all runs). Plots carry no text.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageFormat, Rgb, RgbImage};

use ash_core::ash::AshDay;
use ash_core::context::{OutputSink, RunDirectory};
use ash_core::hillslope::OutputNames;
use ash_core::io::read_ash_parquet;

const W: u32 = 800;
const H: u32 = 400;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const REMAINING: Rgb<u8> = Rgb([30, 30, 30]);
const WATER: Rgb<u8> = Rgb([40, 90, 200]);
const WIND: Rgb<u8> = Rgb([230, 140, 20]);

#[derive(Parser, Debug)]
#[command(name = "ash_plots", about = "Write diagnostic PNGs for hillslope ash series")]
struct Args {
    /// Run directory holding H*_ash.parquet files
    #[arg(long, default_value = ".")]
    run_dir: PathBuf,

    /// Plot only this hillslope
    #[arg(long)]
    wepp_id: Option<u32>,
}

// ── Canvas ───────────────────────────────────────────────────────────────────

/// Plot area with data ranges mapped onto pixels.
struct Canvas {
    img: RgbImage,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Canvas {
    fn new(x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        let mut img = RgbImage::from_pixel(W, H, BACKGROUND);
        for x in MARGIN..W - MARGIN {
            img.put_pixel(x, H - MARGIN, AXIS);
        }
        for y in MARGIN..=H - MARGIN {
            img.put_pixel(MARGIN, y, AXIS);
        }
        Self { img, x_range, y_range }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let span = |(lo, hi): (f64, f64)| if hi > lo { hi - lo } else { 1.0 };
        let px = MARGIN as f64 + (x - self.x_range.0) / span(self.x_range) * (W - 2 * MARGIN) as f64;
        let py = (H - MARGIN) as f64 - (y - self.y_range.0) / span(self.y_range) * (H - 2 * MARGIN) as f64;
        (px, py)
    }

    fn plot(&mut self, px: f64, py: f64, color: Rgb<u8>) {
        if px >= 0.0 && py >= 0.0 && (px as u32) < W && (py as u32) < H {
            self.img.put_pixel(px as u32, py as u32, color);
        }
    }

    /// Polyline through `points`, sampled densely enough to stay connected.
    fn line(&mut self, points: &[(f64, f64)], color: Rgb<u8>) {
        for pair in points.windows(2) {
            let (x0, y0) = self.to_pixel(pair[0].0, pair[0].1);
            let (x1, y1) = self.to_pixel(pair[1].0, pair[1].1);
            let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
            for s in 0..=steps {
                let t = s as f64 / steps as f64;
                self.plot(x0 + t * (x1 - x0), y0 + t * (y1 - y0), color);
            }
        }
    }

    fn dot(&mut self, x: f64, y: f64, color: Rgb<u8>) {
        let (px, py) = self.to_pixel(x, y);
        for dx in -1..=1 {
            for dy in -1..=1 {
                self.plot(px + dx as f64, py + dy as f64, color);
            }
        }
    }

    fn png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.img.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| v.is_finite()).fold(0.0, f64::max)
}

// ── Plots ────────────────────────────────────────────────────────────────────

/// Fire run with the largest total delivery.
fn largest_run(days: &[AshDay]) -> Vec<&AshDay> {
    let Some(year) = days
        .iter()
        .max_by(|a, b| a.cum_ash_transport.total_cmp(&b.cum_ash_transport))
        .map(|d| d.fire_year)
    else {
        return Vec::new();
    };
    days.iter().filter(|d| d.fire_year == year).collect()
}

fn time_series(days: &[AshDay]) -> Canvas {
    let run = largest_run(days);
    let x_max = run.last().map_or(1.0, |d| f64::from(d.days_from_fire));
    let y_max = max_of(run.iter().flat_map(|d| [d.remaining_ash, d.cum_water_transport, d.cum_wind_transport]));
    let mut canvas = Canvas::new((0.0, x_max), (0.0, y_max));

    let series = |f: fn(&AshDay) -> f64| -> Vec<(f64, f64)> {
        run.iter().map(|d| (f64::from(d.days_from_fire), f(*d))).collect()
    };
    canvas.line(&series(|d| d.remaining_ash), REMAINING);
    canvas.line(&series(|d| d.cum_water_transport), WATER);
    canvas.line(&series(|d| d.cum_wind_transport), WIND);
    canvas
}

fn scatter(days: &[AshDay]) -> Canvas {
    let wet: Vec<&AshDay> = days.iter().filter(|d| d.water_transport > 0.0).collect();
    let x_max = max_of(wet.iter().map(|d| d.runoff_mm));
    let y_max = max_of(wet.iter().map(|d| d.water_transport));
    let mut canvas = Canvas::new((0.0, x_max), (0.0, y_max));
    for d in wet {
        canvas.dot(d.runoff_mm, d.water_transport, WATER);
    }
    canvas
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn wepp_id_of(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix('H')?.strip_suffix("_ash.parquet")?.parse().ok()
}

fn write_png(out: &RunDirectory, name: &str, canvas: &Canvas) -> Result<PathBuf> {
    let bytes = canvas.png()?;
    let path = out.write_file(name, &mut |file| {
        file.write_all(&bytes)?;
        Ok(())
    })?;
    Ok(path)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let out = RunDirectory::new(&args.run_dir)?;

    let mut ids: Vec<u32> = std::fs::read_dir(&args.run_dir)
        .with_context(|| format!("listing {}", args.run_dir.display()))?
        .filter_map(|entry| entry.ok().and_then(|e| wepp_id_of(&e.path())))
        .filter(|id| args.wepp_id.map_or(true, |only| only == *id))
        .collect();
    ids.sort_unstable();

    for id in ids {
        let names = OutputNames::new(id);
        let series_path = args.run_dir.join(names.series());
        let days = read_ash_parquet(&series_path).with_context(|| format!("reading {}", series_path.display()))?;

        let path = write_png(&out, &names.plot_png(), &time_series(&days))?;
        println!("Wrote {}", path.display());
        let path = write_png(&out, &names.scatter_png(), &scatter(&days))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
