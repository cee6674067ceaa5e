//! Run driver: SBS classification, hillslope assignment, the worker pool,
//! watershed aggregation and manifest persistence.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::ash::params::AshType;
use crate::ash::simulate::AshTransportModel;
use crate::context::RunContext;
use crate::error::{AshError, ErrorKind, Result};
use crate::hillslope::{read_catalog, run_hillslope, HillslopeJob, HillslopeResult, ResolvedHillslope};
use crate::manifest::{HillslopeFailure, RunManifest, RunSummary, MANIFEST_FILE};
use crate::raster::{mean_over_subcatchments, mode_over_subcatchments, reproject_nearest, UNKNOWN_MODE};
use crate::sbs::{BurnClass, SbsClassifier, SbsOptions, SoilBurnSeverityMap, NODATA_CODE};
use crate::status::StatusLog;
use crate::watershed::{aggregate, load_series, write_outputs, WatershedSummary};

// ── Cancellation ───────────────────────────────────────────────────────────

/// Shared cancellation flag. Jobs that have not started when it is raised
/// are skipped; running jobs finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Hillslope assignment ───────────────────────────────────────────────────

/// Dominant burn class, ash type and initial load of every catalog hillslope.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub hillslopes: Vec<ResolvedHillslope>,
    pub sbs_classifier: String,
    pub burn_class_counts: BTreeMap<String, usize>,
}

fn describe_classifier(sbs: &SoilBurnSeverityMap) -> String {
    match sbs.classifier() {
        SbsClassifier::Palette(_) => "palette".to_string(),
        SbsClassifier::Breakpoints(_) if sbs.is_barc() => "barc".to_string(),
        SbsClassifier::Breakpoints(sel) => format!("breakpoints {:?}", sel.breaks()),
    }
}

fn subcatchment_id(topaz_id: &str) -> Result<i32> {
    topaz_id
        .trim()
        .parse()
        .map_err(|_| AshError::InvalidArgument(format!("topaz_id `{topaz_id}` is not an integer subcatchment id")))
}

pub fn assign_hillslopes(manifest: &RunManifest, ctx: &RunContext) -> Result<Assignment> {
    let inputs = &manifest.inputs;
    let catalog = read_catalog(&inputs.hillslopes)?;

    let options = SbsOptions {
        ignore_color_table: inputs.sbs_ignore_color_table,
        nodata_vals: inputs.sbs_nodata_vals.clone(),
    };
    let sbs = SoilBurnSeverityMap::from_raster(ctx.rasters.read_i32(&inputs.sbs_map)?, &options)?;
    let subcatchments = ctx.rasters.read_i32(&inputs.subcatchments)?;

    let classes = reproject_nearest(sbs.data(), &subcatchments, NODATA_CODE)?;
    let dominant = mode_over_subcatchments(&classes, &subcatchments, &[NODATA_CODE])?;

    let ash_types = match &inputs.ash_type_map {
        Some(path) => {
            let raw = ctx.rasters.read_i32(path)?;
            let nodata: Vec<i32> = raw.nodata.map(|nd| nd as i32).into_iter().collect();
            let fill = nodata.first().copied().unwrap_or(UNKNOWN_MODE);
            let grid = reproject_nearest(&raw, &subcatchments, fill)?;
            Some(mode_over_subcatchments(&grid, &subcatchments, &nodata)?)
        }
        None => None,
    };

    let loads = match &inputs.ash_load_map {
        Some(path) => {
            let raw = ctx.rasters.read_f64(path)?;
            let grid = reproject_nearest(&raw, &subcatchments, f64::NAN)?;
            Some(mean_over_subcatchments(&grid, &subcatchments, raw.nodata)?)
        }
        None => None,
    };

    let loading = manifest.loading();
    let hillslopes = catalog
        .iter()
        .map(|h| -> Result<ResolvedHillslope> {
            let id = subcatchment_id(&h.topaz_id)?;
            let burn_class = dominant
                .get(&id)
                .and_then(|&code| BurnClass::from_code(code))
                .unwrap_or(BurnClass::NoData);
            let ash_override = ash_types
                .as_ref()
                .and_then(|m| m.get(&id))
                .and_then(|&code| AshType::from_raster_code(code));
            let mean_load = loads
                .as_ref()
                .and_then(|m| m.get(&id))
                .map(|&mean| mean * manifest.ash_load_scale);
            Ok(ResolvedHillslope::resolve(
                h,
                burn_class,
                manifest.ash_type_policy,
                ash_override,
                mean_load,
                &loading,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let simulated = hillslopes.iter().filter(|h| h.is_simulated()).count();
    info!(hillslopes = hillslopes.len(), simulated, "hillslopes assigned");

    Ok(Assignment {
        hillslopes,
        sbs_classifier: describe_classifier(&sbs),
        burn_class_counts: sbs.burn_class_counts(),
    })
}

// ── Run ────────────────────────────────────────────────────────────────────

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub hillslopes: Vec<ResolvedHillslope>,
    pub results: Vec<HillslopeResult>,
    pub summary: RunSummary,
    pub watershed: WatershedSummary,
    pub written: Vec<PathBuf>,
    pub manifest_path: PathBuf,
}

enum JobOutcome {
    Done(HillslopeResult),
    Failed(String, AshError),
    Cancelled(String),
}

fn note(status: &StatusLog, message: String) {
    if let Err(e) = status.log(&message) {
        warn!(error = %e, "status log write failed");
    }
}

/// Run every hillslope of `manifest` and aggregate the watershed.
///
/// Configuration errors abort before any hillslope starts. Per-hillslope
/// failures are recorded and the run continues; an invariant violation in
/// any worker aborts the run.
pub fn run(manifest: &RunManifest, ctx: &RunContext, cancel: &CancelToken) -> Result<RunOutcome> {
    let status = StatusLog::in_dir(ctx.run_dir())?;
    status.log(format!("ash run started, model {:?}, fire date {}", manifest.model, manifest.fire_date))?;

    let assignment = match assign_hillslopes(manifest, ctx) {
        Ok(a) => a,
        Err(e) => {
            status.error(format!("hillslope assignment failed: {e}"))?;
            return Err(e);
        }
    };
    status.log(format!(
        "SBS classified by {}; {} hillslopes, {} with ash",
        assignment.sbs_classifier,
        assignment.hillslopes.len(),
        assignment.hillslopes.iter().filter(|h| h.is_simulated()).count()
    ))?;

    let climate = Arc::new(ctx.climate.climate()?);
    let first_year = climate
        .iter()
        .map(|d| d.year)
        .min()
        .ok_or_else(|| AshError::InvalidArgument("climate record is empty".to_string()))?;
    if !climate.iter().any(|d| manifest.fire_date.matches(d.month, d.day)) {
        let e = AshError::config("fire_date", manifest.fire_date, "does not occur in the climate record");
        status.error(e.to_string())?;
        return Err(e);
    }

    let wind_mode = manifest.wind_mode();
    let jobs = assignment
        .hillslopes
        .iter()
        .filter(|h| h.is_simulated())
        .map(|h| -> Result<HillslopeJob> {
            let ash_type = h
                .ash_type
                .ok_or_else(|| AshError::InvalidArgument(format!("hillslope {} carries no ash", h.topaz_id)))?;
            let params = manifest.params_for(ash_type);
            AshTransportModel::new(params.clone(), h.ini_ash_load, manifest.model, wind_mode).map_err(|e| match e {
                AshError::InvalidConfig { key, value, reason } => AshError::InvalidConfig {
                    key: format!("hillslope {}: {key}", h.topaz_id),
                    value,
                    reason,
                },
                other => other,
            })?;
            Ok(HillslopeJob {
                hillslope: h.clone(),
                params,
                model: manifest.model,
                wind_mode,
                fire_date: manifest.fire_date,
                recurrence: manifest.recurrence.clone(),
                first_year,
                climate: Arc::clone(&climate),
            })
        })
        .collect::<Result<Vec<_>>>();
    let jobs = match jobs {
        Ok(jobs) => jobs,
        Err(e) => {
            status.error(e.to_string())?;
            return Err(e);
        }
    };

    let run_job = |job: &HillslopeJob| -> JobOutcome {
        let topaz_id = job.hillslope.topaz_id.clone();
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled(topaz_id);
        }
        note(&status, format!("running hillslope {topaz_id} (H{})", job.hillslope.wepp_id));
        match run_hillslope(job, ctx.hydrology.as_ref(), ctx.output.as_ref()) {
            Ok(result) => {
                note(
                    &status,
                    format!(
                        "hillslope {topaz_id} finished: {} fire years, mean annual delivery {:.4} t/ha",
                        result.fire_years, result.mean_annual_delivery
                    ),
                );
                JobOutcome::Done(result)
            }
            Err(e) => JobOutcome::Failed(topaz_id, e),
        }
    };

    let workers = manifest.num_workers.unwrap_or(0);
    info!(jobs = jobs.len(), workers, "dispatching hillslopes");
    let outcomes: Vec<JobOutcome> = if workers == 1 {
        jobs.iter().map(run_job).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| AshError::config("num_workers", workers, e.to_string()))?;
        pool.install(|| jobs.par_iter().map(run_job).collect())
    };

    let mut results = Vec::new();
    let mut failed = Vec::new();
    let mut cancelled = Vec::new();
    let mut fatal = None;
    for outcome in outcomes {
        match outcome {
            JobOutcome::Done(r) => {
                if r.undepleted_runs > 0 {
                    status.warn(format!(
                        "hillslope {}: {} fire runs reached the end of the climate record with ash left",
                        r.topaz_id, r.undepleted_runs
                    ))?;
                }
                results.push(r);
            }
            JobOutcome::Failed(topaz_id, e) => {
                warn!(topaz_id = %topaz_id, error = %e, "hillslope failed");
                status.error(format!("hillslope {topaz_id} failed: {e}"))?;
                failed.push(HillslopeFailure {
                    topaz_id,
                    error: e.to_string(),
                });
                if e.kind() == ErrorKind::Invariant && fatal.is_none() {
                    fatal = Some(e);
                }
            }
            JobOutcome::Cancelled(topaz_id) => cancelled.push(topaz_id),
        }
    }

    let mut summary = RunSummary {
        finished_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        sbs_classifier: assignment.sbs_classifier.clone(),
        burn_class_counts: assignment.burn_class_counts.clone(),
        hillslopes_total: assignment.hillslopes.len(),
        hillslopes_simulated: results.len(),
        hillslopes_failed: failed,
        hillslopes_cancelled: cancelled,
        undepleted_runs: results.iter().map(|r| r.undepleted_runs).sum(),
        missing_from_aggregation: Vec::new(),
    };

    let manifest_path = ctx.run_dir().join(MANIFEST_FILE);
    let mut persisted = manifest.clone();
    persisted.hillslopes = assignment.hillslopes.clone();

    if let Some(e) = fatal {
        persisted.summary = Some(summary);
        persisted.save(&manifest_path)?;
        return Err(e);
    }
    if !summary.hillslopes_cancelled.is_empty() {
        status.warn(format!("run cancelled; {} hillslopes not started", summary.hillslopes_cancelled.len()))?;
        persisted.summary = Some(summary);
        persisted.save(&manifest_path)?;
        return Err(AshError::Cancelled);
    }

    let finished: Vec<ResolvedHillslope> = assignment
        .hillslopes
        .iter()
        .filter(|h| results.iter().any(|r| r.topaz_id == h.topaz_id))
        .cloned()
        .collect();
    let series = load_series(ctx.run_dir(), &finished);
    let watershed = aggregate(&assignment.hillslopes, &series, &manifest.aggregation_config());
    let written = write_outputs(ctx.output.as_ref(), &watershed)?;

    summary.missing_from_aggregation = watershed.missing_hillslopes.clone();
    if !watershed.missing_hillslopes.is_empty() {
        status.warn(format!(
            "{} hillslopes missing from watershed aggregation",
            watershed.missing_hillslopes.len()
        ))?;
    }
    status.log(format!(
        "watershed aggregated over {} hillslopes and {} fire years",
        watershed.hillslopes_aggregated, watershed.fire_years
    ))?;

    persisted.summary = Some(summary.clone());
    persisted.save(&manifest_path)?;
    status.log("ash run finished")?;

    Ok(RunOutcome {
        hillslopes: assignment.hillslopes,
        results,
        summary,
        watershed,
        written,
        manifest_path,
    })
}
