// WellSleuth - core/pipeline.rs
//
// Pipeline orchestrator: parse -> standardize -> validate (pre) ->
// quality gate -> denoise / despike / baseline -> validate (post).
//
// Each invocation owns its `LogFile`, QC results and history; nothing is
// shared between runs. Only a parse failure aborts; conditioning failures
// are reported in the result alongside the unconditioned file.

use crate::core::mnemonic::{self, StandardizationOptions, StandardizationResult};
use crate::core::model::LogFile;
use crate::core::parser::{self, ParseOptions};
use crate::core::qc::{self, QcResult, ValidationOptions};
use crate::core::signal::{
    self, BaselineMethod, BaselineOptions, DenoiseMethod, DenoiseOptions, DespikeMethod,
    DespikeOptions,
};
use crate::util::constants;
use crate::util::error::AlgorithmError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Options for one pipeline run. Cloned into each run; never mutated while
/// a run is in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub denoise: DenoiseOptions,
    pub despike: DespikeOptions,
    pub baseline: BaselineOptions,
    pub validation: ValidationOptions,
    pub standardization: StandardizationOptions,
    #[serde(skip)]
    pub parse: ParseOptions,
}

impl ProcessingOptions {
    /// Check the parameters of every enabled conditioning step.
    pub fn validate(&self) -> Result<(), AlgorithmError> {
        if self.denoise.enabled {
            self.denoise.validate()?;
        }
        if self.despike.enabled {
            self.despike.validate()?;
        }
        if self.baseline.enabled {
            self.baseline.validate()?;
        }
        Ok(())
    }

    /// Whether any data-transforming step is enabled.
    pub fn conditions_data(&self) -> bool {
        self.denoise.enabled || self.despike.enabled || self.baseline.enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Parse,
    Standardize,
    ValidatePre,
    QualityGate,
    Denoise,
    Despike,
    BaselineCorrection,
    ValidatePost,
}

impl PipelineStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Standardize => "standardize",
            Self::ValidatePre => "validate_pre",
            Self::QualityGate => "quality_gate",
            Self::Denoise => "denoise",
            Self::Despike => "despike",
            Self::BaselineCorrection => "baseline_correction",
            Self::ValidatePost => "validate_post",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Append-only audit record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingHistoryEntry {
    pub step: PipelineStep,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    /// Algorithm identifiers, for successful data-transforming steps.
    pub algorithms: Vec<String>,
    pub message: Option<String>,
}

/// Resource figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    pub duration_ms: f64,
    pub input_bytes: u64,
    pub rows: usize,
    pub curves: usize,
    /// Estimate only: input buffer plus every live copy of the row matrix.
    pub estimated_peak_memory_bytes: u64,
}

/// Everything a caller gets back from one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub filename: String,
    /// `None` only when parsing failed.
    pub file: Option<LogFile>,
    pub pre_qc: Option<QcResult>,
    pub post_qc: Option<QcResult>,
    /// Whether conditioning ran and its output was kept.
    pub conditioned: bool,
    pub spikes_replaced: usize,
    pub history: Vec<ProcessingHistoryEntry>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub metrics: RunMetrics,
}

/// Per-run accumulator.
struct Run {
    filename: String,
    history: Vec<ProcessingHistoryEntry>,
    warnings: Vec<String>,
    errors: Vec<String>,
    started: Instant,
    input_bytes: u64,
}

impl Run {
    fn new(filename: &str, input_bytes: u64) -> Self {
        Self {
            filename: filename.to_string(),
            history: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            started: Instant::now(),
            input_bytes,
        }
    }

    fn record(
        &mut self,
        step: PipelineStep,
        started: Instant,
        success: bool,
        algorithms: Vec<String>,
        message: Option<String>,
    ) {
        tracing::debug!(
            file = %self.filename,
            step = step.label(),
            success,
            message = message.as_deref().unwrap_or(""),
            "Pipeline step finished"
        );
        self.history.push(ProcessingHistoryEntry {
            step,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            success,
            algorithms,
            message,
        });
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Run the full pipeline on raw bytes.
pub fn run(bytes: &[u8], filename: &str, options: &ProcessingOptions) -> PipelineResult {
    let mut ctx = Run::new(filename, bytes.len() as u64);

    let step_start = Instant::now();
    match parser::parse(bytes, filename, &options.parse) {
        Ok(parsed) => {
            let count = parsed.warnings.len();
            ctx.warnings
                .extend(parsed.warnings.iter().map(|w| format!("parse: {w}")));
            let message = (count > 0).then(|| format!("{count} parse warnings"));
            ctx.record(PipelineStep::Parse, step_start, true, Vec::new(), message);
            process(parsed.file, options, ctx)
        }
        Err(e) => {
            tracing::warn!(file = filename, error = %e, "Parse failed; run aborted");
            ctx.errors.push(e.to_string());
            ctx.record(
                PipelineStep::Parse,
                step_start,
                false,
                Vec::new(),
                Some(e.to_string()),
            );
            let metrics = RunMetrics {
                duration_ms: ctx.started.elapsed().as_secs_f64() * 1000.0,
                input_bytes: ctx.input_bytes,
                estimated_peak_memory_bytes: ctx.input_bytes,
                ..RunMetrics::default()
            };
            PipelineResult {
                success: false,
                filename: ctx.filename,
                file: None,
                pre_qc: None,
                post_qc: None,
                conditioned: false,
                spikes_replaced: 0,
                history: ctx.history,
                warnings: ctx.warnings,
                errors: ctx.errors,
                metrics,
            }
        }
    }
}

/// Re-enter the pipeline with an already parsed file. History starts at
/// standardization.
pub fn run_file(file: LogFile, options: &ProcessingOptions) -> PipelineResult {
    let ctx = Run::new(&file.filename, 0);
    process(file, options, ctx)
}

fn process(mut file: LogFile, options: &ProcessingOptions, mut ctx: Run) -> PipelineResult {
    // Standardize
    let standardization = if options.standardization.enabled {
        let step_start = Instant::now();
        let summary = mnemonic::standardize(&mut file, &options.standardization);
        for conflict in &summary.conflicts {
            ctx.warnings.push(format!(
                "standardize: '{}' would map to '{}', which is already in use; name kept",
                conflict.original, conflict.canonical
            ));
        }
        let algorithm = format!("mnemonic_{:?}", summary.standard).to_ascii_lowercase();
        let message = format!(
            "{} renamed, {} already standard, {} unrecognised",
            summary.renamed.len(),
            summary.already_standard.len(),
            summary.non_standard.len()
        );
        ctx.record(
            PipelineStep::Standardize,
            step_start,
            true,
            vec![algorithm],
            Some(message),
        );
        Some(summary)
    } else {
        None
    };

    // Validate (pre)
    let step_start = Instant::now();
    let pre_qc = validate(&file, &options.validation, standardization.clone());
    ctx.record(
        PipelineStep::ValidatePre,
        step_start,
        true,
        Vec::new(),
        Some(format!("overall score {:.1}", pre_qc.overall_score)),
    );

    // Gate + conditioning
    let mut conditioned = false;
    let mut spikes_replaced = 0;
    let mut live_copies = 1;
    if options.conditions_data() {
        let step_start = Instant::now();
        if pre_qc.passes_gate() {
            ctx.record(
                PipelineStep::QualityGate,
                step_start,
                true,
                Vec::new(),
                Some(format!(
                    "score {:.1} above {:.0}; conditioning",
                    pre_qc.overall_score,
                    constants::QUALITY_GATE_MIN_SCORE
                )),
            );
            live_copies = 2;
            match condition(&file, options, &mut ctx) {
                Ok((working, spikes)) => {
                    file = working;
                    conditioned = true;
                    spikes_replaced = spikes;
                }
                Err(e) => {
                    // Original file is kept for inspection.
                    ctx.errors.push(e);
                }
            }
        } else {
            let warning = format!(
                "quality score {:.1} is not above {:.0}; conditioning skipped",
                pre_qc.overall_score,
                constants::QUALITY_GATE_MIN_SCORE
            );
            tracing::info!(file = %ctx.filename, score = pre_qc.overall_score, "Conditioning skipped by quality gate");
            ctx.warnings.push(warning.clone());
            ctx.record(
                PipelineStep::QualityGate,
                step_start,
                true,
                Vec::new(),
                Some(warning),
            );
        }
    }

    // Validate (post)
    let step_start = Instant::now();
    let post_qc = validate(&file, &options.validation, standardization);
    ctx.record(
        PipelineStep::ValidatePost,
        step_start,
        true,
        Vec::new(),
        Some(format!("overall score {:.1}", post_qc.overall_score)),
    );

    let success = ctx.errors.is_empty();
    let metrics = RunMetrics {
        duration_ms: ctx.started.elapsed().as_secs_f64() * 1000.0,
        input_bytes: ctx.input_bytes,
        rows: file.rows.len(),
        curves: file.curves.len(),
        estimated_peak_memory_bytes: ctx.input_bytes
            + file.estimated_footprint_bytes() * live_copies,
    };

    tracing::info!(
        file = %ctx.filename,
        success,
        conditioned,
        pre_score = pre_qc.overall_score,
        post_score = post_qc.overall_score,
        duration_ms = metrics.duration_ms,
        "Pipeline run complete"
    );

    PipelineResult {
        success,
        filename: ctx.filename,
        file: Some(file),
        pre_qc: Some(pre_qc),
        post_qc: Some(post_qc),
        conditioned,
        spikes_replaced,
        history: ctx.history,
        warnings: ctx.warnings,
        errors: ctx.errors,
        metrics,
    }
}

fn validate(
    file: &LogFile,
    options: &ValidationOptions,
    standardization: Option<StandardizationResult>,
) -> QcResult {
    qc::assess_with_standardization(file, options, standardization)
}

/// Apply the enabled conditioning steps to a copy of `file`.
///
/// Returns the conditioned copy and the number of spikes replaced, or the
/// error message of the step that failed. History gets one entry per step
/// attempted, ending at the failing one.
fn condition(
    file: &LogFile,
    options: &ProcessingOptions,
    ctx: &mut Run,
) -> Result<(LogFile, usize), String> {
    let mut working = file.clone();
    let mut spikes = 0;
    let targets: Vec<usize> = working
        .measurement_indices()
        .into_iter()
        .filter(|&i| working.curves[i].category.is_conditionable())
        .collect();

    if options.denoise.enabled {
        let step_start = Instant::now();
        let step = PipelineStep::Denoise;
        if let Err(e) = options.denoise.validate() {
            return Err(fail_step(ctx, step, step_start, &e));
        }
        let tally = apply_per_curve(&mut working, &targets, step, ctx, |values| {
            signal::denoise(values, &options.denoise).map(|v| (v, 0))
        });
        ctx.record(
            step,
            step_start,
            true,
            vec![denoise_id(&options.denoise)],
            Some(format!("{} curves smoothed", tally.curves)),
        );
    }

    if options.despike.enabled {
        let step_start = Instant::now();
        let step = PipelineStep::Despike;
        if let Err(e) = options.despike.validate() {
            return Err(fail_step(ctx, step, step_start, &e));
        }
        let tally = apply_per_curve(&mut working, &targets, step, ctx, |values| {
            signal::despike(values, &options.despike).map(|out| {
                let n = out.spike_count();
                (out.values, n)
            })
        });
        spikes += tally.points;
        ctx.record(
            step,
            step_start,
            true,
            vec![despike_id(&options.despike)],
            Some(format!("{} spikes replaced", tally.points)),
        );
    }

    if options.baseline.enabled {
        let step_start = Instant::now();
        let step = PipelineStep::BaselineCorrection;
        if let Err(e) = options.baseline.validate() {
            return Err(fail_step(ctx, step, step_start, &e));
        }
        let depths = working.depths();
        let tally = apply_per_curve(&mut working, &targets, step, ctx, |values| {
            signal::baseline_correct(&depths, values, &options.baseline).map(|v| (v, 0))
        });
        ctx.record(
            step,
            step_start,
            true,
            vec![baseline_id(&options.baseline)],
            Some(format!("{} curves corrected", tally.curves)),
        );
    }

    Ok((working, spikes))
}

fn fail_step(ctx: &mut Run, step: PipelineStep, started: Instant, error: &AlgorithmError) -> String {
    tracing::warn!(file = %ctx.filename, step = step.label(), error = %error, "Conditioning step failed");
    ctx.record(step, started, false, Vec::new(), Some(error.to_string()));
    format!("{step}: {error}")
}

/// Curves an operator succeeded on, and the points it reported changing.
struct CurveTally {
    curves: usize,
    points: usize,
}

/// Run `op` on each target curve. A curve whose operator errors is left
/// as-is and reported as a warning.
fn apply_per_curve<F>(
    file: &mut LogFile,
    targets: &[usize],
    step: PipelineStep,
    ctx: &mut Run,
    op: F,
) -> CurveTally
where
    F: Fn(&[Option<f64>]) -> Result<(Vec<Option<f64>>, usize), AlgorithmError>,
{
    let mut tally = CurveTally { curves: 0, points: 0 };
    for &index in targets {
        let values = file.curve_values(index);
        match op(&values) {
            Ok((updated, changed)) => {
                file.set_curve_values(index, &updated);
                tally.curves += 1;
                tally.points += changed;
            }
            Err(e) => {
                let mnemonic = &file.curves[index].mnemonic;
                tracing::debug!(curve = %mnemonic, step = step.label(), error = %e, "Curve skipped");
                ctx.warnings.push(format!("{step}: {mnemonic} skipped: {e}"));
            }
        }
    }
    tally
}

fn denoise_id(o: &DenoiseOptions) -> String {
    match o.method {
        DenoiseMethod::SavitzkyGolay => format!(
            "savitzky_golay(window={}, order={}, strength={:.2}, preserve_spikes={})",
            o.window_size, o.polynomial_order, o.strength, o.preserve_spikes
        ),
        DenoiseMethod::MovingAverage => format!(
            "moving_average(window={}, strength={:.2}, preserve_spikes={})",
            o.window_size, o.strength, o.preserve_spikes
        ),
        DenoiseMethod::Median => format!(
            "median(window={}, strength={:.2}, preserve_spikes={})",
            o.window_size, o.strength, o.preserve_spikes
        ),
    }
}

fn despike_id(o: &DespikeOptions) -> String {
    let method = match o.method {
        DespikeMethod::Mad => "mad",
        DespikeMethod::ZScore => "zscore",
    };
    format!(
        "{method}(window={}, threshold={}, replacement={:?})",
        o.window_size, o.threshold, o.replacement
    )
    .to_ascii_lowercase()
}

fn baseline_id(o: &BaselineOptions) -> String {
    match o.method {
        BaselineMethod::Polynomial => format!("polynomial_baseline(order={})", o.polynomial_order),
        BaselineMethod::Linear => "linear_baseline".to_string(),
    }
}
