// WellSleuth - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Config validation (platform::config) clamps user values against the
// MIN_/MAX_ bounds declared here.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "WellSleuth";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "WellSleuth";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Input limits
// =============================================================================

/// Hard ceiling on the raw byte size of a single input file. The pipeline
/// loads the full row set into memory, so callers must refuse anything larger.
pub const MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024; // 100 MB

/// Files at or above this size are memory-mapped instead of read into a
/// heap buffer.
pub const LARGE_FILE_THRESHOLD: u64 = 16 * 1024 * 1024; // 16 MB

// =============================================================================
// Parsing
// =============================================================================

/// Null sentinel used when the file does not declare one.
pub const DEFAULT_NULL_VALUE: f64 = -999.25;

/// Absolute tolerance used when comparing a data token against the null sentinel.
pub const NULL_TOLERANCE: f64 = 1e-6;

/// Maximum number of parse warnings retained per file. Further warnings are
/// counted but not stored.
pub const MAX_PARSE_WARNINGS: usize = 1_000;

/// Relative tolerance applied to the nominal depth step when checking depth
/// consistency (10% of the step).
pub const DEPTH_STEP_TOLERANCE: f64 = 0.10;

// =============================================================================
// Signal processing defaults and bounds
// =============================================================================

/// Smallest usable moving-window size.
pub const MIN_WINDOW_SIZE: usize = 3;

/// Largest moving-window size accepted from configuration.
pub const MAX_WINDOW_SIZE: usize = 201;

/// Highest polynomial order accepted for smoothing and baseline fits.
pub const MAX_POLYNOMIAL_ORDER: usize = 6;

/// Default denoise window (points).
pub const DEFAULT_DENOISE_WINDOW: usize = 5;

/// Default Savitzky-Golay polynomial order.
pub const DEFAULT_DENOISE_ORDER: usize = 2;

/// Default blend strength between original and smoothed value.
pub const DEFAULT_DENOISE_STRENGTH: f64 = 0.8;

/// A point further than this many robust standard deviations from its local
/// median is treated as a genuine excursion and left untouched by denoise.
pub const SPIKE_PRESERVE_FACTOR: f64 = 3.0;

/// Default despike window (points).
pub const DEFAULT_DESPIKE_WINDOW: usize = 5;

/// Default despike threshold in scaled MADs.
pub const DEFAULT_DESPIKE_THRESHOLD: f64 = 3.0;

/// Upper bound on the despike threshold accepted from configuration.
pub const MAX_DESPIKE_THRESHOLD: f64 = 50.0;

/// Default baseline polynomial order.
pub const DEFAULT_BASELINE_ORDER: usize = 2;

/// Consistency constant turning a median absolute deviation into a
/// standard-deviation estimate for normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

/// Consistency constant turning a mean absolute deviation into a
/// standard-deviation estimate. Used when the MAD collapses to zero.
pub const MEAN_AD_SCALE: f64 = 1.2533;

// =============================================================================
// Quality control
// =============================================================================

/// Minimum pre-conditioning quality score required before conditioning runs.
pub const QUALITY_GATE_MIN_SCORE: f64 = 50.0;

/// Noise level (coefficient of variation, %) above which denoising is recommended.
pub const NOISE_RECOMMEND_THRESHOLD: f64 = 20.0;

/// Overall score below which a data-source review is recommended.
pub const REVIEW_SCORE_THRESHOLD: f64 = 70.0;

/// Curve completeness (%) below which gap review is recommended.
pub const LOW_COMPLETENESS_THRESHOLD: f64 = 80.0;

/// Robust z-score above which a value counts as a statistical outlier.
pub const OUTLIER_Z_THRESHOLD: f64 = 3.5;

/// Means with an absolute value below this make the noise level undefined.
pub const MEAN_EPSILON: f64 = 1e-9;

/// Points deducted from the overall score when depth sampling is inconsistent.
pub const DEPTH_INCONSISTENCY_PENALTY: f64 = 15.0;

/// Score weights: completeness, noise, range validation. Must sum to 1.
pub const SCORE_WEIGHT_COMPLETENESS: f64 = 0.5;
pub const SCORE_WEIGHT_NOISE: f64 = 0.25;
pub const SCORE_WEIGHT_VALIDATION: f64 = 0.25;

/// Sandstone matrix density (g/cc) used for density-porosity cross-checks.
pub const MATRIX_DENSITY: f64 = 2.65;

/// Formation fluid density (g/cc) used for density-porosity cross-checks.
pub const FLUID_DENSITY: f64 = 1.0;

/// Largest tolerated separation (v/v) between density porosity and NPHI.
pub const MAX_POROSITY_SEPARATION: f64 = 0.30;

/// Maximum number of validation warnings stored in a single QC result.
/// Failure counters keep counting past this limit.
pub const MAX_VALIDATION_WARNINGS: usize = 1_000;

// =============================================================================
// Batch processing
// =============================================================================

/// Default number of concurrent file runs. 0 means one per available core.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 0;

/// Hard upper bound on batch concurrency.
pub const ABSOLUTE_MAX_CONCURRENCY: usize = 64;

/// Largest per-file timeout accepted from configuration (seconds).
pub const MAX_FILE_TIMEOUT_SECS: u64 = 3_600;

// =============================================================================
// File discovery
// =============================================================================

/// Maximum directory recursion depth during discovery.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Hard upper bound on max depth.
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Maximum number of files to discover in a single batch.
pub const DEFAULT_MAX_FILES: usize = 500;

/// Hard upper bound on max files.
pub const ABSOLUTE_MAX_FILES: usize = 10_000;

/// Default include glob patterns for LAS discovery.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.las", "*.LAS"];

/// Default exclude glob patterns for LAS discovery.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["*.bak", "*.tmp", ".git", DEFAULT_OUTPUT_DIR_NAME];

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Export
// =============================================================================

/// LAS version written by the exporter.
pub const LAS_EXPORT_VERSION: &str = "2.0";

/// Conventional output directory name; excluded from discovery so that a
/// re-run over the same tree does not pick up earlier results.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "conditioned";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
