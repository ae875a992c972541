// WellSleuth - platform/config.rs
//
// Platform directory resolution and config.toml loading with validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::discovery::DiscoveryConfig;
use crate::core::mnemonic::{self, MnemonicStandard};
use crate::core::pipeline::ProcessingOptions;
use crate::core::qc::PhysicalRange;
use crate::core::signal::{BaselineMethod, DenoiseMethod, DespikeMethod, ReplacementMethod};
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolved platform paths for WellSleuth configuration and data.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/wellsleuth/ or %APPDATA%\WellSleuth\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so that a newer config file still loads in an
/// older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub denoise: DenoiseSection,
    pub despike: DespikeSection,
    pub baseline: BaselineSection,
    pub validation: ValidationSection,
    pub standardization: StandardizationSection,
    pub batch: BatchSection,
    pub discovery: DiscoverySection,
    pub logging: LoggingSection,
}

/// `[denoise]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DenoiseSection {
    pub enabled: Option<bool>,
    /// "savitzky_golay", "moving_average" or "median".
    pub method: Option<String>,
    pub window_size: Option<usize>,
    pub polynomial_order: Option<usize>,
    pub strength: Option<f64>,
    pub preserve_spikes: Option<bool>,
}

/// `[despike]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DespikeSection {
    pub enabled: Option<bool>,
    /// "mad" or "z_score".
    pub method: Option<String>,
    pub threshold: Option<f64>,
    pub window_size: Option<usize>,
    /// "pchip", "linear" or "median".
    pub replacement: Option<String>,
}

/// `[baseline]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct BaselineSection {
    pub enabled: Option<bool>,
    /// "polynomial" or "linear".
    pub method: Option<String>,
    pub polynomial_order: Option<usize>,
}

/// One `[validation.ranges.<MNEM>]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RangeSection {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// `[validation]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub enabled: Option<bool>,
    pub cross_validation: Option<bool>,
    pub flag_outliers: Option<bool>,
    /// Entries override (or extend) the built-in range table.
    pub ranges: BTreeMap<String, RangeSection>,
}

/// `[standardization]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct StandardizationSection {
    pub enabled: Option<bool>,
    /// "api" or "descriptive".
    pub standard: Option<String>,
    pub auto_standardize: Option<bool>,
    pub preserve_original: Option<bool>,
}

/// `[batch]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Concurrent file runs (0 = one per core).
    pub jobs: Option<usize>,
    /// Per-file timeout in seconds (0 = none).
    pub timeout_secs: Option<u64>,
}

/// `[discovery]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub max_depth: Option<usize>,
    pub max_files: Option<usize>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// "error", "warn", "info", "debug" or "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub processing: ProcessingOptions,
    pub discovery: DiscoveryConfig,
    /// Concurrent file runs (0 = one per core).
    pub jobs: usize,
    pub timeout_secs: Option<u64>,
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingOptions::default(),
            discovery: DiscoveryConfig::default(),
            jobs: constants::DEFAULT_BATCH_CONCURRENCY,
            timeout_secs: None,
            log_level: None,
        }
    }
}

/// Read and deserialise a config file without validating values.
pub fn read_raw_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the config file at `config_path`.
///
/// Returns the validated `AppConfig` and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). An
/// unreadable or unparseable file yields defaults and one warning.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let raw = match read_raw_config(config_path) {
        Ok(raw) => raw,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let config = validate_raw(raw, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    (config, warnings)
}

/// Turn a raw config into validated settings, accumulating every problem.
pub fn validate_raw(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();
    let defaults = ProcessingOptions::default();
    let p = &mut config.processing;

    // -- Denoise --
    let d = &raw.denoise;
    if let Some(v) = d.enabled {
        p.denoise.enabled = v;
    }
    if let Some(m) = &d.method {
        if let Some(m) = parse_choice(
            "denoise.method",
            m,
            &[
                ("savitzky_golay", DenoiseMethod::SavitzkyGolay),
                ("moving_average", DenoiseMethod::MovingAverage),
                ("median", DenoiseMethod::Median),
            ],
            warnings,
        ) {
            p.denoise.method = m;
        }
    }
    if let Some(v) = d.window_size {
        p.denoise.window_size = v;
    }
    if let Some(v) = d.polynomial_order {
        p.denoise.polynomial_order = v;
    }
    if let Some(v) = d.strength {
        p.denoise.strength = v;
    }
    if let Some(v) = d.preserve_spikes {
        p.denoise.preserve_spikes = v;
    }
    if let Err(e) = p.denoise.validate() {
        warnings.push(format!("[denoise] {e}. Using default denoise parameters."));
        if !(0.0..=1.0).contains(&p.denoise.strength) {
            p.denoise.strength = defaults.denoise.strength;
        }
        if p.denoise.validate().is_err() {
            p.denoise.window_size = defaults.denoise.window_size;
            p.denoise.polynomial_order = defaults.denoise.polynomial_order;
        }
    }

    // -- Despike --
    let s = &raw.despike;
    if let Some(v) = s.enabled {
        p.despike.enabled = v;
    }
    if let Some(m) = &s.method {
        if let Some(m) = parse_choice(
            "despike.method",
            m,
            &[("mad", DespikeMethod::Mad), ("z_score", DespikeMethod::ZScore)],
            warnings,
        ) {
            p.despike.method = m;
        }
    }
    if let Some(r) = &s.replacement {
        if let Some(r) = parse_choice(
            "despike.replacement",
            r,
            &[
                ("pchip", ReplacementMethod::Pchip),
                ("linear", ReplacementMethod::Linear),
                ("median", ReplacementMethod::Median),
            ],
            warnings,
        ) {
            p.despike.replacement = r;
        }
    }
    if let Some(v) = s.threshold {
        p.despike.threshold = v;
    }
    if let Some(v) = s.window_size {
        p.despike.window_size = v;
    }
    if let Err(e) = p.despike.validate() {
        warnings.push(format!("[despike] {e}. Using default despike parameters."));
        p.despike.threshold = defaults.despike.threshold;
        p.despike.window_size = defaults.despike.window_size;
    }

    // -- Baseline --
    let b = &raw.baseline;
    if let Some(v) = b.enabled {
        p.baseline.enabled = v;
    }
    if let Some(m) = &b.method {
        if let Some(m) = parse_choice(
            "baseline.method",
            m,
            &[
                ("polynomial", BaselineMethod::Polynomial),
                ("linear", BaselineMethod::Linear),
            ],
            warnings,
        ) {
            p.baseline.method = m;
        }
    }
    if let Some(v) = b.polynomial_order {
        p.baseline.polynomial_order = v;
    }
    if let Err(e) = p.baseline.validate() {
        warnings.push(format!("[baseline] {e}. Using default baseline order."));
        p.baseline.polynomial_order = defaults.baseline.polynomial_order;
    }

    // -- Validation --
    let v = &raw.validation;
    if let Some(x) = v.enabled {
        p.validation.enabled = x;
    }
    if let Some(x) = v.cross_validation {
        p.validation.cross_validation = x;
    }
    if let Some(x) = v.flag_outliers {
        p.validation.flag_outliers = x;
    }
    for (mnem, range) in &v.ranges {
        let key = mnemonic::range_key(mnem);
        let current = p.validation.ranges.get(&key).copied();
        let min = range.min.or(current.map(|r| r.min));
        let max = range.max.or(current.map(|r| r.max));
        match (min, max) {
            (Some(min), Some(max)) if min.is_finite() && max.is_finite() && min < max => {
                p.validation.ranges.insert(key, PhysicalRange::new(min, max));
            }
            _ => warnings.push(out_of_range(
                &format!("validation.ranges.{key}"),
                &format!("min={min:?}, max={max:?}"),
                "finite min and max with min < max",
                "ignoring entry",
            )),
        }
    }

    // -- Standardization --
    let st = &raw.standardization;
    if let Some(x) = st.enabled {
        p.standardization.enabled = x;
    }
    if let Some(s) = &st.standard {
        if let Some(s) = parse_choice(
            "standardization.standard",
            s,
            &[
                ("api", MnemonicStandard::Api),
                ("descriptive", MnemonicStandard::Descriptive),
            ],
            warnings,
        ) {
            p.standardization.standard = s;
        }
    }
    if let Some(x) = st.auto_standardize {
        p.standardization.auto_standardize = x;
    }
    if let Some(x) = st.preserve_original {
        p.standardization.preserve_original = x;
    }

    // -- Batch --
    if let Some(jobs) = raw.batch.jobs {
        if jobs <= constants::ABSOLUTE_MAX_CONCURRENCY {
            config.jobs = jobs;
        } else {
            warnings.push(out_of_range(
                "batch.jobs",
                &jobs.to_string(),
                &format!("0-{}", constants::ABSOLUTE_MAX_CONCURRENCY),
                "using default (one per core)",
            ));
        }
    }
    if let Some(secs) = raw.batch.timeout_secs {
        if secs == 0 {
            config.timeout_secs = None;
        } else if secs <= constants::MAX_FILE_TIMEOUT_SECS {
            config.timeout_secs = Some(secs);
        } else {
            warnings.push(out_of_range(
                "batch.timeout_secs",
                &secs.to_string(),
                &format!("0-{}", constants::MAX_FILE_TIMEOUT_SECS),
                "using no timeout",
            ));
        }
    }

    // -- Discovery --
    if let Some(depth) = raw.discovery.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.discovery.max_depth = depth;
        } else {
            warnings.push(out_of_range(
                "discovery.max_depth",
                &depth.to_string(),
                &format!("1-{}", constants::ABSOLUTE_MAX_DEPTH),
                &format!("using default ({})", constants::DEFAULT_MAX_DEPTH),
            ));
        }
    }
    if let Some(files) = raw.discovery.max_files {
        if (1..=constants::ABSOLUTE_MAX_FILES).contains(&files) {
            config.discovery.max_files = files;
        } else {
            warnings.push(out_of_range(
                "discovery.max_files",
                &files.to_string(),
                &format!("1-{}", constants::ABSOLUTE_MAX_FILES),
                &format!("using default ({})", constants::DEFAULT_MAX_FILES),
            ));
        }
    }
    if let Some(patterns) = &raw.discovery.include_patterns {
        config.discovery.include_patterns = patterns.clone();
    }
    if let Some(patterns) = &raw.discovery.exclude_patterns {
        config.discovery.exclude_patterns = patterns.clone();
    }

    // -- Logging --
    if let Some(level) = &raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(out_of_range(
                "logging.level",
                level,
                "error, warn, info, debug, trace",
                &format!("using default ({})", constants::DEFAULT_LOG_LEVEL),
            ));
        }
    }

    config
}

fn out_of_range(field: &str, value: &str, expected: &str, fallback: &str) -> String {
    let err = ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    };
    format!("{err}; {fallback}.")
}

/// Match a case-insensitive choice, recording a warning for unknown values.
fn parse_choice<T: Copy>(
    field: &str,
    value: &str,
    choices: &[(&str, T)],
    warnings: &mut Vec<String>,
) -> Option<T> {
    let wanted = value.trim().to_ascii_lowercase().replace('-', "_");
    let found = choices.iter().find(|(name, _)| *name == wanted).map(|(_, v)| *v);
    if found.is_none() {
        let names: Vec<&str> = choices.iter().map(|(name, _)| *name).collect();
        warnings.push(out_of_range(field, value, &names.join(", "), "keeping default"));
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_file_lives_in_config_dir() {
        let paths = PlatformPaths::resolve();
        let file = paths.config_file();
        assert!(file.starts_with(&paths.config_dir));
        assert!(file.ends_with(constants::CONFIG_FILE_NAME));
    }

    #[test]
    fn test_missing_file_gives_defaults_without_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(&dir.path().join("absent.toml"));
        assert!(warnings.is_empty());
        assert_eq!(config.processing.denoise, ProcessingOptions::default().denoise);
        assert_eq!(config.jobs, constants::DEFAULT_BATCH_CONCURRENCY);
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_valid_config_applies_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[denoise]
method = "median"
window_size = 7

[despike]
method = "z_score"
threshold = 2.5
replacement = "linear"

[baseline]
enabled = true
method = "linear"

[validation]
cross_validation = false

[validation.ranges.GR]
max = 300.0

[standardization]
standard = "descriptive"

[batch]
jobs = 4
timeout_secs = 30

[discovery]
max_depth = 3

[logging]
level = "DEBUG"
"#,
        );
        let (config, warnings) = load_config(&path);
        assert!(warnings.is_empty(), "{warnings:?}");
        let p = &config.processing;
        assert_eq!(p.denoise.method, DenoiseMethod::Median);
        assert_eq!(p.denoise.window_size, 7);
        assert_eq!(p.despike.method, DespikeMethod::ZScore);
        assert_eq!(p.despike.replacement, ReplacementMethod::Linear);
        assert!((p.despike.threshold - 2.5).abs() < f64::EPSILON);
        assert!(p.baseline.enabled);
        assert_eq!(p.baseline.method, BaselineMethod::Linear);
        assert!(!p.validation.cross_validation);
        assert_eq!(p.validation.ranges["GR"], PhysicalRange::new(0.0, 300.0));
        assert_eq!(p.standardization.standard, MnemonicStandard::Descriptive);
        assert_eq!(config.jobs, 4);
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.discovery.max_depth, 3);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_values_fall_back_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[denoise]
window_size = 4

[despike]
threshold = -1.0
method = "wavelet"

[validation.ranges.RHOB]
min = 3.0
max = 1.0

[batch]
jobs = 1000

[logging]
level = "verbose"
"#,
        );
        let (config, warnings) = load_config(&path);
        assert_eq!(warnings.len(), 6, "{warnings:?}");
        let defaults = ProcessingOptions::default();
        assert_eq!(config.processing.denoise.window_size, defaults.denoise.window_size);
        assert_eq!(config.processing.despike.threshold, defaults.despike.threshold);
        assert_eq!(config.processing.despike.method, defaults.despike.method);
        assert_eq!(
            config.processing.validation.ranges["RHOB"],
            defaults.validation.ranges["RHOB"]
        );
        assert_eq!(config.jobs, constants::DEFAULT_BATCH_CONCURRENCY);
        assert!(config.log_level.is_none());
        assert!(warnings.iter().any(|w| w.contains("batch.jobs")));
    }

    #[test]
    fn test_unparseable_file_warns_and_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[denoise\nwindow_size = ");
        let (config, warnings) = load_config(&path);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Using defaults"));
        assert!(config.processing.denoise.enabled);
    }

    #[test]
    fn test_read_raw_config_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_raw_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_new_range_entry_without_bounds_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[validation.ranges.TENS]\nmin = 0.0\n");
        let (config, warnings) = load_config(&path);
        assert_eq!(warnings.len(), 1);
        assert!(!config.processing.validation.ranges.contains_key("TENS"));
    }

    #[test]
    fn test_alias_keyed_range_overrides_canonical_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[validation.ranges.NEUTRON_POROSITY]\nmax = 0.8\n");
        let (config, warnings) = load_config(&path);
        assert!(warnings.is_empty(), "{warnings:?}");

        let ranges = &config.processing.validation.ranges;
        let defaults = ProcessingOptions::default().validation.ranges;
        assert_eq!(ranges["NPHI"].max, 0.8);
        assert_eq!(ranges["NPHI"].min, defaults["NPHI"].min);
        assert!(!ranges.contains_key("NEUTRON_POROSITY"));
    }

    #[test]
    fn test_invalid_denoise_number_keeps_valid_choices() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[denoise]\nmethod = \"median\"\npreserve_spikes = false\nwindow_size = 4\nstrength = 0.5\n",
        );
        let (config, warnings) = load_config(&path);
        assert_eq!(warnings.len(), 1, "{warnings:?}");

        let denoise = &config.processing.denoise;
        let defaults = ProcessingOptions::default().denoise;
        assert_eq!(denoise.method, DenoiseMethod::Median);
        assert!(!denoise.preserve_spikes);
        assert_eq!(denoise.strength, 0.5);
        assert_eq!(denoise.window_size, defaults.window_size);
    }
}
