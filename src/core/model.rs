// WellSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies. These types are the shared vocabulary across all layers:
// the parser produces them, the standardizer renames them, the signal
// operators rewrite their values and the QC engine reads them.

use crate::util::constants;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Curve classification
// =============================================================================

/// Declared role of a curve. The first curve of a LAS file is the depth index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveRole {
    Depth,
    Measurement,
}

/// Closed physical/display category, assigned once per curve at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurveCategory {
    Depth,
    GammaRay,
    SpontaneousPotential,
    Caliper,
    Resistivity,
    NeutronPorosity,
    BulkDensity,
    DensityCorrection,
    Photoelectric,
    Sonic,
    #[default]
    Generic,
}

/// Log display track a curve is conventionally plotted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Track {
    Depth,
    Correlation,
    Resistivity,
    Porosity,
    Auxiliary,
}

/// Horizontal scale used when plotting a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    Linear,
    Logarithmic,
}

impl CurveCategory {
    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            CurveCategory::Depth => "Depth",
            CurveCategory::GammaRay => "Gamma Ray",
            CurveCategory::SpontaneousPotential => "Spontaneous Potential",
            CurveCategory::Caliper => "Caliper",
            CurveCategory::Resistivity => "Resistivity",
            CurveCategory::NeutronPorosity => "Neutron Porosity",
            CurveCategory::BulkDensity => "Bulk Density",
            CurveCategory::DensityCorrection => "Density Correction",
            CurveCategory::Photoelectric => "Photoelectric Factor",
            CurveCategory::Sonic => "Sonic",
            CurveCategory::Generic => "Generic",
        }
    }

    pub fn track(&self) -> Track {
        match self {
            CurveCategory::Depth => Track::Depth,
            CurveCategory::GammaRay
            | CurveCategory::SpontaneousPotential
            | CurveCategory::Caliper => Track::Correlation,
            CurveCategory::Resistivity => Track::Resistivity,
            CurveCategory::NeutronPorosity
            | CurveCategory::BulkDensity
            | CurveCategory::Sonic => Track::Porosity,
            CurveCategory::DensityCorrection
            | CurveCategory::Photoelectric
            | CurveCategory::Generic => Track::Auxiliary,
        }
    }

    pub fn scale(&self) -> Scale {
        match self {
            CurveCategory::Resistivity => Scale::Logarithmic,
            _ => Scale::Linear,
        }
    }

    /// Whether smoothing/despiking operators should touch this category.
    /// Depth is an index, never a signal.
    pub fn is_conditionable(&self) -> bool {
        !matches!(self, CurveCategory::Depth)
    }
}

impl fmt::Display for CurveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Per-curve statistics. Owned by the `Curve` and recomputed by
/// `LogFile::set_curve_values` whenever the values change.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CurveStatistics {
    /// Mean of the non-missing values. `None` when the curve is entirely null.
    pub mean: Option<f64>,
    /// Population standard deviation of the non-missing values.
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub present_count: usize,
    pub null_count: usize,
    /// Values further than `OUTLIER_Z_THRESHOLD` robust deviations from the median.
    pub outlier_count: usize,
    /// Percentage of rows with a value, 0-100.
    pub completeness: f64,
    /// Curve quality score, 0-100 (range validation not included).
    pub quality_score: f64,
}

impl CurveStatistics {
    /// Compute statistics over one curve's values.
    pub fn compute(values: &[Option<f64>]) -> Self {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let total = values.len();
        let null_count = total - present.len();

        let completeness = if total == 0 {
            0.0
        } else {
            present.len() as f64 / total as f64 * 100.0
        };

        if present.is_empty() {
            return Self {
                null_count,
                completeness,
                quality_score: quality_score(completeness, None, 100.0),
                ..Self::default()
            };
        }

        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let variance = present.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let outlier_count = count_robust_outliers(&present, constants::OUTLIER_Z_THRESHOLD);

        let noise = noise_level(mean, std_dev);
        Self {
            mean: Some(mean),
            std_dev: Some(std_dev),
            min: Some(min),
            max: Some(max),
            present_count: present.len(),
            null_count,
            outlier_count,
            completeness,
            quality_score: quality_score(completeness, noise, 100.0),
        }
    }

    /// Coefficient of variation in percent. `None` when undefined (no data,
    /// or a mean too close to zero for the ratio to mean anything).
    pub fn noise_level(&self) -> Option<f64> {
        match (self.mean, self.std_dev) {
            (Some(mean), Some(std_dev)) => noise_level(mean, std_dev),
            _ => None,
        }
    }
}

/// std / |mean| * 100, or `None` when |mean| is effectively zero.
pub fn noise_level(mean: f64, std_dev: f64) -> Option<f64> {
    if mean.abs() < constants::MEAN_EPSILON {
        None
    } else {
        Some(std_dev / mean.abs() * 100.0)
    }
}

/// Weighted quality score in [0, 100].
///
/// Increases with completeness, decreases with noise level and with the
/// share of range-validation failures. An undefined noise level scores as
/// the worst possible noise.
pub fn quality_score(completeness: f64, noise: Option<f64>, validation_pass_rate: f64) -> f64 {
    let noise_component = match noise {
        Some(level) => 100.0 - level.clamp(0.0, 100.0),
        None => 0.0,
    };
    let score = constants::SCORE_WEIGHT_COMPLETENESS * completeness.clamp(0.0, 100.0)
        + constants::SCORE_WEIGHT_NOISE * noise_component
        + constants::SCORE_WEIGHT_VALIDATION * validation_pass_rate.clamp(0.0, 100.0);
    score.clamp(0.0, 100.0)
}

/// Median of a slice (copies and sorts). `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Robust spread estimate around `center`: scaled median absolute deviation,
/// falling back to the scaled mean absolute deviation when the MAD is zero
/// (e.g. a flat window containing a single excursion).
pub fn robust_scale(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);
    if mad > 0.0 {
        return constants::MAD_SCALE * mad;
    }
    if deviations.is_empty() {
        return 0.0;
    }
    let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;
    constants::MEAN_AD_SCALE * mean_ad
}

fn count_robust_outliers(values: &[f64], threshold: f64) -> usize {
    let Some(center) = median(values) else {
        return 0;
    };
    let scale = robust_scale(values, center);
    if scale <= 0.0 {
        return 0;
    }
    values
        .iter()
        .filter(|v| ((*v - center) / scale).abs() > threshold)
        .count()
}

// =============================================================================
// Curves, rows, header
// =============================================================================

/// One measurement channel recorded against depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    /// Current mnemonic (canonical after standardization).
    pub mnemonic: String,
    /// Mnemonic as found in the source file, kept when standardization
    /// renamed the curve with `preserve_original` set.
    pub original_mnemonic: Option<String>,
    pub unit: String,
    pub description: String,
    pub role: CurveRole,
    pub category: CurveCategory,
    pub statistics: Option<CurveStatistics>,
}

impl Curve {
    pub fn track(&self) -> Track {
        self.category.track()
    }

    pub fn scale(&self) -> Scale {
        self.category.scale()
    }

    pub fn is_depth(&self) -> bool {
        self.role == CurveRole::Depth
    }
}

/// A single row of the data matrix.
///
/// `values` holds exactly one entry per curve, in curve-definition order;
/// index 0 is the depth curve itself. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRow {
    pub depth: f64,
    pub values: Vec<Option<f64>>,
}

/// A `MNEM.UNIT VALUE : DESCRIPTION` entry kept verbatim (parameters,
/// unrecognised well-section entries).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderItem {
    pub mnemonic: String,
    pub unit: String,
    pub value: String,
    pub description: String,
}

/// Explicit header schema. Fields are decided at parse time; nothing is
/// looked up by string key afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogHeader {
    /// LAS format version tag (e.g. "2.0").
    pub version: Option<String>,
    /// Whether data rows may span multiple physical lines.
    pub wrap: bool,
    pub null_value: f64,

    pub company: Option<String>,
    pub well_name: Option<String>,
    /// Unique well identifier.
    pub uwi: Option<String>,
    pub api: Option<String>,
    pub field: Option<String>,
    pub location: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub service_company: Option<String>,
    pub date: Option<String>,
    /// Unit of the STRT/STOP/STEP entries.
    pub depth_unit: Option<String>,

    /// Depth range and step recomputed from the data rows.
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub step: Option<f64>,

    /// Depth range and step as declared in the file.
    pub declared_start: Option<f64>,
    pub declared_stop: Option<f64>,
    pub declared_step: Option<f64>,

    /// Well-section entries outside the schema above.
    pub extra: Vec<HeaderItem>,
    /// `~P` parameter section.
    pub parameters: Vec<HeaderItem>,
    /// `~O` free text.
    pub other: String,
}

impl Default for LogHeader {
    fn default() -> Self {
        Self {
            version: None,
            wrap: false,
            null_value: constants::DEFAULT_NULL_VALUE,
            company: None,
            well_name: None,
            uwi: None,
            api: None,
            field: None,
            location: None,
            province: None,
            country: None,
            service_company: None,
            date: None,
            depth_unit: None,
            start: None,
            stop: None,
            step: None,
            declared_start: None,
            declared_stop: None,
            declared_step: None,
            extra: Vec::new(),
            parameters: Vec::new(),
            other: String::new(),
        }
    }
}

/// A single well-log measurement set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFile {
    pub filename: String,
    pub header: LogHeader,
    pub curves: Vec<Curve>,
    pub rows: Vec<DataRow>,
}

impl LogFile {
    /// Index of the first curve with the given mnemonic (case-insensitive),
    /// checking the original mnemonic as well.
    pub fn curve_index(&self, mnemonic: &str) -> Option<usize> {
        self.curves.iter().position(|c| {
            c.mnemonic.eq_ignore_ascii_case(mnemonic)
                || c
                    .original_mnemonic
                    .as_deref()
                    .is_some_and(|o| o.eq_ignore_ascii_case(mnemonic))
        })
    }

    /// Column of values for one curve, in row order.
    pub fn curve_values(&self, index: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.values.get(index).copied().flatten())
            .collect()
    }

    /// Depth value of every row, in row order.
    pub fn depths(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.depth).collect()
    }

    /// Replace one curve's values and recompute its statistics.
    ///
    /// `values` must have one entry per row; extra entries are ignored and
    /// missing trailing entries leave the existing cells untouched.
    pub fn set_curve_values(&mut self, index: usize, values: &[Option<f64>]) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            if let Some(cell) = row.values.get_mut(index) {
                *cell = *value;
            }
        }
        self.refresh_curve_statistics(index);
    }

    pub fn refresh_curve_statistics(&mut self, index: usize) {
        let values = self.curve_values(index);
        if let Some(curve) = self.curves.get_mut(index) {
            curve.statistics = Some(CurveStatistics::compute(&values));
        }
    }

    /// Recompute statistics for every curve.
    pub fn refresh_statistics(&mut self) {
        for index in 0..self.curves.len() {
            self.refresh_curve_statistics(index);
        }
    }

    /// Indices of all non-depth curves.
    pub fn measurement_indices(&self) -> Vec<usize> {
        self.curves
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_depth())
            .map(|(i, _)| i)
            .collect()
    }

    /// Approximate heap footprint of the row matrix, in bytes.
    pub fn estimated_footprint_bytes(&self) -> u64 {
        let per_row = std::mem::size_of::<DataRow>()
            + self.curves.len() * std::mem::size_of::<Option<f64>>();
        (per_row * self.rows.len()) as u64
    }
}

// =============================================================================
// Depth consistency
// =============================================================================

/// First point where the depth sampling breaks the nominal step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthViolation {
    /// Row index of the second depth of the offending pair.
    pub index: usize,
    pub depth: f64,
    pub expected_step: f64,
    pub actual_step: f64,
}

/// Outcome of a depth-consistency scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthConsistency {
    pub consistent: bool,
    /// First observed delta; `None` with fewer than two rows.
    pub nominal_step: Option<f64>,
    pub violation: Option<DepthViolation>,
}

/// Compare every consecutive depth delta against the first observed delta.
///
/// Stops at the first delta that deviates by more than
/// `DEPTH_STEP_TOLERANCE * |nominal|` (which also catches direction
/// reversals and repeated depths).
pub fn check_depth_consistency(depths: &[f64]) -> DepthConsistency {
    if depths.len() < 2 {
        return DepthConsistency {
            consistent: true,
            nominal_step: None,
            violation: None,
        };
    }

    let nominal = depths[1] - depths[0];
    if nominal == 0.0 {
        return DepthConsistency {
            consistent: false,
            nominal_step: Some(nominal),
            violation: Some(DepthViolation {
                index: 1,
                depth: depths[1],
                expected_step: nominal,
                actual_step: nominal,
            }),
        };
    }

    let tolerance = constants::DEPTH_STEP_TOLERANCE * nominal.abs();
    for i in 2..depths.len() {
        let delta = depths[i] - depths[i - 1];
        if (delta - nominal).abs() > tolerance {
            return DepthConsistency {
                consistent: false,
                nominal_step: Some(nominal),
                violation: Some(DepthViolation {
                    index: i,
                    depth: depths[i],
                    expected_step: nominal,
                    actual_step: delta,
                }),
            };
        }
    }

    DepthConsistency {
        consistent: true,
        nominal_step: Some(nominal),
        violation: None,
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Non-fatal anomalies found while parsing. Returned alongside the parsed
/// file rather than logged, so callers decide where they go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParseWarning {
    MissingHeaderField { field: &'static str },
    MissingDataSection,
    UnknownSection { marker: String, line_number: usize },
    MalformedLine { section: char, line_number: usize, text: String },
    InvalidHeaderNumber { field: &'static str, text: String },
    DuplicateMnemonic { mnemonic: String },
    ShortRow { line_number: usize, expected: usize, found: usize },
    ExtraTokens { line_number: usize, expected: usize, found: usize },
    InvalidDepth { line_number: usize, token: String },
    InvalidNumber { line_number: usize, curve: String, token: String },
    TrailingWrappedTokens { count: usize },
    InvalidEncoding,
    DeclaredDepthMismatch { field: &'static str, declared: f64, observed: f64 },
    DepthInconsistent { index: usize, depth: f64, expected_step: f64, actual_step: f64 },
    WarningsSuppressed { count: usize },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeaderField { field } => {
                write!(f, "well section has no {field} entry")
            }
            Self::MissingDataSection => write!(f, "file has no ~A data section"),
            Self::UnknownSection {
                marker,
                line_number,
            } => write!(f, "line {line_number}: unknown section '{marker}' ignored"),
            Self::MalformedLine {
                section,
                line_number,
                text,
            } => write!(f, "line {line_number}: malformed ~{section} line '{text}'"),
            Self::InvalidHeaderNumber { field, text } => {
                write!(f, "{field} value '{text}' is not a number")
            }
            Self::DuplicateMnemonic { mnemonic } => {
                write!(f, "curve mnemonic '{mnemonic}' is defined more than once")
            }
            Self::ShortRow {
                line_number,
                expected,
                found,
            } => write!(
                f,
                "line {line_number}: row has {found} values, expected {expected}; row dropped"
            ),
            Self::ExtraTokens {
                line_number,
                expected,
                found,
            } => write!(
                f,
                "line {line_number}: row has {found} values, expected {expected}; extra values ignored"
            ),
            Self::InvalidDepth { line_number, token } => {
                write!(f, "line {line_number}: depth '{token}' is not usable; row dropped")
            }
            Self::InvalidNumber {
                line_number,
                curve,
                token,
            } => write!(
                f,
                "line {line_number}: {curve} value '{token}' is not numeric; treated as missing"
            ),
            Self::TrailingWrappedTokens { count } => {
                write!(f, "{count} trailing values do not form a complete row; dropped")
            }
            Self::InvalidEncoding => {
                write!(f, "input is not valid UTF-8; invalid bytes were replaced")
            }
            Self::DeclaredDepthMismatch {
                field,
                declared,
                observed,
            } => write!(
                f,
                "declared {field} {declared} differs from observed {observed}; observed value used"
            ),
            Self::DepthInconsistent {
                index,
                depth,
                expected_step,
                actual_step,
            } => write!(
                f,
                "row {index} (depth {depth}): step {actual_step} deviates from nominal {expected_step}"
            ),
            Self::WarningsSuppressed { count } => {
                write!(f, "{count} further warnings suppressed")
            }
        }
    }
}

/// Non-fatal findings of the QC engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValidationWarning {
    OutOfRange {
        curve: String,
        value: f64,
        depth: f64,
        min: f64,
        max: f64,
    },
    DepthInconsistent {
        index: usize,
        depth: f64,
        expected_step: f64,
        actual_step: f64,
    },
    LowCompleteness {
        curve: String,
        completeness: f64,
    },
    UndefinedNoise {
        curve: String,
    },
    CrossCurveMismatch {
        depth: f64,
        density_porosity: f64,
        neutron_porosity: f64,
    },
    WarningsSuppressed {
        count: usize,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                curve,
                value,
                depth,
                min,
                max,
            } => write!(
                f,
                "{curve} value {value} at depth {depth} is outside the physical range [{min}, {max}]"
            ),
            Self::DepthInconsistent {
                index,
                depth,
                expected_step,
                actual_step,
            } => write!(
                f,
                "depth step {actual_step} at row {index} (depth {depth}) deviates from nominal step {expected_step}"
            ),
            Self::LowCompleteness {
                curve,
                completeness,
            } => write!(f, "{curve} is only {completeness:.1}% complete"),
            Self::UndefinedNoise { curve } => write!(
                f,
                "{curve} has a mean of ~0; noise level is undefined"
            ),
            Self::CrossCurveMismatch {
                depth,
                density_porosity,
                neutron_porosity,
            } => write!(
                f,
                "at depth {depth} density porosity {density_porosity:.3} and neutron porosity \
                 {neutron_porosity:.3} disagree"
            ),
            Self::WarningsSuppressed { count } => {
                write!(f, "{count} further warnings suppressed")
            }
        }
    }
}
