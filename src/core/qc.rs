// WellSleuth - core/qc.rs
//
// Quality-control engine. Produces a fresh, immutable `QcResult` for a
// `LogFile`: completeness, noise, depth consistency, physical-range and
// cross-curve validation, per-curve and overall scores, recommendations.
//
// Findings never fail: everything is reported through the result.

use crate::core::mnemonic::{self, StandardizationResult};
use crate::core::model::{
    check_depth_consistency, quality_score, CurveCategory, CurveStatistics, DepthConsistency,
    LogFile, ValidationWarning,
};
use crate::util::constants;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive physical bounds for one curve type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalRange {
    pub min: f64,
    pub max: f64,
}

impl PhysicalRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Built-in ranges keyed by API mnemonic.
pub fn default_ranges() -> BTreeMap<String, PhysicalRange> {
    [
        ("GR", PhysicalRange::new(0.0, 500.0)),
        ("SP", PhysicalRange::new(-200.0, 200.0)),
        ("CALI", PhysicalRange::new(2.0, 36.0)),
        ("NPHI", PhysicalRange::new(-0.15, 1.0)),
        ("RHOB", PhysicalRange::new(1.0, 3.5)),
        ("DRHO", PhysicalRange::new(-1.0, 1.0)),
        ("PEF", PhysicalRange::new(0.0, 20.0)),
        ("DT", PhysicalRange::new(40.0, 240.0)),
        ("RT", PhysicalRange::new(0.01, 100_000.0)),
        ("RM", PhysicalRange::new(0.01, 100_000.0)),
        ("RS", PhysicalRange::new(0.01, 100_000.0)),
        ("RXO", PhysicalRange::new(0.01, 100_000.0)),
    ]
    .into_iter()
    .map(|(k, r)| (k.to_string(), r))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// When false only statistics and scores are computed.
    pub enabled: bool,
    /// Physical ranges keyed by mnemonic. Any alias of a known curve works
    /// as a key and is resolved to the canonical curve.
    pub ranges: BTreeMap<String, PhysicalRange>,
    /// Compare density-derived porosity with neutron porosity.
    pub cross_validation: bool,
    /// Count robust outliers per curve into `spikes_detected`.
    pub flag_outliers: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ranges: default_ranges(),
            cross_validation: true,
            flag_outliers: true,
        }
    }
}

impl ValidationOptions {
    /// Range table re-keyed by canonical API mnemonic. Entries keyed by a
    /// vendor alias are applied last and win over the canonical entry.
    fn resolved_ranges(&self) -> BTreeMap<String, PhysicalRange> {
        let (canonical, aliased): (Vec<_>, Vec<_>) = self
            .ranges
            .iter()
            .map(|(k, r)| (k.trim().to_ascii_uppercase(), mnemonic::range_key(k), *r))
            .partition(|(raw, key, _)| raw == key);
        canonical
            .into_iter()
            .chain(aliased)
            .map(|(_, key, r)| (key, r))
            .collect()
    }
}

// =============================================================================
// Result types
// =============================================================================

/// Per-curve detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveQuality {
    pub mnemonic: String,
    pub category: CurveCategory,
    pub completeness: f64,
    /// `None` when the mean is ~0 (or the curve is empty).
    pub noise_level: Option<f64>,
    pub outliers: usize,
    pub range: Option<PhysicalRange>,
    pub range_checked: usize,
    pub range_failures: usize,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhysicalValidation {
    pub checked: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrossValidation {
    /// Rows where both bulk density and neutron porosity were present.
    pub compared: usize,
    pub mismatches: usize,
}

/// Outcome of one QC pass. Produced fresh per phase, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcResult {
    /// Cells across all measurement curves.
    pub total_points: usize,
    pub null_points: usize,
    pub spikes_detected: usize,
    /// Mean of the defined per-curve noise levels, in percent.
    pub noise_level: Option<f64>,
    pub depth_consistent: bool,
    pub depth: DepthConsistency,
    /// Keyed by mnemonic; a repeated mnemonic gets its column index appended.
    pub curve_quality: BTreeMap<String, CurveQuality>,
    pub standardization: Option<StandardizationResult>,
    pub physical_validation: PhysicalValidation,
    pub cross_validation: Option<CrossValidation>,
    pub warnings: Vec<ValidationWarning>,
    pub overall_score: f64,
    pub recommendations: Vec<String>,
}

impl QcResult {
    /// Whether the score clears the conditioning gate.
    pub fn passes_gate(&self) -> bool {
        self.overall_score > constants::QUALITY_GATE_MIN_SCORE
    }
}

/// Bounded warning list; counts elsewhere are never capped.
struct WarningSink {
    warnings: Vec<ValidationWarning>,
    suppressed: usize,
}

impl WarningSink {
    fn new() -> Self {
        Self {
            warnings: Vec::new(),
            suppressed: 0,
        }
    }

    fn push(&mut self, warning: ValidationWarning) {
        if self.warnings.len() < constants::MAX_VALIDATION_WARNINGS {
            self.warnings.push(warning);
        } else {
            self.suppressed += 1;
        }
    }

    fn finish(mut self) -> Vec<ValidationWarning> {
        if self.suppressed > 0 {
            self.warnings.push(ValidationWarning::WarningsSuppressed {
                count: self.suppressed,
            });
        }
        self.warnings
    }
}

// =============================================================================
// Assessment
// =============================================================================

/// Assess a file. Never fails and never mutates the file.
pub fn assess(file: &LogFile, options: &ValidationOptions) -> QcResult {
    let mut sink = WarningSink::new();
    let ranges = if options.enabled {
        options.resolved_ranges()
    } else {
        BTreeMap::new()
    };

    let depths = file.depths();
    let depth = check_depth_consistency(&depths);
    if let Some(v) = &depth.violation {
        sink.push(ValidationWarning::DepthInconsistent {
            index: v.index,
            depth: v.depth,
            expected_step: v.expected_step,
            actual_step: v.actual_step,
        });
    }

    let mut curve_quality = BTreeMap::new();
    let mut physical = PhysicalValidation::default();
    let mut total_points = 0;
    let mut null_points = 0;
    let mut spikes_detected = 0;
    let mut noise_levels = Vec::new();
    let mut scores = Vec::new();

    for index in file.measurement_indices() {
        let curve = &file.curves[index];
        let values = file.curve_values(index);
        let stats = curve
            .statistics
            .clone()
            .unwrap_or_else(|| CurveStatistics::compute(&values));

        total_points += values.len();
        null_points += stats.null_count;

        let range = lookup_range(&ranges, &curve.mnemonic, curve.original_mnemonic.as_deref());
        let mut checked = 0;
        let mut failures = 0;
        if let Some(range) = range {
            for (value, depth) in values.iter().zip(&depths) {
                let Some(value) = value else { continue };
                checked += 1;
                if !range.contains(*value) {
                    failures += 1;
                    sink.push(ValidationWarning::OutOfRange {
                        curve: curve.mnemonic.clone(),
                        value: *value,
                        depth: *depth,
                        min: range.min,
                        max: range.max,
                    });
                }
            }
        }
        physical.checked += checked;
        physical.failed += failures;
        physical.passed += checked - failures;

        let pass_rate = if checked > 0 {
            (checked - failures) as f64 / checked as f64 * 100.0
        } else {
            100.0
        };
        let noise = stats.noise_level();
        let score = quality_score(stats.completeness, noise, pass_rate);

        if stats.present_count > 0 && noise.is_none() {
            sink.push(ValidationWarning::UndefinedNoise {
                curve: curve.mnemonic.clone(),
            });
        }
        if !values.is_empty() && stats.completeness < constants::LOW_COMPLETENESS_THRESHOLD {
            sink.push(ValidationWarning::LowCompleteness {
                curve: curve.mnemonic.clone(),
                completeness: stats.completeness,
            });
        }

        let outliers = if options.enabled && options.flag_outliers {
            stats.outlier_count
        } else {
            0
        };
        spikes_detected += outliers;
        noise_levels.extend(noise);
        scores.push(score);

        let key = if curve_quality.contains_key(&curve.mnemonic) {
            format!("{}#{index}", curve.mnemonic)
        } else {
            curve.mnemonic.clone()
        };
        curve_quality.insert(
            key,
            CurveQuality {
                mnemonic: curve.mnemonic.clone(),
                category: curve.category,
                completeness: stats.completeness,
                noise_level: noise,
                outliers,
                range,
                range_checked: checked,
                range_failures: failures,
                quality_score: score,
            },
        );
    }

    let cross_validation = (options.enabled && options.cross_validation)
        .then(|| cross_validate(file, &mut sink))
        .flatten();

    let noise_level = if noise_levels.is_empty() {
        None
    } else {
        Some(noise_levels.iter().sum::<f64>() / noise_levels.len() as f64)
    };

    let overall_score = overall_score(&scores, file.rows.is_empty(), depth.consistent);

    let mut result = QcResult {
        total_points,
        null_points,
        spikes_detected,
        noise_level,
        depth_consistent: depth.consistent,
        depth,
        curve_quality,
        standardization: None,
        physical_validation: physical,
        cross_validation,
        warnings: sink.finish(),
        overall_score,
        recommendations: Vec::new(),
    };
    result.recommendations = recommendations(&result);

    tracing::debug!(
        file = %file.filename,
        score = result.overall_score,
        range_failures = result.physical_validation.failed,
        spikes = result.spikes_detected,
        "QC assessment complete"
    );
    result
}

/// Same as `assess`, carrying a standardization summary into the result.
pub fn assess_with_standardization(
    file: &LogFile,
    options: &ValidationOptions,
    standardization: Option<StandardizationResult>,
) -> QcResult {
    let mut result = assess(file, options);
    result.standardization = standardization;
    result
}

fn lookup_range(
    ranges: &BTreeMap<String, PhysicalRange>,
    mnemonic: &str,
    original: Option<&str>,
) -> Option<PhysicalRange> {
    ranges
        .get(&mnemonic::range_key(mnemonic))
        .or_else(|| original.and_then(|o| ranges.get(&mnemonic::range_key(o))))
        .copied()
}

/// Mean measurement-curve score, penalised for irregular depth sampling.
/// A file without rows or measurement curves scores 0.
fn overall_score(curve_scores: &[f64], no_rows: bool, depth_consistent: bool) -> f64 {
    if no_rows || curve_scores.is_empty() {
        return 0.0;
    }
    let mean = curve_scores.iter().sum::<f64>() / curve_scores.len() as f64;
    let penalty = if depth_consistent {
        0.0
    } else {
        constants::DEPTH_INCONSISTENCY_PENALTY
    };
    (mean - penalty).clamp(0.0, 100.0)
}

/// Density porosity from RHOB against NPHI, row by row. `None` when either
/// curve is absent.
fn cross_validate(file: &LogFile, sink: &mut WarningSink) -> Option<CrossValidation> {
    let find = |key: &str| {
        file.measurement_indices().into_iter().find(|&i| {
            let c = &file.curves[i];
            mnemonic::range_key(&c.mnemonic) == key
                || c
                    .original_mnemonic
                    .as_deref()
                    .is_some_and(|o| mnemonic::range_key(o) == key)
        })
    };
    let rhob = find("RHOB")?;
    let nphi = find("NPHI")?;

    // Neutron porosity logged in porosity units rather than a fraction.
    let unit = file.curves[nphi].unit.to_ascii_uppercase();
    let nphi_scale = if unit.contains('%') || unit == "PU" { 0.01 } else { 1.0 };

    let span = constants::MATRIX_DENSITY - constants::FLUID_DENSITY;
    let mut outcome = CrossValidation::default();
    for row in &file.rows {
        let (Some(Some(rho)), Some(Some(phi_n))) = (row.values.get(rhob), row.values.get(nphi)) else {
            continue;
        };
        outcome.compared += 1;
        let phi_d = (constants::MATRIX_DENSITY - rho) / span;
        let phi_n = phi_n * nphi_scale;
        if (phi_d - phi_n).abs() > constants::MAX_POROSITY_SEPARATION {
            outcome.mismatches += 1;
            sink.push(ValidationWarning::CrossCurveMismatch {
                depth: row.depth,
                density_porosity: phi_d,
                neutron_porosity: phi_n,
            });
        }
    }
    Some(outcome)
}

fn recommendations(qc: &QcResult) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(noise) = qc.noise_level {
        if noise > constants::NOISE_RECOMMEND_THRESHOLD {
            out.push(format!(
                "Noise level {noise:.1}% exceeds {:.0}%: apply denoising",
                constants::NOISE_RECOMMEND_THRESHOLD
            ));
        }
    }
    if !qc.depth_consistent {
        out.push("Depth sampling is irregular: review depth alignment".to_string());
    }
    if qc.overall_score < constants::REVIEW_SCORE_THRESHOLD {
        out.push(format!(
            "Overall quality score {:.0} is below {:.0}: review the data source",
            qc.overall_score,
            constants::REVIEW_SCORE_THRESHOLD
        ));
    }
    for cq in qc.curve_quality.values() {
        if cq.completeness < constants::LOW_COMPLETENESS_THRESHOLD {
            out.push(format!(
                "{} is only {:.1}% complete: check for acquisition gaps",
                cq.mnemonic, cq.completeness
            ));
        }
    }
    if qc.physical_validation.failed > 0 {
        out.push(format!(
            "{} values fall outside physical ranges: verify tool calibration and units",
            qc.physical_validation.failed
        ));
    }
    if qc.spikes_detected > 0 {
        out.push(format!(
            "{} outliers detected: consider despiking",
            qc.spikes_detected
        ));
    }
    if let Some(cross) = &qc.cross_validation {
        if cross.mismatches > 0 {
            out.push(format!(
                "Density and neutron porosity disagree at {} depths: check matrix assumptions or gas effects",
                cross.mismatches
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Curve, CurveRole, DataRow, LogHeader};

    fn curve(mnemonic: &str, role: CurveRole) -> Curve {
        Curve {
            mnemonic: mnemonic.to_string(),
            original_mnemonic: None,
            unit: String::new(),
            description: String::new(),
            role,
            category: mnemonic::classify(mnemonic),
            statistics: None,
        }
    }

    /// Rows at 0.5 spacing from 1000; `columns[c][r]` is curve `c + 1`.
    fn make_file(names: &[&str], columns: &[Vec<Option<f64>>]) -> LogFile {
        let mut curves = vec![curve("DEPT", CurveRole::Depth)];
        curves.extend(names.iter().map(|n| curve(n, CurveRole::Measurement)));
        let n_rows = columns.first().map_or(0, Vec::len);
        let rows = (0..n_rows)
            .map(|r| {
                let depth = 1000.0 + r as f64 * 0.5;
                let mut values = vec![Some(depth)];
                values.extend(columns.iter().map(|c| c[r]));
                DataRow { depth, values }
            })
            .collect();
        let mut file = LogFile {
            filename: "qc.las".to_string(),
            header: LogHeader::default(),
            curves,
            rows,
        };
        file.refresh_statistics();
        file
    }

    #[test]
    fn test_single_range_failure_names_curve_value_depth() {
        let nphi: Vec<Option<f64>> = (0..10)
            .map(|i| Some(if i == 4 { 1.5 } else { 0.25 }))
            .collect();
        let file = make_file(&["NPHI"], &[nphi]);
        let qc = assess(&file, &ValidationOptions::default());

        assert_eq!(qc.physical_validation.failed, 1);
        assert_eq!(qc.physical_validation.passed, 9);
        let failures: Vec<_> = qc
            .warnings
            .iter()
            .filter(|w| matches!(w, ValidationWarning::OutOfRange { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0],
            &ValidationWarning::OutOfRange {
                curve: "NPHI".to_string(),
                value: 1.5,
                depth: 1002.0,
                min: -0.15,
                max: 1.0,
            }
        );
        let text = failures[0].to_string();
        assert!(text.contains("NPHI") && text.contains("1.5") && text.contains("1002"));
    }

    #[test]
    fn test_vendor_alias_uses_canonical_range() {
        let rhob: Vec<Option<f64>> = (0..8).map(|i| Some(if i == 2 { 5.0 } else { 2.4 })).collect();
        let file = make_file(&["RHOZ"], &[rhob]);
        let qc = assess(&file, &ValidationOptions::default());
        assert_eq!(qc.physical_validation.failed, 1);
    }

    #[test]
    fn test_configured_range_keyed_by_alias() {
        let gr: Vec<Option<f64>> = (0..8).map(|_| Some(80.0)).collect();
        let file = make_file(&["GR"], &[gr]);
        let mut options = ValidationOptions::default();
        options.ranges.insert("GAM".to_string(), PhysicalRange::new(0.0, 50.0));
        let qc = assess(&file, &options);
        assert_eq!(qc.physical_validation.failed, 8);
    }

    #[test]
    fn test_clean_file_scores_high() {
        let gr: Vec<Option<f64>> = (0..20).map(|i| Some(60.0 + (i % 3) as f64)).collect();
        let file = make_file(&["GR"], &[gr]);
        let qc = assess(&file, &ValidationOptions::default());
        assert!(qc.overall_score > 90.0, "{}", qc.overall_score);
        assert!(qc.depth_consistent);
        assert!(qc.passes_gate());
        assert!(qc.recommendations.is_empty(), "{:?}", qc.recommendations);
    }

    #[test]
    fn test_score_penalised_by_nulls_noise_and_failures() {
        let clean: Vec<Option<f64>> = (0..20).map(|i| Some(60.0 + (i % 3) as f64)).collect();
        let base = assess(&make_file(&["GR"], &[clean.clone()]), &ValidationOptions::default());

        let mut gappy = clean.clone();
        for v in gappy.iter_mut().take(8) {
            *v = None;
        }
        let gaps = assess(&make_file(&["GR"], &[gappy]), &ValidationOptions::default());
        assert!(gaps.overall_score < base.overall_score);

        let mut bad = clean;
        bad[3] = Some(900.0);
        let failing = assess(&make_file(&["GR"], &[bad]), &ValidationOptions::default());
        assert!(failing.overall_score < base.overall_score);
    }

    #[test]
    fn test_depth_inconsistency_penalty_and_recommendation() {
        let gr: Vec<Option<f64>> = (0..10).map(|_| Some(60.0)).collect();
        let mut file = make_file(&["GR"], &[gr]);
        file.rows[6].depth += 0.3;
        let qc = assess(&file, &ValidationOptions::default());
        assert!(!qc.depth_consistent);
        assert!(qc
            .recommendations
            .iter()
            .any(|r| r.contains("depth alignment")));
        assert!(qc.overall_score <= 100.0 - constants::DEPTH_INCONSISTENCY_PENALTY);
    }

    #[test]
    fn test_zero_mean_noise_is_flagged_not_propagated() {
        let sp: Vec<Option<f64>> = (0..10).map(|i| Some(if i % 2 == 0 { 5.0 } else { -5.0 })).collect();
        let file = make_file(&["SP"], &[sp]);
        let qc = assess(&file, &ValidationOptions::default());
        assert_eq!(qc.curve_quality["SP"].noise_level, None);
        assert!(qc
            .warnings
            .contains(&ValidationWarning::UndefinedNoise { curve: "SP".to_string() }));
        assert!(qc.overall_score.is_finite());
    }

    #[test]
    fn test_high_noise_recommends_denoise() {
        let gr: Vec<Option<f64>> = (0..20).map(|i| Some(if i % 2 == 0 { 20.0 } else { 80.0 })).collect();
        let qc = assess(&make_file(&["GR"], &[gr]), &ValidationOptions::default());
        assert!(qc.noise_level.unwrap() > 20.0);
        assert!(qc.recommendations.iter().any(|r| r.contains("denoising")));
    }

    #[test]
    fn test_cross_validation_counts_mismatches() {
        // RHOB 2.32 -> density porosity 0.2.
        let rhob: Vec<Option<f64>> = (0..6).map(|_| Some(2.32)).collect();
        let mut nphi: Vec<Option<f64>> = (0..6).map(|_| Some(0.22)).collect();
        nphi[2] = Some(0.6);
        nphi[4] = None;
        let file = make_file(&["RHOB", "NPHI"], &[rhob, nphi]);
        let qc = assess(&file, &ValidationOptions::default());
        let cross = qc.cross_validation.unwrap();
        assert_eq!(cross.compared, 5);
        assert_eq!(cross.mismatches, 1);
    }

    #[test]
    fn test_cross_validation_absent_without_both_curves() {
        let gr: Vec<Option<f64>> = (0..6).map(|_| Some(60.0)).collect();
        let qc = assess(&make_file(&["GR"], &[gr]), &ValidationOptions::default());
        assert_eq!(qc.cross_validation, None);
    }

    #[test]
    fn test_outlier_flagging_toggle() {
        let mut gr: Vec<Option<f64>> = (0..20).map(|i| Some(50.0 + (i % 3) as f64)).collect();
        gr[7] = Some(400.0);
        let file = make_file(&["GR"], &[gr]);
        assert_eq!(assess(&file, &ValidationOptions::default()).spikes_detected, 1);
        let off = ValidationOptions {
            flag_outliers: false,
            ..ValidationOptions::default()
        };
        assert_eq!(assess(&file, &off).spikes_detected, 0);
    }

    #[test]
    fn test_empty_file_scores_zero() {
        let file = make_file(&["GR"], &[Vec::new()]);
        let qc = assess(&file, &ValidationOptions::default());
        assert_eq!(qc.overall_score, 0.0);
        assert_eq!(qc.total_points, 0);
    }

    #[test]
    fn test_null_points_counted() {
        let gr = vec![Some(1.0), None, Some(2.0), None];
        let nphi = vec![Some(0.2), Some(0.2), None, Some(0.2)];
        let qc = assess(&make_file(&["GR", "NPHI"], &[gr, nphi]), &ValidationOptions::default());
        assert_eq!(qc.total_points, 8);
        assert_eq!(qc.null_points, 3);
    }

    #[test]
    fn test_duplicate_mnemonics_both_reported() {
        let a: Vec<Option<f64>> = (0..5).map(|_| Some(60.0)).collect();
        let qc = assess(&make_file(&["GR", "GR"], &[a.clone(), a]), &ValidationOptions::default());
        assert_eq!(qc.curve_quality.len(), 2);
        assert!(qc.curve_quality.contains_key("GR#2"));
    }
}
