// WellSleuth - tests/e2e_pipeline.rs
//
// End-to-end tests for discovery, parsing, QC and conditioning.
//
// These tests exercise real LAS fixtures on disk, real walkdir traversal,
// the rayon batch runner and the exporters, with no mocks.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use wellsleuth::app::batch::{run_batch, BatchConfig, BatchOutcome, OutcomeStatus};
use wellsleuth::app::report::{write_outputs, OutputFormat};
use wellsleuth::core::discovery::{collect_inputs, discover_files, DiscoveryConfig};
use wellsleuth::core::parser::{self, ParseOptions};
use wellsleuth::core::pipeline::{self, PipelineResult, PipelineStep, ProcessingOptions};
use wellsleuth::platform::config::load_config;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to the on-disk fixture files.
fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn run_fixture(name: &str, options: &ProcessingOptions) -> PipelineResult {
    let bytes = fs::read(fixture(name)).expect("read fixture");
    pipeline::run(&bytes, name, options)
}

fn steps(result: &PipelineResult) -> Vec<PipelineStep> {
    result.history.iter().map(|h| h.step).collect()
}

fn batch(files: &[PathBuf]) -> Vec<BatchOutcome> {
    run_batch(
        files,
        Arc::new(ProcessingOptions::default()),
        BatchConfig {
            jobs: 2,
            timeout: None,
        },
    )
}

// =============================================================================
// Discovery E2E
// =============================================================================

/// Discovering the fixtures directory finds every .las fixture, sorted.
#[test]
fn e2e_discovers_fixture_las_files() {
    let found = discover_files(&fixtures_dir(), &DiscoveryConfig::default()).unwrap();
    assert!(found.warnings.is_empty(), "unexpected warnings: {:?}", found.warnings);

    let names: Vec<String> = found
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "clean_well.las",
            "poor_quality.las",
            "vendor_mnemonics.las",
            "wrapped.las"
        ]
    );
}

/// Discovery on a nonexistent path returns RootNotFound.
#[test]
fn e2e_nonexistent_root_returns_error() {
    use wellsleuth::util::error::DiscoveryError;
    let result = discover_files(
        &PathBuf::from("/nonexistent/wellsleuth-e2e-test-path"),
        &DiscoveryConfig::default(),
    );
    assert!(
        matches!(result, Err(DiscoveryError::RootNotFound { .. })),
        "expected RootNotFound, got {result:?}"
    );
}

/// Explicit file arguments bypass the include patterns.
#[test]
fn e2e_collect_inputs_mixes_files_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    let odd_name = dir.path().join("well.dat");
    fs::copy(fixture("clean_well.las"), &odd_name).unwrap();

    let inputs = collect_inputs(
        &[odd_name.clone(), fixtures_dir()],
        &DiscoveryConfig::default(),
    );
    assert_eq!(inputs.files.len(), 5);
    assert_eq!(inputs.files[0].path, odd_name);
}

// =============================================================================
// Pipeline E2E
// =============================================================================

/// A clean file passes the gate, is conditioned, and loses its spike while
/// keeping its missing cell missing.
#[test]
fn e2e_clean_well_is_conditioned() {
    let result = run_fixture("clean_well.las", &ProcessingOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.conditioned);
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Parse,
            PipelineStep::Standardize,
            PipelineStep::ValidatePre,
            PipelineStep::QualityGate,
            PipelineStep::Denoise,
            PipelineStep::Despike,
            PipelineStep::ValidatePost,
        ]
    );

    let pre = result.pre_qc.as_ref().unwrap();
    assert!(pre.passes_gate(), "score {}", pre.overall_score);
    assert!(pre.spikes_detected >= 1);
    assert!(pre.depth_consistent);
    assert_eq!(pre.physical_validation.failed, 0);
    let cross = pre.cross_validation.as_ref().unwrap();
    assert_eq!(cross.compared, 20);
    assert_eq!(cross.mismatches, 0);

    assert!(result.spikes_replaced >= 1);
    let file = result.file.as_ref().unwrap();
    let gr = file.curve_index("GR").unwrap();
    let rhob = file.curve_index("RHOB").unwrap();
    let spike_row = &file.rows[10];
    let replaced = spike_row.values[gr].unwrap();
    assert!(replaced < 100.0, "spike not replaced: {replaced}");
    assert_eq!(file.rows[5].values[rhob], None);
    assert_eq!(file.rows.len(), 21);

    let post = result.post_qc.as_ref().unwrap();
    assert!(post.overall_score >= pre.overall_score);
}

/// Vendor mnemonics are mapped to API names with the originals kept, and
/// range checks and cross-validation see through the renames.
#[test]
fn e2e_vendor_mnemonics_are_standardized() {
    let result = run_fixture("vendor_mnemonics.las", &ProcessingOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);

    let file = result.file.as_ref().unwrap();
    let names: Vec<&str> = file.curves.iter().map(|c| c.mnemonic.as_str()).collect();
    assert_eq!(names, vec!["DEPT", "GR", "RT", "RHOB", "NPHI"]);
    let originals: Vec<Option<&str>> = file
        .curves
        .iter()
        .map(|c| c.original_mnemonic.as_deref())
        .collect();
    assert_eq!(
        originals,
        vec![Some("DEPTH"), Some("GAM"), Some("ILD"), Some("DEN"), Some("CNPOR")]
    );

    let pre = result.pre_qc.as_ref().unwrap();
    let summary = pre.standardization.as_ref().unwrap();
    assert_eq!(summary.renamed.len(), 5);
    assert!(summary.conflicts.is_empty());
    assert_eq!(pre.curve_quality["GR"].range_checked, 10);
    assert_eq!(pre.cross_validation.as_ref().unwrap().compared, 10);
    assert_eq!(file.header.api.as_deref(), Some("42-501-20130"));
}

/// Wrapped data is reassembled into one row per depth step.
#[test]
fn e2e_wrapped_file_parses() {
    let bytes = fs::read(fixture("wrapped.las")).unwrap();
    let parsed = parser::parse(&bytes, "wrapped.las", &ParseOptions::default()).unwrap();
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);

    let file = parsed.file;
    assert!(file.header.wrap);
    assert_eq!(file.curves.len(), 5);
    assert_eq!(file.rows.len(), 5);
    assert_eq!(file.rows[2].depth, 250.5);
    assert_eq!(file.rows[2].values[1], None);
    assert_eq!(file.rows[4].values[4], Some(0.13));
    assert_eq!(file.header.step, Some(0.25));
}

/// A curve too short for the denoise window is skipped with a warning; the
/// run still succeeds.
#[test]
fn e2e_short_curve_is_skipped_not_fatal() {
    let result = run_fixture("wrapped.las", &ProcessingOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.conditioned);
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.starts_with("denoise: GR skipped")),
        "warnings: {:?}",
        result.warnings
    );
}

/// A low-quality file is reported but never conditioned.
#[test]
fn e2e_poor_quality_skips_conditioning() {
    let result = run_fixture("poor_quality.las", &ProcessingOptions::default());
    assert!(result.success);
    assert!(!result.conditioned);

    let pre = result.pre_qc.as_ref().unwrap();
    assert!(!pre.passes_gate(), "score {}", pre.overall_score);
    assert_eq!(pre.physical_validation.failed, 3);
    assert!(!pre.recommendations.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("conditioning skipped")));
    assert!(!steps(&result).contains(&PipelineStep::Denoise));

    let file = result.file.as_ref().unwrap();
    let gr = file.curve_index("GR").unwrap();
    assert_eq!(file.rows[0].values[gr], Some(-20.0));
}

// =============================================================================
// Batch and export E2E
// =============================================================================

/// A batch over the fixtures directory yields one outcome per file and the
/// written LAS re-parses cleanly.
#[test]
fn e2e_batch_writes_reparseable_las() {
    let files: Vec<PathBuf> = discover_files(&fixtures_dir(), &DiscoveryConfig::default())
        .unwrap()
        .files
        .into_iter()
        .map(|f| f.path)
        .collect();
    let outcomes = batch(&files);
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Completed));

    let out = tempfile::tempdir().unwrap();
    let written = write_outputs(&outcomes, out.path(), OutputFormat::Las).unwrap();
    assert_eq!(written.data_files.len(), 4);

    let bytes = fs::read(out.path().join("vendor_mnemonics.las")).unwrap();
    let back = parser::parse(&bytes, "vendor_mnemonics.las", &ParseOptions::default()).unwrap();
    let names: Vec<&str> = back.file.curves.iter().map(|c| c.mnemonic.as_str()).collect();
    assert_eq!(names, vec!["DEPT", "GR", "RT", "RHOB", "NPHI"]);
    assert_eq!(back.file.rows.len(), 10);

    let conditioned = outcomes
        .iter()
        .find(|o| o.filename == "vendor_mnemonics.las")
        .and_then(|o| o.result.as_ref())
        .and_then(|r| r.file.as_ref())
        .unwrap();
    for (written_row, row) in back.file.rows.iter().zip(&conditioned.rows) {
        assert_eq!(written_row.depth, row.depth);
        assert_eq!(written_row.values, row.values);
    }

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(out.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(report.as_array().unwrap().len(), 4);
}

/// CSV export keeps one column per curve and leaves missing cells empty.
#[test]
fn e2e_batch_writes_csv() {
    let outcomes = batch(&[fixture("poor_quality.las")]);
    let out = tempfile::tempdir().unwrap();
    write_outputs(&outcomes, out.path(), OutputFormat::Csv).unwrap();

    let csv = fs::read_to_string(out.path().join("poor_quality.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("DEPT,GR"));
    assert_eq!(lines.next(), Some("800,-20"));
    assert_eq!(lines.next(), Some("800.5,"));
}

/// Settings from config.toml flow through to the run.
#[test]
fn e2e_config_file_drives_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[despike]\nenabled = false\n\n[baseline]\nenabled = true\nmethod = \"linear\"\n",
    )
    .unwrap();

    let (config, warnings) = load_config(&path);
    assert!(warnings.is_empty(), "{warnings:?}");

    let result = run_fixture("clean_well.las", &config.processing);
    assert!(result.success, "errors: {:?}", result.errors);
    let s = steps(&result);
    assert!(!s.contains(&PipelineStep::Despike));
    assert!(s.contains(&PipelineStep::BaselineCorrection));
    assert_eq!(result.spikes_replaced, 0);
}
