// WellSleuth - app/report.rs
//
// Writes batch outcomes: a JSON summary of every run, plus conditioned data
// and a per-file report when an output directory is given.

use crate::app::batch::{BatchOutcome, OutcomeStatus};
use crate::core::export::{self, RunReport};
use crate::util::error::{ExportError, WellSleuthError};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Data format written next to each per-file report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Conditioned LAS 2.0.
    #[default]
    Las,
    /// Data matrix as CSV.
    Csv,
    /// Reports only; no data file.
    Json,
}

impl OutputFormat {
    fn extension(self) -> Option<&'static str> {
        match self {
            Self::Las => Some("las"),
            Self::Csv => Some("csv"),
            Self::Json => None,
        }
    }
}

/// One entry of the batch summary. Failed reads and timeouts carry only
/// the status and error.
#[derive(Debug, Serialize)]
pub struct OutcomeReport<'a> {
    pub path: String,
    pub status: OutcomeStatus,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(flatten)]
    pub run: Option<RunReport<'a>>,
}

impl<'a> From<&'a BatchOutcome> for OutcomeReport<'a> {
    fn from(o: &'a BatchOutcome) -> Self {
        Self {
            path: o.path.display().to_string(),
            status: o.status,
            elapsed_ms: o.elapsed.as_millis() as u64,
            error: o.error.as_deref(),
            run: o.result.as_ref().map(RunReport::from),
        }
    }
}

/// Write the batch summary as a pretty-printed JSON array.
pub fn write_summary<W: Write>(
    outcomes: &[BatchOutcome],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let reports: Vec<OutcomeReport<'_>> = outcomes.iter().map(OutcomeReport::from).collect();
    serde_json::to_writer_pretty(writer, &reports).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(reports.len())
}

/// Files written by `write_outputs`.
#[derive(Debug, Default)]
pub struct WrittenOutputs {
    pub data_files: Vec<PathBuf>,
    pub reports: Vec<PathBuf>,
}

/// Write `<stem>.<ext>` data and `<stem>.report.json` for every completed
/// run, plus `summary.json` covering all outcomes.
pub fn write_outputs(
    outcomes: &[BatchOutcome],
    dir: &Path,
    format: OutputFormat,
) -> Result<WrittenOutputs, WellSleuthError> {
    std::fs::create_dir_all(dir).map_err(|source| WellSleuthError::Io {
        path: dir.to_path_buf(),
        operation: "create output directory",
        source,
    })?;

    let mut written = WrittenOutputs::default();
    let mut used_stems = HashSet::new();
    for outcome in outcomes {
        let Some(result) = &outcome.result else {
            continue;
        };
        let stem = unique_stem(outcome, &mut used_stems);

        if let (Some(ext), Some(file)) = (format.extension(), &result.file) {
            let path = dir.join(format!("{stem}.{ext}"));
            let out = create(&path)?;
            match format {
                OutputFormat::Csv => export::export_csv(file, out, &path)?,
                _ => export::write_las(file, out, &path)?,
            };
            written.data_files.push(path);
        }

        let report_path = dir.join(format!("{stem}.report.json"));
        export::export_json(std::slice::from_ref(result), create(&report_path)?, &report_path)?;
        written.reports.push(report_path);
    }

    let summary_path = dir.join("summary.json");
    write_summary(outcomes, create(&summary_path)?, &summary_path)?;
    written.reports.push(summary_path);

    tracing::info!(
        dir = %dir.display(),
        data_files = written.data_files.len(),
        reports = written.reports.len(),
        "Outputs written"
    );
    Ok(written)
}

/// Output stem for one input. Inputs sharing a stem get `-2`, `-3`, ...
/// in the order they are written. Names are compared case-insensitively.
fn unique_stem(outcome: &BatchOutcome, used: &mut HashSet<String>) -> String {
    let base = outcome
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| outcome.filename.clone());
    let mut candidate = base.clone();
    let mut n = 1;
    while !used.insert(candidate.to_lowercase()) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    candidate
}

fn create(path: &Path) -> Result<std::fs::File, ExportError> {
    std::fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::batch::{run_batch, BatchConfig};
    use crate::core::pipeline::ProcessingOptions;
    use std::sync::Arc;

    const GOOD: &str = "\
~V
VERS. 2.0 : V
WRAP. NO : W
~W
STRT.M 1000.0 : START
STOP.M 1002.0 : STOP
STEP.M 0.5 : STEP
NULL. -999.25 : NULL
COMP. ACME : COMPANY
WELL. W-1 : WELL
UWI. 100 : UWI
~C
DEPT.M : DEPTH
GR.API : GAMMA
~A
1000.0 50.0
1000.5 51.0
1001.0 52.0
1001.5 51.0
1002.0 50.0
";

    fn outcomes(dir: &tempfile::TempDir) -> Vec<BatchOutcome> {
        let good = dir.path().join("well.las");
        std::fs::write(&good, GOOD).unwrap();
        let files = vec![good, dir.path().join("absent.las")];
        run_batch(&files, Arc::new(ProcessingOptions::default()), BatchConfig::default())
    }

    #[test]
    fn test_summary_includes_failed_reads() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = outcomes(&dir);
        let mut buf = Vec::new();
        let count = write_summary(&outcomes, &mut buf, Path::new("summary.json")).unwrap();
        assert_eq!(count, 2);

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let entries = value.as_array().unwrap();
        let failed = entries.iter().find(|e| e["status"] == "read_failed").unwrap();
        assert!(failed["error"].is_string());
        assert!(failed.get("pre_qc").is_none());
        let done = entries.iter().find(|e| e["status"] == "completed").unwrap();
        assert_eq!(done["filename"], "well.las");
        assert!(done["pre_qc"]["overall_score"].is_number());
    }

    #[test]
    fn test_write_outputs_las() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = outcomes(&dir);
        let out_dir = dir.path().join("out");
        let written = write_outputs(&outcomes, &out_dir, OutputFormat::Las).unwrap();
        assert_eq!(written.data_files, vec![out_dir.join("well.las")]);
        assert!(out_dir.join("well.report.json").exists());
        assert!(out_dir.join("summary.json").exists());
        let las = std::fs::read_to_string(out_dir.join("well.las")).unwrap();
        assert!(las.starts_with("~Version Information"));
    }

    #[test]
    fn test_write_outputs_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = outcomes(&dir);
        let out_dir = dir.path().join("reports");
        let written = write_outputs(&outcomes, &out_dir, OutputFormat::Json).unwrap();
        assert!(written.data_files.is_empty());
        assert_eq!(written.reports.len(), 2);
    }

    #[test]
    fn test_same_stem_in_different_dirs_is_disambiguated() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for sub in ["a", "b"] {
            let sub_dir = dir.path().join(sub);
            std::fs::create_dir(&sub_dir).unwrap();
            let path = sub_dir.join("well.las");
            std::fs::write(&path, GOOD).unwrap();
            files.push(path);
        }
        let outcomes = run_batch(&files, Arc::new(ProcessingOptions::default()), BatchConfig::default());

        let out_dir = dir.path().join("out");
        let written = write_outputs(&outcomes, &out_dir, OutputFormat::Las).unwrap();
        let mut data = written.data_files.clone();
        data.sort();
        assert_eq!(data, vec![out_dir.join("well-2.las"), out_dir.join("well.las")]);
        assert!(out_dir.join("well.report.json").exists());
        assert!(out_dir.join("well-2.report.json").exists());
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 5);
    }
}
