// WellSleuth - core/export.rs
//
// LAS, CSV and JSON export of pipeline output.
// Core layer: writes to any Write trait object.

use crate::core::model::LogFile;
use crate::core::pipeline::{PipelineResult, ProcessingHistoryEntry, RunMetrics};
use crate::core::qc::QcResult;
use crate::util::constants;
use crate::util::error::ExportError;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a LAS 2.0 file (unwrapped). Missing cells are written as the
/// file's null value. Returns the number of data rows written.
pub fn write_las<W: Write>(file: &LogFile, writer: W, export_path: &Path) -> Result<usize, ExportError> {
    let mut w = io::BufWriter::new(writer);
    write_las_inner(file, &mut w).map_err(io_err(export_path))?;
    w.flush().map_err(io_err(export_path))?;
    Ok(file.rows.len())
}

fn write_las_inner<W: Write>(file: &LogFile, w: &mut W) -> io::Result<()> {
    let h = &file.header;
    let depth_unit = h.depth_unit.as_deref().unwrap_or("");

    writeln!(w, "~Version Information")?;
    header_line(w, "VERS", "", constants::LAS_EXPORT_VERSION, "CWLS LOG ASCII STANDARD - VERSION 2.0")?;
    header_line(w, "WRAP", "", "NO", "ONE LINE PER DEPTH STEP")?;

    writeln!(w, "~Well Information")?;
    let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    header_line(w, "STRT", depth_unit, &number(h.start), "START DEPTH")?;
    header_line(w, "STOP", depth_unit, &number(h.stop), "STOP DEPTH")?;
    header_line(w, "STEP", depth_unit, &number(h.step), "STEP")?;
    header_line(w, "NULL", "", &h.null_value.to_string(), "NULL VALUE")?;
    let text_fields = [
        ("COMP", &h.company, "COMPANY"),
        ("WELL", &h.well_name, "WELL"),
        ("FLD", &h.field, "FIELD"),
        ("LOC", &h.location, "LOCATION"),
        ("PROV", &h.province, "PROVINCE"),
        ("CTRY", &h.country, "COUNTRY"),
        ("SRVC", &h.service_company, "SERVICE COMPANY"),
        ("DATE", &h.date, "LOG DATE"),
        ("UWI", &h.uwi, "UNIQUE WELL ID"),
        ("API", &h.api, "API NUMBER"),
    ];
    for (mnem, value, desc) in text_fields {
        if let Some(value) = value {
            header_line(w, mnem, "", value, desc)?;
        }
    }
    for item in &h.extra {
        header_line(w, &item.mnemonic, &item.unit, &item.value, &item.description)?;
    }

    writeln!(w, "~Curve Information")?;
    for curve in &file.curves {
        let desc = match &curve.original_mnemonic {
            Some(orig) if !curve.description.is_empty() => format!("{} (was {orig})", curve.description),
            Some(orig) => format!("(was {orig})"),
            None => curve.description.clone(),
        };
        header_line(w, &curve.mnemonic, &curve.unit, "", &desc)?;
    }

    if !h.parameters.is_empty() {
        writeln!(w, "~Parameter Information")?;
        for item in &h.parameters {
            header_line(w, &item.mnemonic, &item.unit, &item.value, &item.description)?;
        }
    }
    if !h.other.is_empty() {
        writeln!(w, "~Other Information")?;
        writeln!(w, "{}", h.other)?;
    }

    let names: Vec<&str> = file.curves.iter().map(|c| c.mnemonic.as_str()).collect();
    writeln!(w, "~A  {}", names.join("  "))?;
    for row in &file.rows {
        let cells: Vec<String> = row
            .values
            .iter()
            .map(|v| format!("{:>12}", v.unwrap_or(h.null_value)))
            .collect();
        writeln!(w, "{}", cells.join(" "))?;
    }
    Ok(())
}

/// A value containing a colon is written after the delimiter, LAS 1.2
/// style, and its description is dropped; the reader takes an empty value
/// from the text after the first colon.
fn header_line<W: Write>(w: &mut W, mnem: &str, unit: &str, value: &str, desc: &str) -> io::Result<()> {
    let left = format!(" {mnem}.{unit}");
    if value.contains(':') {
        return writeln!(w, "{left:<16}{:>20} : {value}", "");
    }
    writeln!(w, "{left:<16}{value:>20} : {desc}")
}

/// Export the data matrix to CSV: one column per curve, empty cells for
/// missing values. Returns the number of rows written.
pub fn export_csv<W: Write>(file: &LogFile, writer: W, export_path: &Path) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(file.curves.iter().map(|c| c.mnemonic.as_str()))
        .map_err(csv_err)?;

    let mut count = 0;
    for row in &file.rows {
        csv_writer
            .write_record(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            )
            .map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(io_err(export_path))?;
    Ok(count)
}

/// Run report without the data matrix.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub filename: &'a str,
    pub success: bool,
    pub conditioned: bool,
    pub spikes_replaced: usize,
    pub pre_qc: Option<&'a QcResult>,
    pub post_qc: Option<&'a QcResult>,
    pub history: &'a [ProcessingHistoryEntry],
    pub warnings: &'a [String],
    pub errors: &'a [String],
    pub metrics: &'a RunMetrics,
}

impl<'a> From<&'a PipelineResult> for RunReport<'a> {
    fn from(r: &'a PipelineResult) -> Self {
        Self {
            tool: constants::APP_NAME,
            version: constants::APP_VERSION,
            filename: &r.filename,
            success: r.success,
            conditioned: r.conditioned,
            spikes_replaced: r.spikes_replaced,
            pre_qc: r.pre_qc.as_ref(),
            post_qc: r.post_qc.as_ref(),
            history: &r.history,
            warnings: &r.warnings,
            errors: &r.errors,
            metrics: &r.metrics,
        }
    }
}

/// Export run reports as a pretty-printed JSON array.
pub fn export_json<W: Write>(
    results: &[PipelineResult],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let reports: Vec<RunReport<'_>> = results.iter().map(RunReport::from).collect();
    serde_json::to_writer_pretty(writer, &reports).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(reports.len())
}
