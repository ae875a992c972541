// WellSleuth - core/parser.rs
//
// LAS (Log ASCII Standard) parsing into the canonical `LogFile` model.
// Core layer: accepts a byte buffer, never touches the filesystem directly.
//
// The input is split into sections on `~X` marker lines, then each section
// is decoded on its own. Only a missing ~W or ~C section is fatal; every
// other anomaly becomes a typed `ParseWarning` with best-effort recovery.

use crate::core::mnemonic;
use crate::core::model::{
    check_depth_consistency, Curve, CurveCategory, CurveRole, DataRow, HeaderItem, LogFile,
    LogHeader, ParseWarning,
};
use crate::util::constants;
use crate::util::error::ParseError;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Configuration for parsing operations.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Warnings retained per file before further ones are only counted.
    pub max_warnings: usize,
    /// Absolute tolerance for matching data tokens against the null sentinel.
    pub null_tolerance: f64,
    /// Largest accepted input buffer, in bytes.
    pub max_input_bytes: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_warnings: constants::MAX_PARSE_WARNINGS,
            null_tolerance: constants::NULL_TOLERANCE,
            max_input_bytes: constants::MAX_INPUT_BYTES,
        }
    }
}

/// A successfully parsed file plus the non-fatal diagnostics found on the way.
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub file: LogFile,
    pub warnings: Vec<ParseWarning>,
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Version,
    Well,
    Curve,
    Parameter,
    Other,
    Data,
}

impl SectionKind {
    fn from_marker(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'V' => Some(Self::Version),
            'W' => Some(Self::Well),
            'C' => Some(Self::Curve),
            'P' => Some(Self::Parameter),
            'O' => Some(Self::Other),
            'A' => Some(Self::Data),
            _ => None,
        }
    }

    fn letter(&self) -> char {
        match self {
            Self::Version => 'V',
            Self::Well => 'W',
            Self::Curve => 'C',
            Self::Parameter => 'P',
            Self::Other => 'O',
            Self::Data => 'A',
        }
    }
}

/// Lines accumulated per section, with their 1-based line numbers.
#[derive(Default)]
struct Sections<'a> {
    version: Option<Vec<(usize, &'a str)>>,
    well: Option<Vec<(usize, &'a str)>>,
    curve: Option<Vec<(usize, &'a str)>>,
    parameter: Option<Vec<(usize, &'a str)>>,
    other: Option<Vec<(usize, &'a str)>>,
    data: Option<Vec<(usize, &'a str)>>,
}

impl<'a> Sections<'a> {
    fn slot(&mut self, kind: SectionKind) -> &mut Option<Vec<(usize, &'a str)>> {
        match kind {
            SectionKind::Version => &mut self.version,
            SectionKind::Well => &mut self.well,
            SectionKind::Curve => &mut self.curve,
            SectionKind::Parameter => &mut self.parameter,
            SectionKind::Other => &mut self.other,
            SectionKind::Data => &mut self.data,
        }
    }
}

/// Bounded warning sink.
struct Diagnostics {
    warnings: Vec<ParseWarning>,
    suppressed: usize,
    max: usize,
}

impl Diagnostics {
    fn new(max: usize) -> Self {
        Self {
            warnings: Vec::new(),
            suppressed: 0,
            max,
        }
    }

    fn push(&mut self, warning: ParseWarning) {
        if self.warnings.len() < self.max {
            self.warnings.push(warning);
        } else {
            self.suppressed += 1;
        }
    }

    fn finish(mut self) -> Vec<ParseWarning> {
        if self.suppressed > 0 {
            self.warnings.push(ParseWarning::WarningsSuppressed {
                count: self.suppressed,
            });
        }
        self.warnings
    }
}

// =============================================================================
// Entry point
// =============================================================================

/// Parse a LAS byte buffer into a `LogFile`.
///
/// # Errors
/// `ParseError::MissingSection` when the well-information or
/// curve-definition section is absent, `ParseError::InputTooLarge` when the
/// buffer exceeds `options.max_input_bytes`.
pub fn parse(bytes: &[u8], filename: &str, options: &ParseOptions) -> Result<ParsedLog, ParseError> {
    if bytes.len() as u64 > options.max_input_bytes {
        return Err(ParseError::InputTooLarge {
            file: filename.to_string(),
            size: bytes.len() as u64,
            max: options.max_input_bytes,
        });
    }

    let mut diag = Diagnostics::new(options.max_warnings);

    let text: Cow<'_, str> = match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            diag.push(ParseWarning::InvalidEncoding);
            String::from_utf8_lossy(bytes)
        }
    };

    let sections = split_sections(&text, &mut diag);

    let well_lines = sections.well.ok_or_else(|| ParseError::MissingSection {
        file: filename.to_string(),
        section: "~W (well information)",
    })?;
    let curve_lines = sections.curve.ok_or_else(|| ParseError::MissingSection {
        file: filename.to_string(),
        section: "~C (curve definitions)",
    })?;

    let mut header = LogHeader::default();
    if let Some(lines) = &sections.version {
        parse_version_section(lines, &mut header, &mut diag);
    }
    parse_well_section(&well_lines, &mut header, &mut diag);

    let curves = parse_curve_section(&curve_lines, &mut diag);
    if curves.is_empty() {
        return Err(ParseError::MissingSection {
            file: filename.to_string(),
            section: "~C (curve definitions)",
        });
    }
    if header.depth_unit.is_none() && !curves[0].unit.is_empty() {
        header.depth_unit = Some(curves[0].unit.clone());
    }

    if let Some(lines) = &sections.parameter {
        header.parameters = lines
            .iter()
            .filter_map(|(n, l)| header_item_or_warn(*n, l, SectionKind::Parameter, &mut diag))
            .collect();
    }
    if let Some(lines) = &sections.other {
        header.other = lines
            .iter()
            .map(|(_, l)| l.trim())
            .collect::<Vec<_>>()
            .join("\n");
    }

    let rows = match &sections.data {
        Some(lines) => parse_data_section(lines, &curves, &header, options, &mut diag),
        None => {
            diag.push(ParseWarning::MissingDataSection);
            Vec::new()
        }
    };

    let mut file = LogFile {
        filename: filename.to_string(),
        header,
        curves,
        rows,
    };
    recompute_depth_range(&mut file, &mut diag);
    file.refresh_statistics();

    let warnings = diag.finish();
    tracing::debug!(
        file = filename,
        curves = file.curves.len(),
        rows = file.rows.len(),
        warnings = warnings.len(),
        "LAS parse complete"
    );

    Ok(ParsedLog { file, warnings })
}

/// Split raw text into sections. Comment and blank lines are dropped;
/// lines before the first marker and lines of unknown sections are ignored.
fn split_sections<'a>(text: &'a str, diag: &mut Diagnostics) -> Sections<'a> {
    let mut sections = Sections::default();
    let mut current: Option<SectionKind> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(marker) = line.strip_prefix('~') {
            current = marker.chars().next().and_then(SectionKind::from_marker);
            match current {
                Some(kind) => {
                    sections.slot(kind).get_or_insert_with(Vec::new);
                }
                None => diag.push(ParseWarning::UnknownSection {
                    marker: line.to_string(),
                    line_number,
                }),
            }
            continue;
        }

        if let Some(kind) = current {
            if let Some(lines) = sections.slot(kind).as_mut() {
                lines.push((line_number, line));
            }
        }
    }

    sections
}

// =============================================================================
// Header lines
// =============================================================================

/// Fields of a colon-delimited header line.
#[derive(Debug, Clone, PartialEq)]
struct HeaderLine {
    mnemonic: String,
    unit: String,
    value: String,
    description: String,
}

/// `MNEM.UNIT  VALUE : DESCRIPTION`. Only the first colon is structural.
/// `None` only if the pattern itself fails to compile, in which case every
/// line goes through the plain-colon fallback.
fn las_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<mnem>[^.:\s][^.:]*?)\s*\.(?P<unit>[^\s:]*)(?P<value>[^:]*):(?P<desc>.*)$").ok()
    })
    .as_ref()
}

/// Decode a well/parameter line. Accepts the LAS dotted form and the plain
/// `MNEMONIC : VALUE` form. An empty value falls back to the text after the
/// colon (LAS 1.2 writes some well values there).
fn parse_header_line(line: &str) -> Option<HeaderLine> {
    if let Some(caps) = las_line_regex().and_then(|re| re.captures(line)) {
        let value = caps["value"].trim().to_string();
        let description = caps["desc"].trim().to_string();
        let value = if value.is_empty() {
            description.clone()
        } else {
            value
        };
        return Some(HeaderLine {
            mnemonic: caps["mnem"].trim().to_string(),
            unit: caps["unit"].trim().to_string(),
            value,
            description,
        });
    }

    let (mnem, rest) = line.split_once(':')?;
    let mnem = mnem.trim();
    if mnem.is_empty() {
        return None;
    }
    Some(HeaderLine {
        mnemonic: mnem.to_string(),
        unit: String::new(),
        value: rest.trim().to_string(),
        description: String::new(),
    })
}

/// Decode a curve line: LAS `MNEM.UNIT API : DESCRIPTION` or plain
/// `MNEMONIC : UNIT : DESCRIPTION`.
fn parse_curve_line(line: &str) -> Option<HeaderLine> {
    if let Some(caps) = las_line_regex().and_then(|re| re.captures(line)) {
        return Some(HeaderLine {
            mnemonic: caps["mnem"].trim().to_string(),
            unit: caps["unit"].trim().to_string(),
            value: caps["value"].trim().to_string(),
            description: caps["desc"].trim().to_string(),
        });
    }

    let (mnem, rest) = line.split_once(':')?;
    let mnem = mnem.trim();
    if mnem.is_empty() {
        return None;
    }
    let (unit, description) = rest.split_once(':').unwrap_or((rest, ""));
    Some(HeaderLine {
        mnemonic: mnem.to_string(),
        unit: unit.trim().to_string(),
        value: String::new(),
        description: description.trim().to_string(),
    })
}

fn header_item_or_warn(
    line_number: usize,
    line: &str,
    section: SectionKind,
    diag: &mut Diagnostics,
) -> Option<HeaderItem> {
    match parse_header_line(line) {
        Some(h) => Some(HeaderItem {
            mnemonic: h.mnemonic,
            unit: h.unit,
            value: h.value,
            description: h.description,
        }),
        None => {
            diag.push(ParseWarning::MalformedLine {
                section: section.letter(),
                line_number,
                text: line.to_string(),
            });
            None
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_header_number(field: &'static str, text: &str, diag: &mut Diagnostics) -> Option<f64> {
    let token = text.split_whitespace().next().unwrap_or("");
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            diag.push(ParseWarning::InvalidHeaderNumber {
                field,
                text: text.to_string(),
            });
            None
        }
    }
}

fn parse_version_section(lines: &[(usize, &str)], header: &mut LogHeader, diag: &mut Diagnostics) {
    for (line_number, line) in lines {
        let Some(h) = parse_header_line(line) else {
            diag.push(ParseWarning::MalformedLine {
                section: SectionKind::Version.letter(),
                line_number: *line_number,
                text: line.to_string(),
            });
            continue;
        };
        match h.mnemonic.to_ascii_uppercase().as_str() {
            "VERS" => header.version = non_empty(&h.value),
            "WRAP" => header.wrap = h.value.trim().to_ascii_uppercase().starts_with('Y'),
            "NULL" => {
                if let Some(v) = parse_header_number("NULL", &h.value, diag) {
                    header.null_value = v;
                }
            }
            _ => {}
        }
    }
}

fn parse_well_section(lines: &[(usize, &str)], header: &mut LogHeader, diag: &mut Diagnostics) {
    for (line_number, line) in lines {
        let Some(h) = parse_header_line(line) else {
            diag.push(ParseWarning::MalformedLine {
                section: SectionKind::Well.letter(),
                line_number: *line_number,
                text: line.to_string(),
            });
            continue;
        };

        match h.mnemonic.to_ascii_uppercase().as_str() {
            "STRT" => {
                header.declared_start = parse_header_number("STRT", &h.value, diag);
                if !h.unit.is_empty() {
                    header.depth_unit = Some(h.unit.clone());
                }
            }
            "STOP" => header.declared_stop = parse_header_number("STOP", &h.value, diag),
            "STEP" => header.declared_step = parse_header_number("STEP", &h.value, diag),
            "NULL" => {
                if let Some(v) = parse_header_number("NULL", &h.value, diag) {
                    header.null_value = v;
                }
            }
            "COMP" => header.company = non_empty(&h.value),
            "WELL" => header.well_name = non_empty(&h.value),
            "UWI" => header.uwi = non_empty(&h.value),
            "API" => header.api = non_empty(&h.value),
            "FLD" => header.field = non_empty(&h.value),
            "LOC" => header.location = non_empty(&h.value),
            "PROV" | "STAT" | "STATE" => header.province = non_empty(&h.value),
            "CTRY" => header.country = non_empty(&h.value),
            "SRVC" => header.service_company = non_empty(&h.value),
            "DATE" => header.date = non_empty(&h.value),
            _ => header.extra.push(HeaderItem {
                mnemonic: h.mnemonic,
                unit: h.unit,
                value: h.value,
                description: h.description,
            }),
        }
    }

    if header.company.is_none() {
        diag.push(ParseWarning::MissingHeaderField { field: "COMP" });
    }
    if header.well_name.is_none() {
        diag.push(ParseWarning::MissingHeaderField { field: "WELL" });
    }
    if header.uwi.is_none() && header.api.is_none() {
        diag.push(ParseWarning::MissingHeaderField { field: "UWI" });
    }
}

fn parse_curve_section(lines: &[(usize, &str)], diag: &mut Diagnostics) -> Vec<Curve> {
    let mut curves: Vec<Curve> = Vec::with_capacity(lines.len());

    for (line_number, line) in lines {
        let Some(h) = parse_curve_line(line) else {
            diag.push(ParseWarning::MalformedLine {
                section: SectionKind::Curve.letter(),
                line_number: *line_number,
                text: line.to_string(),
            });
            continue;
        };

        if curves
            .iter()
            .any(|c| c.mnemonic.eq_ignore_ascii_case(&h.mnemonic))
        {
            diag.push(ParseWarning::DuplicateMnemonic {
                mnemonic: h.mnemonic.clone(),
            });
        }

        let (role, category) = if curves.is_empty() {
            (CurveRole::Depth, CurveCategory::Depth)
        } else {
            (CurveRole::Measurement, mnemonic::classify(&h.mnemonic))
        };

        curves.push(Curve {
            mnemonic: h.mnemonic,
            original_mnemonic: None,
            unit: h.unit,
            description: h.description,
            role,
            category,
            statistics: None,
        });
    }

    curves
}

// =============================================================================
// Data section
// =============================================================================

fn parse_data_section(
    lines: &[(usize, &str)],
    curves: &[Curve],
    header: &LogHeader,
    options: &ParseOptions,
    diag: &mut Diagnostics,
) -> Vec<DataRow> {
    let expected = curves.len();
    let mut rows = Vec::with_capacity(lines.len());

    if header.wrap {
        // Wrapped rows span lines: chunk the whole token stream.
        let tokens: Vec<(usize, &str)> = lines
            .iter()
            .flat_map(|(n, l)| l.split_whitespace().map(move |t| (*n, t)))
            .collect();
        let mut chunks = tokens.chunks_exact(expected);
        for chunk in chunks.by_ref() {
            let line_number = chunk[0].0;
            let row_tokens: Vec<&str> = chunk.iter().map(|(_, t)| *t).collect();
            if let Some(row) = build_row(line_number, &row_tokens, curves, header, options, diag) {
                rows.push(row);
            }
        }
        let leftover = chunks.remainder().len();
        if leftover > 0 {
            diag.push(ParseWarning::TrailingWrappedTokens { count: leftover });
        }
        return rows;
    }

    for (line_number, line) in lines {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < expected {
            diag.push(ParseWarning::ShortRow {
                line_number: *line_number,
                expected,
                found: tokens.len(),
            });
            continue;
        }
        if tokens.len() > expected {
            diag.push(ParseWarning::ExtraTokens {
                line_number: *line_number,
                expected,
                found: tokens.len(),
            });
            tokens.truncate(expected);
        }
        if let Some(row) = build_row(*line_number, &tokens, curves, header, options, diag) {
            rows.push(row);
        }
    }

    rows
}

/// Convert one row of tokens. Returns `None` (with a warning) when the depth
/// cell is unusable, since the row cannot be placed.
fn build_row(
    line_number: usize,
    tokens: &[&str],
    curves: &[Curve],
    header: &LogHeader,
    options: &ParseOptions,
    diag: &mut Diagnostics,
) -> Option<DataRow> {
    let is_null = |v: f64| (v - header.null_value).abs() <= options.null_tolerance;

    let depth = match tokens[0].parse::<f64>() {
        Ok(v) if v.is_finite() && !is_null(v) => v,
        _ => {
            diag.push(ParseWarning::InvalidDepth {
                line_number,
                token: tokens[0].to_string(),
            });
            return None;
        }
    };

    let mut values = Vec::with_capacity(tokens.len());
    values.push(Some(depth));
    for (token, curve) in tokens.iter().zip(curves).skip(1) {
        let value = match token.parse::<f64>() {
            Ok(v) if !v.is_finite() => {
                diag.push(ParseWarning::InvalidNumber {
                    line_number,
                    curve: curve.mnemonic.clone(),
                    token: token.to_string(),
                });
                None
            }
            Ok(v) if is_null(v) => None,
            Ok(v) => Some(v),
            Err(_) => {
                diag.push(ParseWarning::InvalidNumber {
                    line_number,
                    curve: curve.mnemonic.clone(),
                    token: token.to_string(),
                });
                None
            }
        };
        values.push(value);
    }

    Some(DataRow { depth, values })
}

/// Override the header depth range with what the rows actually contain and
/// flag declared values that disagree.
fn recompute_depth_range(file: &mut LogFile, diag: &mut Diagnostics) {
    let depths = file.depths();
    let (Some(&first), Some(&last)) = (depths.first(), depths.last()) else {
        return;
    };

    let step = if depths.len() > 1 {
        Some((last - first) / (depths.len() - 1) as f64)
    } else {
        None
    };

    let consistency = check_depth_consistency(&depths);
    if let Some(v) = consistency.violation {
        diag.push(ParseWarning::DepthInconsistent {
            index: v.index,
            depth: v.depth,
            expected_step: v.expected_step,
            actual_step: v.actual_step,
        });
    }

    let tolerance = step
        .map(|s| (s.abs() * constants::DEPTH_STEP_TOLERANCE).max(constants::NULL_TOLERANCE))
        .unwrap_or(constants::NULL_TOLERANCE);
    let header = &mut file.header;
    let checks: [(&'static str, Option<f64>, Option<f64>); 3] = [
        ("STRT", header.declared_start, Some(first)),
        ("STOP", header.declared_stop, Some(last)),
        // STEP 0 declares variable sampling; nothing to compare.
        ("STEP", header.declared_step.filter(|s| *s != 0.0), step),
    ];
    for (field, declared, observed) in checks {
        if let (Some(declared), Some(observed)) = (declared, observed) {
            if (declared - observed).abs() > tolerance {
                diag.push(ParseWarning::DeclaredDepthMismatch {
                    field,
                    declared,
                    observed,
                });
            }
        }
    }

    header.start = Some(first);
    header.stop = Some(last);
    header.step = step;
}
