// WellSleuth - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Each subsystem owns an error enum; all of them convert into the top-level
// `WellSleuthError` so binary-side code can propagate with `?`.
//
// Non-fatal findings (parse anomalies, validation findings) are NOT errors:
// they are typed warnings returned alongside results (see core::model).

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all WellSleuth operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum WellSleuthError {
    /// LAS parsing failed structurally.
    Parse(ParseError),

    /// A signal-processing operator rejected its input.
    Algorithm(AlgorithmError),

    /// Export of a result failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// File discovery failed.
    Discovery(DiscoveryError),

    /// Input file exceeds the in-memory ceiling.
    InputTooLarge { path: PathBuf, size: u64, max: u64 },

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for WellSleuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Algorithm(e) => write!(f, "Algorithm error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Discovery(e) => write!(f, "Discovery error: {e}"),
            Self::InputTooLarge { path, size, max } => write!(
                f,
                "'{}' is {size} bytes, exceeds the input ceiling of {max} bytes",
                path.display()
            ),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for WellSleuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Algorithm(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Discovery(e) => Some(e),
            Self::InputTooLarge { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Structural LAS parse failures. These are the only conditions that abort
/// a pipeline run; every other anomaly degrades to a `ParseWarning`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A required section (`~W` or `~C`) is absent or has no usable lines.
    MissingSection {
        file: String,
        section: &'static str,
    },

    /// The input buffer is larger than the in-memory ceiling.
    InputTooLarge { file: String, size: u64, max: u64 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSection { file, section } => {
                write!(f, "'{file}': required section {section} is missing")
            }
            Self::InputTooLarge { file, size, max } => write!(
                f,
                "'{file}': input is {size} bytes, exceeds maximum of {max} bytes"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for WellSleuthError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Algorithm errors
// ---------------------------------------------------------------------------

/// Rejections raised by the signal-processing operators. Fatal for the
/// affected curve/step only.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    /// The moving window is longer than the number of non-missing samples.
    WindowTooLarge { window: usize, available: usize },

    /// A parameter is outside its accepted domain.
    InvalidParameter {
        parameter: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Too few non-missing samples to fit the requested model.
    InsufficientData { required: usize, available: usize },

    /// The least-squares system is singular (e.g. all depths identical).
    Degenerate { reason: &'static str },
}

impl fmt::Display for AlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowTooLarge { window, available } => write!(
                f,
                "window of {window} points exceeds the {available} available samples"
            ),
            Self::InvalidParameter {
                parameter,
                value,
                expected,
            } => write!(f, "{parameter} = {value} is invalid. Expected: {expected}"),
            Self::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "at least {required} samples required, only {available} available"
            ),
            Self::Degenerate { reason } => write!(f, "degenerate input: {reason}"),
        }
    }
}

impl std::error::Error for AlgorithmError {}

impl From<AlgorithmError> for WellSleuthError {
    fn from(e: AlgorithmError) -> Self {
        Self::Algorithm(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for WellSleuthError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for WellSleuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors related to LAS file discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The root path does not exist or is not accessible.
    RootNotFound { path: PathBuf },

    /// The root path is not a directory.
    NotADirectory { path: PathBuf },

    /// Permission denied accessing the root path.
    PermissionDenied { path: PathBuf, source: io::Error },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Path '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Path '{}' is not a directory", path.display())
            }
            Self::PermissionDenied { path, source } => {
                write!(
                    f,
                    "Permission denied accessing '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PermissionDenied { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DiscoveryError> for WellSleuthError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

/// Convenience type alias for WellSleuth results.
pub type Result<T> = std::result::Result<T, WellSleuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_parse_error_display_names_file_and_section() {
        let err = ParseError::MissingSection {
            file: "well.las".to_string(),
            section: "~W (well information)",
        };
        let msg = err.to_string();
        assert!(msg.contains("well.las"));
        assert!(msg.contains("~W"));
    }

    #[test]
    fn test_top_level_error_preserves_source() {
        let err: WellSleuthError = AlgorithmError::WindowTooLarge {
            window: 11,
            available: 4,
        }
        .into();
        assert!(err.to_string().starts_with("Algorithm error"));
        assert!(err.source().is_some());
    }
}
