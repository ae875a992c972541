// WellSleuth - core/discovery.rs
//
// Recursive LAS file discovery for batch runs.
//
// Reads only file metadata, never contents; reading is owned by
// platform::fs. Per-entry I/O errors are non-fatal and collected as
// warnings. Exclude patterns short-circuit directory descent via
// filter_entry, so excluded subtrees (e.g. a previous output directory)
// are never traversed.

use crate::util::constants;
use crate::util::error::DiscoveryError;
use std::path::{Path, PathBuf};

/// Configuration for a discovery operation.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    /// Maximum number of files returned; extra matches are dropped with a warning.
    pub max_files: usize,

    /// Filename globs a file must match. Empty means "everything not excluded".
    pub include_patterns: Vec<String>,

    /// Globs matched against filenames; literal entries also prune
    /// directories of that name.
    pub exclude_patterns: Vec<String>,

    /// Size (bytes) from which a file is flagged `is_large`.
    pub large_file_threshold: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::DEFAULT_MAX_FILES,
            include_patterns: constants::DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            exclude_patterns: constants::DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            large_file_threshold: constants::LARGE_FILE_THRESHOLD,
        }
    }
}

/// A candidate input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
    /// Read through a memory map rather than into a buffer.
    pub is_large: bool,
}

/// Discovery output: accepted files (sorted by path), non-fatal warnings,
/// and the number of matches before `max_files` was applied.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    pub warnings: Vec<String>,
    pub total_found: usize,
}

/// Discover LAS files under `root`.
///
/// # Errors
/// Only an invalid root (`RootNotFound`, `NotADirectory`,
/// `PermissionDenied`) is fatal.
pub fn discover_files(root: &Path, config: &DiscoveryConfig) -> Result<Discovery, DiscoveryError> {
    // fs::metadata rather than Path::is_dir: the latter maps permission
    // errors to `false`.
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiscoveryError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(DiscoveryError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    }

    let max_files = config.max_files.min(constants::ABSOLUTE_MAX_FILES);
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        max_files,
        include = ?config.include_patterns,
        exclude = ?config.exclude_patterns,
        "Discovery starting"
    );

    let include_pats = compile_patterns(&config.include_patterns, "include");
    let exclude_pats = compile_patterns(&config.exclude_patterns, "exclude");

    let mut out = Discovery::default();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_str().unwrap_or("");
            !is_excluded_component(name, &exclude_pats)
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                out.warnings.push(msg);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            out.warnings
                .push(format!("Skipping '{}': non-UTF-8 filename", path.display()));
            continue;
        };

        if is_excluded_filename(file_name, &exclude_pats) {
            tracing::trace!(file = file_name, "Excluded by pattern");
            continue;
        }
        if !is_included(file_name, &include_pats) {
            tracing::trace!(file = file_name, "Not matched by include patterns");
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                let msg = format!("Cannot read metadata for '{}': {e}", path.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                out.warnings.push(msg);
                continue;
            }
        };

        out.files.push(DiscoveredFile {
            path: path.to_path_buf(),
            size,
            is_large: size >= config.large_file_threshold,
        });
    }

    out.files.sort_by(|a, b| a.path.cmp(&b.path));
    out.total_found = out.files.len();

    if out.total_found > max_files {
        out.files.truncate(max_files);
        out.warnings.push(format!(
            "{} LAS files were found but the limit is {max_files}; only the first {max_files} \
             (by path) will be processed",
            out.total_found
        ));
        tracing::info!(
            total_found = out.total_found,
            limit = max_files,
            "File list truncated"
        );
    }

    tracing::debug!(
        total_found = out.total_found,
        files = out.files.len(),
        warnings = out.warnings.len(),
        "Discovery complete"
    );
    Ok(out)
}

/// Expand command-line inputs: files are taken as given, directories are
/// searched with `discover_files`. Errors on individual inputs become
/// warnings so one bad argument does not stop a batch.
pub fn collect_inputs(inputs: &[PathBuf], config: &DiscoveryConfig) -> Discovery {
    let mut out = Discovery::default();
    for input in inputs {
        match std::fs::metadata(input) {
            Ok(meta) if meta.is_file() => {
                out.files.push(DiscoveredFile {
                    path: input.clone(),
                    size: meta.len(),
                    is_large: meta.len() >= config.large_file_threshold,
                });
                out.total_found += 1;
            }
            Ok(_) => match discover_files(input, config) {
                Ok(found) => {
                    out.total_found += found.total_found;
                    out.files.extend(found.files);
                    out.warnings.extend(found.warnings);
                }
                Err(e) => out.warnings.push(e.to_string()),
            },
            Err(e) => out
                .warnings
                .push(format!("Cannot access '{}': {e}", input.display())),
        }
    }
    out
}

// =============================================================================
// Glob helpers
// =============================================================================

/// Compile glob patterns; invalid ones are logged and skipped.
fn compile_patterns(patterns: &[String], kind: &str) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, kind, error = %e, "Invalid glob pattern, skipping");
                None
            }
        })
        .collect()
}

/// Literal (wildcard-free) exclude patterns double as directory-name exclusions.
fn is_excluded_component(dir_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| {
        let s = p.as_str();
        !s.contains('*') && !s.contains('?') && !s.contains('[') && p.matches(dir_name)
    })
}

fn is_excluded_filename(file_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| p.matches(file_name))
}

fn is_included(file_name: &str, include_pats: &[glob::Pattern]) -> bool {
    include_pats.is_empty() || include_pats.iter().any(|p| p.matches(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_temp_tree() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        fs::write(root.join("well_a.las"), "~V\n").expect("write well_a.las");
        fs::write(root.join("WELL_B.LAS"), "~V\n").expect("write WELL_B.LAS");
        fs::write(root.join("notes.txt"), "not a log\n").expect("write notes.txt");
        fs::write(root.join("old.las.bak"), "~V\n").expect("write .bak");

        let sub = root.join("field_1");
        fs::create_dir(&sub).expect("mkdir field_1");
        fs::write(sub.join("well_c.las"), "~V\n").expect("write well_c.las");

        // Output of a previous run must not be re-ingested.
        let out = root.join(constants::DEFAULT_OUTPUT_DIR_NAME);
        fs::create_dir(&out).expect("mkdir conditioned");
        fs::write(out.join("well_a.las"), "~V\n").expect("write conditioned/well_a.las");

        dir
    }

    fn names(found: &Discovery) -> Vec<String> {
        found
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_discovers_las_files() {
        let dir = make_temp_tree();
        let found = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        let mut paths = names(&found);
        paths.sort();
        assert_eq!(paths, vec!["WELL_B.LAS", "well_a.las", "well_c.las"]);
        assert!(found.warnings.is_empty(), "unexpected warnings: {:?}", found.warnings);
    }

    #[test]
    fn test_max_depth_1_excludes_subdirs() {
        let dir = make_temp_tree();
        let config = DiscoveryConfig {
            max_depth: 1,
            ..Default::default()
        };
        let found = discover_files(dir.path(), &config).unwrap();
        assert!(!names(&found).contains(&"well_c.las".to_string()));
    }

    #[test]
    fn test_max_files_truncates_gracefully() {
        let dir = make_temp_tree();
        let config = DiscoveryConfig {
            max_files: 2,
            ..Default::default()
        };
        let found = discover_files(dir.path(), &config).unwrap();
        assert_eq!(found.files.len(), 2);
        assert_eq!(found.total_found, 3);
        let warning_text = found.warnings.join(" ");
        assert!(warning_text.contains('3') && warning_text.contains('2'));
    }

    #[test]
    fn test_root_not_found() {
        let result = discover_files(
            Path::new("/nonexistent/path/wellsleuth"),
            &DiscoveryConfig::default(),
        );
        assert!(matches!(result, Err(DiscoveryError::RootNotFound { .. })));
    }

    #[test]
    fn test_root_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.las");
        fs::write(&file, "~V\n").unwrap();
        let result = discover_files(&file, &DiscoveryConfig::default());
        assert!(matches!(result, Err(DiscoveryError::NotADirectory { .. })));
    }

    #[test]
    fn test_is_large_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tiny.las"), "x").unwrap();

        let config = DiscoveryConfig {
            large_file_threshold: 0,
            ..Default::default()
        };
        let found = discover_files(dir.path(), &config).unwrap();
        assert!(found.files[0].is_large);
        assert_eq!(found.files[0].size, 1);
    }

    #[test]
    fn test_collect_inputs_mixes_files_and_dirs() {
        let dir = make_temp_tree();
        let explicit = dir.path().join("notes.txt");
        let missing = dir.path().join("missing.las");
        let inputs = vec![explicit.clone(), dir.path().join("field_1"), missing];
        let found = collect_inputs(&inputs, &DiscoveryConfig::default());

        // Explicit files bypass the include patterns.
        assert_eq!(found.files[0].path, explicit);
        assert_eq!(names(&found), vec!["notes.txt", "well_c.las"]);
        assert_eq!(found.warnings.len(), 1);
        assert!(found.warnings[0].contains("missing.las"));
    }
}
