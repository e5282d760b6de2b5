//! File-level plumbing: errors, format detection, file discovery and raw
//! record deserialization.
//!
//! Every supported format (RON/JSON/TOML) is read into `serde_json::Value`
//! records so the record loaders only deal with one tree shape.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use stockpile_core::store::StoreError;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading content.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A file could not be deserialized at all.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// One record had field-level problems. Every problem is listed.
    #[error("{}", render_record_problems(.id, .src, .problems))]
    Record {
        id: String,
        src: String,
        problems: Vec<String>,
    },

    /// A record's `copy-from` base is not loaded yet. Retried later.
    #[error("'{id}' is waiting for its copy-from base '{base}'")]
    Deferred { id: String, base: String },

    /// A record's `copy-from` base never appeared.
    #[error("'{id}' copies from '{base}', which is never defined")]
    Unresolved { id: String, base: String },

    /// The catalog refused the insert (e.g. it is already finalized).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    pub(crate) fn record(id: &str, src: &str, problems: Vec<String>) -> Self {
        LoadError::Record {
            id: id.to_string(),
            src: src.to_string(),
            problems,
        }
    }
}

fn render_record_problems(id: &str, src: &str, problems: &[String]) -> String {
    let mut out = format!(
        "'{id}' from '{src}' has {} problem{}:",
        problems.len(),
        if problems.len() == 1 { "" } else { "s" }
    );
    for p in problems {
        out.push_str("\n  ");
        out.push_str(p);
    }
    out
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, LoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(LoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(LoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Every content file under `dir`, recursively, sorted by path.
pub fn content_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if detect_format(&path).is_ok() {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    path: &Path,
) -> Result<T, LoadError> {
    let parse_err = |detail: String| LoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read every record in a content file.
///
/// JSON and RON files hold either a list of records or a single record.
/// TOML files hold an array of tables under `records` (`[[records]]`).
pub fn read_records(path: &Path) -> Result<Vec<Value>, LoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let value: Value = deserialize_str(&content, format, path)?;
    let value = match format {
        Format::Toml => value.get("records").cloned().ok_or_else(|| LoadError::Parse {
            file: path.to_path_buf(),
            detail: "missing key 'records' in TOML file".to_string(),
        })?,
        Format::Ron | Format::Json => value,
    };
    Ok(flatten_records(value))
}

/// A list of records, or a single record, as a flat list.
pub fn flatten_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

// ===========================================================================
// Tests
// ===========================================================================
