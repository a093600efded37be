//! Document loading: read a file, split YAML front-matter from the body.
//!
//! Only a missing file is an error. Malformed front-matter yields a
//! metadata-less document so one bad header never blocks retrieval.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Document, Metadata};

const DELIMITER: &str = "---";
const DEFAULT_EXTENSIONS: &[&str] = &["md"];

/// Split `raw` into (front-matter metadata, body).
///
/// The block must open on the first line and close with a `---` (or `...`)
/// line; an unterminated block is treated as ordinary body text.
pub fn parse_front_matter(raw: &str) -> (Metadata, &str) {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = strip_delimiter_line(text) else {
        return (Metadata::new(), text);
    };

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == DELIMITER || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = rest[offset + line.len()..].trim_start_matches(['\r', '\n']);
            return (parse_yaml(yaml), body);
        }
        offset += line.len();
    }
    (Metadata::new(), text)
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let first_end = text.find('\n').unwrap_or(text.len());
    if text[..first_end].trim_end() != DELIMITER {
        return None;
    }
    Some(text.get(first_end + 1..).unwrap_or(""))
}

fn parse_yaml(yaml: &str) -> Metadata {
    if yaml.trim().is_empty() {
        return Metadata::new();
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        Ok(Value::Null) => Metadata::new(),
        Ok(other) => {
            tracing::warn!(kind = %value_kind(&other), "front-matter is not a mapping; ignoring it");
            Metadata::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed front-matter; loading document without metadata");
            Metadata::new()
        }
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).to_string()),
    }
}

/// Load one document. `metadata["file_path"]` is always set.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let raw = read_file_content(path)?;
    let (mut metadata, body) = parse_front_matter(&raw);
    metadata.insert("file_path".to_string(), Value::String(path.to_string_lossy().to_string()));
    tracing::debug!(path = %path.display(), keys = metadata.len(), "loaded document");
    Ok(Document { content: body.to_string(), metadata, source_path: path.to_path_buf() })
}

/// Load every file under `dir` whose extension is in `extensions`
/// (default: `md`), in path order.
pub fn load_directory(dir: &Path, extensions: Option<&[&str]>) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.display().to_string()));
    }
    let extensions = extensions.unwrap_or(DEFAULT_EXTENSIONS);
    let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        })
        .collect();

    let documents = files.iter().map(load_document).collect::<Result<Vec<_>>>()?;
    tracing::info!(dir = %dir.display(), documents = documents.len(), "loaded directory");
    Ok(documents)
}
