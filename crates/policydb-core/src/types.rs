//! Domain types shared by the write path (load, chunk, index) and the read
//! path (retrieve, expand, merge).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Structured document metadata: scalars, lists or nested mappings.
pub type Metadata = BTreeMap<String, Value>;

/// Flat metadata as stored by a vector backend.
pub type FlatMetadata = BTreeMap<String, Scalar>;

/// Equality filters over flat metadata fields; all entries must match.
pub type Filters = BTreeMap<String, Scalar>;

pub type ChunkId = String;

/// A metadata value a vector backend can store as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// A loaded source document with its front-matter separated from the body.
///
/// `metadata["file_path"]` is always present after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: Metadata,
    pub content: String,
    pub source_path: PathBuf,
}

impl Document {
    /// Stable document identity: the front-matter `id`, else the file stem.
    pub fn doc_id(&self) -> String {
        match self.metadata.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => self
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    /// Ids listed under `relates_to`, accepting a list or a single value.
    pub fn relates_to(&self) -> Vec<String> {
        fn as_id(v: &Value) -> Option<String> {
            match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }
        match self.metadata.get("relates_to") {
            Some(Value::Array(items)) => items.iter().filter_map(as_id).collect(),
            Some(other) => as_id(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

/// A header-bounded (or sentence-level) slice of a document's content.
///
/// `metadata` holds the document metadata plus `chunk_index`, `header_level`
/// and `section`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn chunk_index(&self) -> usize {
        self.metadata
            .get("chunk_index")
            .and_then(Value::as_u64)
            .map_or(0, |i| i as usize)
    }

    pub fn section(&self) -> Option<&str> {
        self.metadata.get("section").and_then(Value::as_str)
    }

    pub fn header_level(&self) -> Option<u64> {
        self.metadata.get("header_level").and_then(Value::as_u64)
    }

    /// Owning document id, resolved the same way as [`Document::doc_id`].
    pub fn doc_id(&self) -> String {
        match self.metadata.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => self
                .metadata
                .get("file_path")
                .and_then(Value::as_str)
                .and_then(|p| std::path::Path::new(p).file_stem())
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    /// Identifier under which the chunk is indexed: `{doc_id}_{chunk_index}`.
    pub fn record_id(&self) -> ChunkId {
        format!("{}_{}", self.doc_id(), self.chunk_index())
    }
}

/// A chunk as written to a vector backend.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub id: ChunkId,
    pub text: String,
    pub metadata: FlatMetadata,
}

/// One vector search hit. `score` is a distance: lower is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: ChunkId,
    pub text: String,
    pub metadata: FlatMetadata,
    pub score: f32,
}

impl RetrievalResult {
    pub fn doc_id(&self) -> Option<&str> {
        self.metadata
            .get("doc_id")
            .and_then(Scalar::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Which tier produced a hybrid result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Graph,
    Both,
}

/// A retrieval result annotated with its provenance and graph neighbourhood.
/// Built fresh for every query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResult {
    pub id: ChunkId,
    pub text: String,
    pub metadata: FlatMetadata,
    pub score: f32,
    pub source: SourceKind,
    pub related_docs: Vec<String>,
}

impl HybridResult {
    pub fn from_retrieval(hit: RetrievalResult, source: SourceKind) -> Self {
        Self {
            id: hit.id,
            text: hit.text,
            metadata: hit.metadata,
            score: hit.score,
            source,
            related_docs: Vec::new(),
        }
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.metadata
            .get("doc_id")
            .and_then(Scalar::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// One line of the append-only usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: String,
    pub query: String,
    pub top_k: usize,
    pub filters: Filters,
    pub graph_expansion: bool,
}
