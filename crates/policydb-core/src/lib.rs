//! policydb-core
//!
//! Data model, error taxonomy and backend traits shared by every policydb
//! crate, plus the pure write-path stages: the document [`loader`] and the
//! section [`chunker`].

pub mod chunker;
pub mod citation;
pub mod config;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod traits;
pub mod types;

pub use error::{Error, GraphError, Result, VectorError};
pub use types::{
    Chunk, ChunkId, Document, Filters, FlatMetadata, HybridResult, IndexedRecord, Metadata,
    RetrievalResult, Scalar, SourceKind, UsageEvent,
};
