//! Capability contracts for the pluggable backends.
//!
//! Every backend has a production adapter and a deterministic in-memory
//! adapter; retrieval code is written against these traits only.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GraphError, VectorError};
use crate::types::{Filters, IndexedRecord, Metadata, RetrievalResult, UsageEvent};

/// Edge type used for `relates_to` links when the caller does not pick one.
pub const DEFAULT_REL_TYPE: &str = "RELATES_TO";

/// Document id → distinct neighbour ids one hop away.
pub type ExpansionMap = BTreeMap<String, BTreeSet<String>>;

/// A text embedding function. Implementations must return vectors of
/// length `dim()` for every input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A named collection in a similarity-search backend, bound to the
/// backend's embedding function.
///
/// Records with an existing id are overwritten. Metadata must already be
/// flat. Query results come back in ascending distance order.
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;
    fn add(&self, records: &[IndexedRecord]) -> Result<usize, VectorError>;
    fn query(
        &self,
        text: &str,
        n_results: usize,
        filters: &Filters,
    ) -> Result<Vec<RetrievalResult>, VectorError>;
    fn count(&self) -> Result<usize, VectorError>;
    /// Delete every record by dropping and recreating the collection.
    fn reset(&self) -> Result<(), VectorError>;
}

/// Creates and deletes collections by name.
pub trait VectorBackend {
    type Collection: VectorCollection;

    fn create_collection(&self, name: &str) -> Result<Self::Collection, VectorError>;
    fn delete_collection(&self, name: &str) -> Result<(), VectorError>;
}

/// A property graph holding one node per document.
///
/// Empty ids are silent no-ops for every write. Neighbours are followed
/// along edges in either direction.
pub trait GraphStore: Send + Sync {
    fn upsert_document(&self, id: &str, properties: &Metadata) -> Result<(), GraphError>;

    fn relate_documents(&self, src_id: &str, dst_id: &str, rel_type: &str) -> Result<(), GraphError>;

    fn expand(&self, doc_ids: &[String], rel_types: Option<&[String]>) -> Result<ExpansionMap, GraphError>;

    /// [`GraphStore::expand`], with any failure logged and turned into an
    /// empty expansion.
    fn expand_or_empty(&self, doc_ids: &[String], rel_types: Option<&[String]>) -> ExpansionMap {
        match self.expand(doc_ids, rel_types) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "graph expansion failed; continuing without it");
                ExpansionMap::new()
            }
        }
    }
}

/// Destination for query usage events.
pub trait UsageSink: Send + Sync {
    fn record(&self, event: &UsageEvent) -> anyhow::Result<()>;
}
