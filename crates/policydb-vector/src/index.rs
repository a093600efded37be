//! Chunk-level facade over a [`VectorCollection`].

use std::collections::BTreeMap;

use policydb_core::chunker::Chunker;
use policydb_core::metadata::flatten_metadata;
use policydb_core::traits::{VectorBackend, VectorCollection};
use policydb_core::{Chunk, Document, Filters, IndexedRecord, RetrievalResult, Scalar, VectorError};

pub struct VectorIndex<C> {
    collection: C,
}

impl<C: VectorCollection> VectorIndex<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    /// Get or create the collection `name` on `backend`.
    pub fn open<B>(backend: &B, name: &str) -> Result<Self, VectorError>
    where
        B: VectorBackend<Collection = C>,
    {
        Ok(Self::new(backend.create_collection(name)?))
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Write chunks under `{doc_id}_{chunk_index}`, overwriting existing ids.
    /// Returns the number of records written.
    pub fn add(&self, chunks: &[Chunk]) -> Result<usize, VectorError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        // last write wins for ids repeated within one call
        let mut records: BTreeMap<String, IndexedRecord> = BTreeMap::new();
        for chunk in chunks {
            let mut metadata = flatten_metadata(&chunk.metadata);
            metadata.insert("doc_id".to_string(), Scalar::Str(chunk.doc_id()));
            let id = chunk.record_id();
            let record = IndexedRecord { id: id.clone(), text: chunk.text.clone(), metadata };
            if let Some(previous) = records.insert(id.clone(), record) {
                let (old_path, new_path) = (previous.metadata.get("file_path"), records[&id].metadata.get("file_path"));
                if old_path != new_path {
                    tracing::warn!(
                        record_id = %id,
                        previous = ?old_path,
                        replacement = ?new_path,
                        "two files share a document id; the later one overwrites the earlier"
                    );
                }
            }
        }
        let records: Vec<IndexedRecord> = records.into_values().collect();
        let written = self.collection.add(&records)?;
        tracing::info!(collection = self.collection.name(), written, "indexed chunks");
        Ok(written)
    }

    /// Chunk and index every document.
    pub fn index_documents(&self, documents: &[Document], chunker: &Chunker) -> Result<usize, VectorError> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| chunker.chunk(d)).collect();
        self.add(&chunks)
    }

    pub fn count(&self) -> Result<usize, VectorError> {
        self.collection.count()
    }

    /// Irreversibly delete every record in the collection.
    pub fn clear(&self) -> Result<(), VectorError> {
        tracing::warn!(collection = self.collection.name(), "clearing vector collection");
        self.collection.reset()
    }

    pub fn query(&self, text: &str, n_results: usize, filters: &Filters) -> Result<Vec<RetrievalResult>, VectorError> {
        self.collection.query(text, n_results, filters)
    }
}
