//! Wiring from [`Settings`] to concrete backends.

use anyhow::Result;
use std::sync::Arc;

use policydb_core::chunker::Chunker;
use policydb_core::config::{GraphSettings, Settings};
use policydb_core::traits::{Embedder, GraphStore, UsageSink};
use policydb_core::{Document, GraphError};
use policydb_graph::{ingest_documents, IngestReport, Neo4jGraphStore};
use policydb_vector::{LanceBackend, LanceCollection, VectorIndex};

use crate::hybrid::HybridRetriever;
use crate::retriever::Retriever;
use crate::usage_log::JsonlUsageLog;

/// The Neo4j store when `graph.uri` is set, `None` when it is not.
/// A uri without credentials is a configuration error.
pub fn graph_store_from_settings(settings: &GraphSettings) -> Result<Option<Arc<dyn GraphStore>>, GraphError> {
    if settings.uri.as_deref().map_or(true, |u| u.trim().is_empty()) {
        tracing::info!("no graph uri configured; graph expansion disabled");
        return Ok(None);
    }
    Ok(Some(Arc::new(Neo4jGraphStore::from_settings(settings)?)))
}

pub fn usage_sink_from_settings(settings: &Settings) -> Option<Arc<dyn UsageSink>> {
    let path = settings.usage_log.resolved_path()?;
    Some(Arc::new(JsonlUsageLog::new(Some(path))))
}

pub fn open_vector_index(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<VectorIndex<LanceCollection>> {
    let backend = LanceBackend::open(&settings.vector.resolved_path(), embedder)?;
    Ok(VectorIndex::open(&backend, &settings.vector.collection)?)
}

/// Lance-backed hybrid retriever, with Neo4j expansion when configured.
pub fn open_hybrid_retriever(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<HybridRetriever<LanceCollection>> {
    let index = open_vector_index(settings, embedder)?;
    let graph = graph_store_from_settings(&settings.graph)?;
    let retriever = Retriever::new(index, usage_sink_from_settings(settings));
    Ok(HybridRetriever::new(retriever, graph, settings.retrieval.clone()))
}

/// [`open_hybrid_retriever`] with [`policydb_embed::get_default_embedder`].
pub fn open_default_hybrid_retriever(settings: &Settings) -> Result<HybridRetriever<LanceCollection>> {
    open_hybrid_retriever(settings, policydb_embed::get_default_embedder()?)
}

/// Write path: chunk and index `documents`, then populate the graph.
/// Returns `(chunks written, graph report)`.
pub fn ingest_corpus(
    index: &VectorIndex<LanceCollection>,
    graph: Option<&dyn GraphStore>,
    documents: &[Document],
    settings: &Settings,
) -> Result<(usize, Option<IngestReport>)> {
    let chunker = Chunker::new(settings.chunking.mode());
    let written = index.index_documents(documents, &chunker)?;
    let report = match graph {
        Some(store) => Some(ingest_documents(store, documents)?),
        None => None,
    };
    Ok((written, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_uri_means_no_graph() {
        assert!(graph_store_from_settings(&GraphSettings::default()).unwrap().is_none());
    }

    #[test]
    fn uri_without_password_is_invalid() {
        let settings = GraphSettings {
            uri: Some("http://localhost:7474".into()),
            user: Some("neo4j".into()),
            ..GraphSettings::default()
        };
        let err = graph_store_from_settings(&settings).err().expect("error");
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }
}
