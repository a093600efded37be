//! Vector-only retrieval with usage logging.

use std::sync::Arc;

use policydb_core::traits::{UsageSink, VectorCollection};
use policydb_core::{Filters, RetrievalResult, UsageEvent, VectorError};
use policydb_vector::VectorIndex;

pub struct Retriever<C> {
    index: VectorIndex<C>,
    usage: Option<Arc<dyn UsageSink>>,
}

impl<C: VectorCollection> Retriever<C> {
    /// `usage` may be `None`: queries then go unlogged.
    pub fn new(index: VectorIndex<C>, usage: Option<Arc<dyn UsageSink>>) -> Self {
        Self { index, usage }
    }

    pub fn index(&self) -> &VectorIndex<C> {
        &self.index
    }

    /// Up to `top_k` results in ascending score order. Blank text returns
    /// nothing. Every call is logged, whether it succeeds or not.
    pub fn query(&self, text: &str, top_k: usize, filters: &Filters) -> Result<Vec<RetrievalResult>, VectorError> {
        let result = self.search(text, top_k, filters);
        self.log_usage(text, top_k, filters, false);
        result
    }

    pub(crate) fn search(&self, text: &str, top_k: usize, filters: &Filters) -> Result<Vec<RetrievalResult>, VectorError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.index.query(text, top_k, filters)?;
        tracing::debug!(query = text, top_k, hits = hits.len(), "vector query");
        Ok(hits)
    }

    pub(crate) fn log_usage(&self, text: &str, top_k: usize, filters: &Filters, graph_expansion: bool) {
        let Some(sink) = &self.usage else { return };
        let event = UsageEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            query: text.to_string(),
            top_k,
            filters: filters.clone(),
            graph_expansion,
        };
        if let Err(e) = sink.record(&event) {
            tracing::warn!(error = %e, "failed to write usage event");
        }
    }
}
