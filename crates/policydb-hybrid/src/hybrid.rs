//! Vector retrieval augmented with one hop of document-graph expansion.
//!
//! The vector tier is mandatory and its errors propagate. The graph tier is
//! optional: when it is absent, disabled, or failing, callers get the plain
//! vector results.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use policydb_core::config::RetrievalSettings;
use policydb_core::traits::{ExpansionMap, GraphStore, VectorCollection};
use policydb_core::{Filters, HybridResult, Scalar, SourceKind, VectorError};

use crate::retriever::Retriever;

pub struct HybridRetriever<C> {
    retriever: Retriever<C>,
    graph: Option<Arc<dyn GraphStore>>,
    settings: RetrievalSettings,
}

impl<C: VectorCollection> HybridRetriever<C> {
    pub fn new(retriever: Retriever<C>, graph: Option<Arc<dyn GraphStore>>, settings: RetrievalSettings) -> Self {
        Self { retriever, graph, settings }
    }

    pub fn retriever(&self) -> &Retriever<C> {
        &self.retriever
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Vector hits plus chunks of their graph neighbours, ascending by score.
    pub fn query(&self, text: &str, top_k: usize, filters: &Filters) -> Result<Vec<HybridResult>, VectorError> {
        let mut graph_used = false;
        let outcome = self.run(text, top_k, filters, &mut graph_used);
        self.retriever.log_usage(text, top_k, filters, graph_used);
        outcome
    }

    fn run(&self, text: &str, top_k: usize, filters: &Filters, graph_used: &mut bool) -> Result<Vec<HybridResult>, VectorError> {
        let hits = self.retriever.search(text, top_k, filters)?;
        let mut results: Vec<HybridResult> =
            hits.into_iter().map(|h| HybridResult::from_retrieval(h, SourceKind::Vector)).collect();

        // distinct doc ids, first-seen order
        let mut vector_docs: Vec<String> = Vec::new();
        for doc in results.iter().filter_map(HybridResult::doc_id) {
            if !vector_docs.iter().any(|d| d == doc) {
                vector_docs.push(doc.to_string());
            }
        }

        if let Some(graph) = self.graph.as_ref().filter(|_| self.settings.expand_graph && !vector_docs.is_empty()) {
            match graph.expand(&vector_docs, self.settings.rel_types.as_deref()) {
                Ok(expansion) => {
                    *graph_used = true;
                    let extra = self.graph_results(graph.as_ref(), &mut results, &vector_docs, &expansion)?;
                    results.extend(extra);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "graph expansion unavailable; returning vector results only");
                }
            }
        }

        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        Ok(results)
    }

    /// Annotate vector results with their neighbourhood and fetch chunks of
    /// newly discovered documents.
    fn graph_results(
        &self,
        graph: &dyn GraphStore,
        results: &mut [HybridResult],
        vector_docs: &[String],
        expansion: &ExpansionMap,
    ) -> Result<Vec<HybridResult>, VectorError> {
        let neighbours: BTreeSet<&String> = expansion.values().flatten().collect();

        for r in results.iter_mut() {
            let Some(doc) = r.doc_id().map(str::to_string) else { continue };
            if let Some(ns) = expansion.get(&doc) {
                r.related_docs = ns.iter().cloned().collect();
            }
            if neighbours.contains(&doc) {
                r.source = SourceKind::Both;
            }
        }

        let vector_set: HashSet<&str> = vector_docs.iter().map(String::as_str).collect();
        let new_docs: Vec<String> =
            neighbours.into_iter().filter(|d| !vector_set.contains(d.as_str())).cloned().collect();
        if new_docs.is_empty() || self.settings.graph_chunks_per_doc == 0 {
            return Ok(Vec::new());
        }

        // related_docs of a graph chunk is the full one-hop neighbourhood of
        // its document; the sources alone stand in when that lookup fails
        let second_hop = graph.expand_or_empty(&new_docs, self.settings.rel_types.as_deref());
        let mut seen: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
        let mut extra = Vec::new();

        for new_doc in &new_docs {
            let mut only_doc = Filters::new();
            only_doc.insert("doc_id".to_string(), Scalar::Str(new_doc.clone()));
            let hits = self.retriever.index().query(new_doc, self.settings.graph_chunks_per_doc, &only_doc)?;

            let mut related: BTreeSet<String> = vector_docs
                .iter()
                .filter(|d| expansion.get(*d).is_some_and(|ns| ns.contains(new_doc)))
                .cloned()
                .collect();
            if let Some(ns) = second_hop.get(new_doc) {
                related.extend(ns.iter().cloned());
            }
            let related: Vec<String> = related.into_iter().collect();
            for hit in hits {
                if !seen.insert(hit.id.clone()) {
                    continue;
                }
                let mut r = HybridResult::from_retrieval(hit, SourceKind::Graph);
                r.score += self.settings.graph_score_penalty;
                r.related_docs = related.clone();
                extra.push(r);
            }
        }
        tracing::debug!(expanded = expansion.len(), graph_chunks = extra.len(), "graph expansion");
        Ok(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policydb_core::traits::GraphStore;
    use policydb_core::{GraphError, Metadata};
    use policydb_embed::ByteSumEmbedder;
    use policydb_vector::{MemoryBackend, MemoryCollection, VectorIndex};
    use tracing_test::traced_test;

    struct DownGraph;
    impl GraphStore for DownGraph {
        fn upsert_document(&self, _: &str, _: &Metadata) -> Result<(), GraphError> {
            Err(GraphError::Unavailable("connection refused".into()))
        }
        fn relate_documents(&self, _: &str, _: &str, _: &str) -> Result<(), GraphError> {
            Err(GraphError::Unavailable("connection refused".into()))
        }
        fn expand(&self, _: &[String], _: Option<&[String]>) -> Result<ExpansionMap, GraphError> {
            Err(GraphError::Unavailable("connection refused".into()))
        }
    }

    fn hybrid(graph: Option<Arc<dyn GraphStore>>) -> HybridRetriever<MemoryCollection> {
        let backend = MemoryBackend::new(Arc::new(ByteSumEmbedder::new(16)));
        let index = VectorIndex::open(&backend, "t").unwrap();
        let chunks = policydb_core::chunker::chunk_document("## A\nalpha\n", &{
            let mut m = Metadata::new();
            m.insert("id".into(), serde_json::json!("G-1"));
            m
        });
        index.add(&chunks).unwrap();
        HybridRetriever::new(Retriever::new(index, None), graph, RetrievalSettings::default())
    }

    #[traced_test]
    #[test]
    fn graph_failure_degrades_with_warning() {
        let h = hybrid(Some(Arc::new(DownGraph)));
        let results = h.query("alpha", 3, &Filters::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, SourceKind::Vector);
        assert!(logs_contain("graph expansion unavailable"));
    }

    #[test]
    fn default_settings_expand_with_penalty() {
        let h = hybrid(None);
        let s = h.settings();
        assert!(s.expand_graph);
        assert!((s.graph_score_penalty - 0.1).abs() < f32::EPSILON);
        assert_eq!(s.graph_chunks_per_doc, 2);
    }
}
