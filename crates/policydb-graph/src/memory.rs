//! In-memory document graph using petgraph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use policydb_core::traits::{ExpansionMap, GraphStore};
use policydb_core::{GraphError, Metadata};

use crate::is_valid_rel_type;

#[derive(Debug, Clone)]
struct DocNode {
    id: String,
    properties: Metadata,
}

#[derive(Default)]
struct Inner {
    graph: DiGraph<DocNode, String>,
    node_index: HashMap<String, NodeIndex>,
}

impl Inner {
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(DocNode { id: id.to_string(), properties: Metadata::new() });
        self.node_index.insert(id.to_string(), idx);
        idx
    }
}

/// Deterministic [`GraphStore`] kept entirely in process memory.
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

fn poisoned<T>(_: T) -> GraphError {
    GraphError::Unavailable("memory graph lock poisoned".into())
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Result<GraphStats, GraphError> {
        let inner = self.inner.lock().map_err(poisoned)?;
        Ok(GraphStats { node_count: inner.graph.node_count(), edge_count: inner.graph.edge_count() })
    }

    /// Properties of node `id`, if it exists.
    pub fn node(&self, id: &str) -> Result<Option<Metadata>, GraphError> {
        let inner = self.inner.lock().map_err(poisoned)?;
        Ok(inner.node_index.get(id).map(|&idx| inner.graph[idx].properties.clone()))
    }
}

impl GraphStore for MemoryGraphStore {
    fn upsert_document(&self, id: &str, properties: &Metadata) -> Result<(), GraphError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let idx = inner.ensure_node(id);
        // merge: later properties overwrite, others are kept
        let node = &mut inner.graph[idx];
        node.properties.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn relate_documents(&self, src_id: &str, dst_id: &str, rel_type: &str) -> Result<(), GraphError> {
        let (src_id, dst_id) = (src_id.trim(), dst_id.trim());
        if src_id.is_empty() || dst_id.is_empty() {
            return Ok(());
        }
        if !is_valid_rel_type(rel_type) {
            return Err(GraphError::InvalidRelationship(rel_type.to_string()));
        }
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let a = inner.ensure_node(src_id);
        let b = inner.ensure_node(dst_id);
        let exists = inner.graph.edges_connecting(a, b).any(|e| e.weight() == rel_type);
        if !exists {
            inner.graph.add_edge(a, b, rel_type.to_string());
        }
        Ok(())
    }

    fn expand(&self, doc_ids: &[String], rel_types: Option<&[String]>) -> Result<ExpansionMap, GraphError> {
        let inner = self.inner.lock().map_err(poisoned)?;
        let wanted = |t: &String| rel_types.map_or(true, |types| types.contains(t));
        let mut out = ExpansionMap::new();
        for id in doc_ids {
            let Some(&idx) = inner.node_index.get(id) else { continue };
            let mut neighbours = BTreeSet::new();
            for dir in [Direction::Outgoing, Direction::Incoming] {
                for edge in inner.graph.edges_directed(idx, dir) {
                    if !wanted(edge.weight()) {
                        continue;
                    }
                    let other = if dir == Direction::Outgoing { edge.target() } else { edge.source() };
                    if other != idx {
                        neighbours.insert(inner.graph[other].id.clone());
                    }
                }
            }
            if !neighbours.is_empty() {
                out.insert(id.clone(), neighbours);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_ids_are_silent_noops() {
        let g = MemoryGraphStore::new();
        g.upsert_document("", &Metadata::new()).unwrap();
        g.upsert_document("   ", &Metadata::new()).unwrap();
        g.relate_documents("", "B", "RELATES_TO").unwrap();
        g.relate_documents("A", "", "RELATES_TO").unwrap();
        assert_eq!(g.stats().unwrap(), GraphStats { node_count: 0, edge_count: 0 });
    }

    #[test]
    fn relating_twice_creates_one_edge() {
        let g = MemoryGraphStore::new();
        g.relate_documents("A", "B", "RELATES_TO").unwrap();
        g.relate_documents("A", "B", "RELATES_TO").unwrap();
        assert_eq!(g.stats().unwrap(), GraphStats { node_count: 2, edge_count: 1 });
        g.relate_documents("A", "B", "SUPERSEDES").unwrap();
        assert_eq!(g.stats().unwrap().edge_count, 2);
    }

    #[test]
    fn upsert_merges_properties() {
        let g = MemoryGraphStore::new();
        let mut p = Metadata::new();
        p.insert("title".into(), json!("Old"));
        p.insert("type".into(), json!("policy"));
        g.upsert_document("A", &p).unwrap();
        let mut p = Metadata::new();
        p.insert("title".into(), json!("New"));
        g.upsert_document("A", &p).unwrap();
        let props = g.node("A").unwrap().unwrap();
        assert_eq!(props["title"], json!("New"));
        assert_eq!(props["type"], json!("policy"));
        assert_eq!(g.stats().unwrap().node_count, 1);
    }

    #[test]
    fn expand_is_one_hop_both_directions() {
        let g = MemoryGraphStore::new();
        g.relate_documents("A", "B", "RELATES_TO").unwrap();
        g.relate_documents("C", "A", "RELATES_TO").unwrap();
        g.relate_documents("B", "D", "RELATES_TO").unwrap();
        g.relate_documents("A", "E", "SUPERSEDES").unwrap();

        let map = g.expand(&ids(&["A", "Z"]), None).unwrap();
        assert_eq!(map.len(), 1, "ids without neighbours are absent");
        let expected: BTreeSet<String> = ["B", "C", "E"].iter().map(|s| s.to_string()).collect();
        assert_eq!(map["A"], expected);

        let only = ids(&["SUPERSEDES"]);
        let map = g.expand(&ids(&["A"]), Some(only.as_slice())).unwrap();
        assert_eq!(map["A"].len(), 1);
        assert!(map["A"].contains("E"));
    }

    #[test]
    fn invalid_rel_type_is_rejected() {
        let g = MemoryGraphStore::new();
        let err = g.relate_documents("A", "B", "bad type").unwrap_err();
        assert!(matches!(err, GraphError::InvalidRelationship(_)));
    }
}
