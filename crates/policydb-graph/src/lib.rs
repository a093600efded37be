//! policydb-graph
//!
//! Document relationship graph: an in-memory petgraph store, a Neo4j HTTP
//! adapter, and ingestion of `relates_to` links from loaded documents.

pub mod ingest;
pub mod memory;
pub mod neo4j;

pub use ingest::{ingest_documents, IngestReport};
pub use memory::{GraphStats, MemoryGraphStore};
pub use neo4j::Neo4jGraphStore;
pub use policydb_core::traits::{ExpansionMap, GraphStore, DEFAULT_REL_TYPE};

/// True for names usable as a relationship type: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_rel_type(rel_type: &str) -> bool {
    let mut chars = rel_type.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::is_valid_rel_type;

    #[test]
    fn rel_type_names() {
        assert!(is_valid_rel_type("RELATES_TO"));
        assert!(is_valid_rel_type("_x1"));
        assert!(!is_valid_rel_type(""));
        assert!(!is_valid_rel_type("1ST"));
        assert!(!is_valid_rel_type("A`]->(x) DETACH DELETE x //"));
    }
}
