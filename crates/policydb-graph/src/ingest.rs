//! Populate a [`GraphStore`] from loaded documents.

use serde::{Deserialize, Serialize};

use policydb_core::traits::{GraphStore, DEFAULT_REL_TYPE};
use policydb_core::{Document, GraphError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub nodes: usize,
    pub edges: usize,
}

/// Upsert one node per document and one `RELATES_TO` edge per `relates_to`
/// entry. Documents may arrive in any order; edge targets that are not
/// loaded yet are created as bare nodes.
pub fn ingest_documents<G>(store: &G, documents: &[Document]) -> Result<IngestReport, GraphError>
where
    G: GraphStore + ?Sized,
{
    let mut report = IngestReport::default();
    for doc in documents {
        let id = doc.doc_id();
        if id.is_empty() {
            tracing::warn!(path = %doc.source_path.display(), "document has no id; skipping graph ingest");
            continue;
        }
        store.upsert_document(&id, &doc.metadata)?;
        report.nodes += 1;
        for target in doc.relates_to() {
            if target == id {
                continue;
            }
            store.relate_documents(&id, &target, DEFAULT_REL_TYPE)?;
            report.edges += 1;
        }
    }
    tracing::info!(nodes = report.nodes, edges = report.edges, "ingested documents into graph");
    Ok(report)
}
