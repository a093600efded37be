use std::sync::Arc;

use policydb_core::chunker::{chunk_document, Chunker};
use policydb_core::loader::load_document;
use policydb_core::traits::{VectorBackend, VectorCollection};
use policydb_core::{Chunk, Filters, Metadata, Scalar};
use policydb_embed::ByteSumEmbedder;
use policydb_vector::{LanceBackend, MemoryBackend, VectorIndex};
use serde_json::json;
use tempfile::TempDir;

fn doc_chunks(id: &str, content: &str) -> Vec<Chunk> {
    let mut base = Metadata::new();
    base.insert("id".into(), json!(id));
    base.insert("type".into(), json!("policy"));
    base.insert("relates_to".into(), json!(["G-9"]));
    base.insert("file_path".into(), json!(format!("docs/{id}.md")));
    chunk_document(content, &base)
}

fn three_chunks() -> Vec<Chunk> {
    doc_chunks("G-1", "## Purpose\nProtect customer data.\n\n## Scope\nAll production systems.\n\n## Owner\nSecurity team.\n")
}

fn exercise<C: VectorCollection>(index: &VectorIndex<C>) {
    assert_eq!(index.add(&[]).unwrap(), 0);
    assert_eq!(index.count().unwrap(), 0);

    let chunks = three_chunks();
    assert_eq!(index.add(&chunks).unwrap(), 3);
    assert_eq!(index.count().unwrap(), 3);

    // same ids overwrite
    assert_eq!(index.add(&chunks).unwrap(), 3);
    assert_eq!(index.count().unwrap(), 3);

    let hits = index.query("## Scope\nAll production systems.", 3, &Filters::new()).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "G-1_1");
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score), "ascending distance");
    assert_eq!(hits[0].metadata.get("doc_id"), Some(&Scalar::from("G-1")));
    assert_eq!(hits[0].metadata.get("section"), Some(&Scalar::from("Scope")));
    assert_eq!(hits[0].metadata.get("relates_to"), Some(&Scalar::from("[\"G-9\"]")));
    assert_eq!(hits[0].metadata.get("chunk_index"), Some(&Scalar::Int(1)));

    let mut filters = Filters::new();
    filters.insert("section".into(), Scalar::from("Owner"));
    let owner = index.query("anything", 5, &filters).unwrap();
    assert_eq!(owner.len(), 1);
    assert_eq!(owner[0].id, "G-1_2");

    let mut filters = Filters::new();
    filters.insert("doc_id".into(), Scalar::from("G-404"));
    assert!(index.query("anything", 5, &filters).unwrap().is_empty());

    index.clear().unwrap();
    assert_eq!(index.count().unwrap(), 0);
    assert!(index.query("Protect", 3, &Filters::new()).unwrap().is_empty());
}

#[test]
fn memory_full_flow() {
    let backend = MemoryBackend::new(Arc::new(ByteSumEmbedder::new(32)));
    let index = VectorIndex::open(&backend, "governance_docs").unwrap();
    exercise(&index);
}

#[test]
fn lancedb_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(32))).expect("backend");
    let index = VectorIndex::open(&backend, "governance_docs_test").expect("index");
    exercise(&index);
}

#[test]
fn lancedb_persists_across_handles() {
    let tmp = TempDir::new().expect("tmp");
    {
        let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(32))).unwrap();
        let index = VectorIndex::open(&backend, "persist").unwrap();
        index.add(&three_chunks()).unwrap();
    }
    let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(32))).unwrap();
    let index = VectorIndex::open(&backend, "persist").unwrap();
    assert_eq!(index.count().unwrap(), 3);
    let mut filters = Filters::new();
    filters.insert("doc_id".into(), Scalar::from("G-1"));
    assert_eq!(index.query("G-1", 2, &filters).unwrap().len(), 2);
}

#[test]
fn index_documents_from_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("adr-7.md");
    std::fs::write(&path, "---\ntitle: Use Lance\n---\n## Context\nWe need vectors.\n\n## Decision\nUse Lance.\n").unwrap();
    let doc = load_document(&path).unwrap();

    let backend = MemoryBackend::new(Arc::new(ByteSumEmbedder::default()));
    let index = VectorIndex::open(&backend, "docs").unwrap();
    assert_eq!(index.index_documents(&[doc], &Chunker::default()).unwrap(), 2);

    let hits = index.query("Use Lance", 1, &Filters::new()).unwrap();
    // no front-matter id: the file stem names the document
    assert_eq!(hits[0].metadata.get("doc_id"), Some(&Scalar::from("adr-7")));
    assert!(hits[0].id.starts_with("adr-7_"));
}

fn typed_corpus() -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = (0..30)
        .flat_map(|i| {
            let mut base = Metadata::new();
            base.insert("id".into(), json!(format!("P-{i}")));
            base.insert("type".into(), json!("policy"));
            chunk_document(&format!("## Access\naccess control {i}"), &base)
        })
        .collect();
    let mut adr = Metadata::new();
    adr.insert("id".into(), json!("ADR-1"));
    adr.insert("type".into(), json!("adr"));
    chunks.extend(chunk_document("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz", &adr));
    chunks
}

fn filtered_match_outside_first_window<C: VectorCollection>(index: &VectorIndex<C>) {
    assert_eq!(index.add(&typed_corpus()).unwrap(), 31);

    let mut adr = Filters::new();
    adr.insert("type".into(), Scalar::from("adr"));
    let hits = index.query("access control", 1, &adr).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "ADR-1_0");

    let mut policy = Filters::new();
    policy.insert("type".into(), Scalar::from("policy"));
    let hits = index.query("access control", 3, &policy).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.metadata.get("type") == Some(&Scalar::from("policy"))));
}

#[test]
fn memory_filter_reaches_far_matches() {
    let backend = MemoryBackend::new(Arc::new(ByteSumEmbedder::new(32)));
    filtered_match_outside_first_window(&VectorIndex::open(&backend, "typed").unwrap());
}

#[test]
fn lancedb_filter_reaches_far_matches() {
    let tmp = TempDir::new().unwrap();
    let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(32))).unwrap();
    filtered_match_outside_first_window(&VectorIndex::open(&backend, "typed").unwrap());
}

#[test]
fn lancedb_delete_collection_drops_the_table() {
    let tmp = TempDir::new().unwrap();
    {
        let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(32))).unwrap();
        VectorIndex::open(&backend, "docs").unwrap().add(&three_chunks()).unwrap();
        backend.delete_collection("docs").unwrap();
        // missing collections are fine
        backend.delete_collection("never-created").unwrap();
    }

    // a different embedding width gets a fresh table
    let backend = LanceBackend::open(tmp.path(), Arc::new(ByteSumEmbedder::new(16))).unwrap();
    let index = VectorIndex::open(&backend, "docs").unwrap();
    assert_eq!(index.count().unwrap(), 0);
    assert_eq!(index.add(&three_chunks()).unwrap(), 3);
    assert_eq!(index.query("Security team.", 1, &Filters::new()).unwrap().len(), 1);

    // clearing also recreates the table
    index.clear().unwrap();
    assert_eq!(index.count().unwrap(), 0);
    assert_eq!(index.add(&three_chunks()).unwrap(), 3);
}
