//! policydb-hybrid
//!
//! Read path: the vector [`Retriever`], the graph-augmented
//! [`HybridRetriever`], the usage log, and settings-driven wiring.

pub mod hybrid;
pub mod pipeline;
pub mod retriever;
pub mod usage_log;

pub use hybrid::HybridRetriever;
pub use pipeline::{graph_store_from_settings, ingest_corpus, open_default_hybrid_retriever, open_hybrid_retriever, open_vector_index};
pub use policydb_core::citation::{format_citation, format_context};
pub use retriever::Retriever;
pub use usage_log::JsonlUsageLog;
