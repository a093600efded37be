//! policydb-vector
//!
//! The vector tier: a chunk-level [`VectorIndex`] over pluggable
//! collections, with a LanceDB backend for persistent storage and an
//! in-memory backend for tests.

mod embedding;
pub mod index;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use index::VectorIndex;
pub use lance::{LanceBackend, LanceCollection};
pub use memory::{MemoryBackend, MemoryCollection};
