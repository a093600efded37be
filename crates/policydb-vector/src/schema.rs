use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Chunk table layout. `metadata` holds the flat metadata map as JSON.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("doc_id", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
