//! LanceDB adapter for the vector tier.
//!
//! The traits are synchronous; each backend owns a tokio runtime and blocks
//! on the async lancedb calls. Do not call these from inside another tokio
//! runtime.

use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};

use policydb_core::metadata::matches_filters;
use policydb_core::traits::{Embedder, VectorBackend, VectorCollection};
use policydb_core::{Filters, FlatMetadata, IndexedRecord, RetrievalResult, Scalar, VectorError};

use crate::embedding::{embed_checked, embed_one};
use crate::schema::build_chunk_schema;
use crate::table::{ensure_table, open_db, table_exists};

/// Initial oversampling factor when filters must be applied after the search;
/// the window grows by this factor until enough rows match or the table is
/// exhausted.
const OVERSAMPLE: usize = 10;
const WRITE_BATCH: usize = 1000;

pub struct LanceBackend {
	rt: Arc<Runtime>,
	db: Connection,
	embedder: Arc<dyn Embedder>,
}

impl LanceBackend {
	pub fn open(db_path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, VectorError> {
		let rt = Arc::new(Runtime::new()?);
		let db = rt.block_on(open_db(db_path.to_string_lossy().as_ref()))?;
		tracing::debug!(path = %db_path.display(), dim = embedder.dim(), "opened lance backend");
		Ok(Self { rt, db, embedder })
	}

	/// Open with [`policydb_embed::get_default_embedder`].
	pub fn open_default(db_path: &Path) -> Result<Self, VectorError> {
		Self::open(db_path, policydb_embed::get_default_embedder()?)
	}
}

impl VectorBackend for LanceBackend {
	type Collection = LanceCollection;

	fn create_collection(&self, name: &str) -> Result<LanceCollection, VectorError> {
		let schema = build_chunk_schema(self.embedder.dim() as i32);
		self.rt.block_on(ensure_table(&self.db, name, schema))?;
		Ok(LanceCollection {
			rt: self.rt.clone(),
			db: self.db.clone(),
			name: name.to_string(),
			embedder: self.embedder.clone(),
		})
	}

	fn delete_collection(&self, name: &str) -> Result<(), VectorError> {
		self.rt.block_on(drop_if_exists(&self.db, name))
	}
}

/// Drop the table so the next `ensure_table` recreates it with the current
/// schema (and vector width).
async fn drop_if_exists(db: &Connection, name: &str) -> Result<(), VectorError> {
	if !table_exists(db, name).await? {
		return Ok(());
	}
	db.drop_table(name, &[]).await.map_err(VectorError::backend)?;
	tracing::info!(table = name, "dropped lance table");
	Ok(())
}

pub struct LanceCollection {
	rt: Arc<Runtime>,
	db: Connection,
	name: String,
	embedder: Arc<dyn Embedder>,
}

impl LanceCollection {
	async fn table(&self) -> Result<Table, VectorError> {
		let schema = build_chunk_schema(self.embedder.dim() as i32);
		ensure_table(&self.db, &self.name, schema).await?;
		self.db.open_table(&self.name).execute().await.map_err(VectorError::backend)
	}

	fn records_to_batch(&self, records: &[IndexedRecord], vectors: Vec<Vec<f32>>) -> Result<RecordBatch, VectorError> {
		let dim = self.embedder.dim() as i32;
		let schema = build_chunk_schema(dim);
		let mut ids = Vec::new(); let mut doc_ids = Vec::new(); let mut texts = Vec::new(); let mut metas = Vec::new();
		for r in records {
			ids.push(r.id.clone());
			doc_ids.push(r.metadata.get("doc_id").map(Scalar::to_string).unwrap_or_default());
			texts.push(r.text.clone());
			metas.push(serde_json::to_string(&r.metadata).map_err(VectorError::backend)?);
		}
		let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
		RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
		])
		.map_err(VectorError::backend)
	}

	async fn upsert(&self, table: &Table, batch: RecordBatch) -> Result<(), VectorError> {
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		// Upsert behavior via merge_insert: id is unique
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await.map_err(VectorError::backend)?;
		Ok(())
	}

	/// One nearest-neighbour pass over at most `limit` rows, keeping the rows
	/// that satisfy `post_filter`.
	async fn search(
		&self,
		table: &Table,
		query_vec: &[f32],
		limit: usize,
		pushed: Option<&str>,
		post_filter: Option<&Filters>,
	) -> Result<Vec<RetrievalResult>, VectorError> {
		let mut search = table.vector_search(query_vec.to_vec()).map_err(VectorError::backend)?.limit(limit);
		if let Some(predicate) = pushed {
			search = search.only_if(predicate);
		}
		let mut stream = search.execute().await.map_err(VectorError::backend)?;

		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(VectorError::backend)? {
			let ids = string_column(&batch, "id")?;
			let texts = string_column(&batch, "text")?;
			let metas = string_column(&batch, "metadata")?;
			let distances = batch
				.column_by_name("_distance")
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| VectorError::Backend("lance result has no _distance column".into()))?;
			for i in 0..batch.num_rows() {
				let metadata: FlatMetadata = serde_json::from_str(metas.value(i)).map_err(VectorError::backend)?;
				if post_filter.is_some_and(|f| !matches_filters(&metadata, f)) {
					continue;
				}
				hits.push(RetrievalResult {
					id: ids.value(i).to_string(),
					text: texts.value(i).to_string(),
					metadata,
					score: distances.value(i),
				});
			}
		}
		Ok(hits)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, VectorError> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| VectorError::Backend(format!("lance column '{name}' missing or not utf8")))
}

fn escape_literal(s: &str) -> String {
	s.replace('\'', "''")
}

impl VectorCollection for LanceCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn add(&self, records: &[IndexedRecord]) -> Result<usize, VectorError> {
		if records.is_empty() {
			return Ok(0);
		}
		self.rt.block_on(async {
			let table = self.table().await?;
			for part in records.chunks(WRITE_BATCH) {
				let texts: Vec<String> = part.iter().map(|r| r.text.clone()).collect();
				let vectors = embed_checked(self.embedder.as_ref(), &texts)?;
				let batch = self.records_to_batch(part, vectors)?;
				self.upsert(&table, batch).await?;
			}
			tracing::debug!(table = %self.name, records = records.len(), "upserted records");
			Ok(records.len())
		})
	}

	fn query(&self, text: &str, n_results: usize, filters: &Filters) -> Result<Vec<RetrievalResult>, VectorError> {
		if n_results == 0 {
			return Ok(Vec::new());
		}
		let query_vec = embed_one(self.embedder.as_ref(), text)?;

		// doc_id equality is pushed down; anything else is checked afterwards
		let pushed = match filters.get("doc_id") {
			Some(Scalar::Str(id)) => Some(format!("doc_id = '{}'", escape_literal(id))),
			_ => None,
		};
		let post_filter = filters.keys().any(|k| k != "doc_id") || (filters.contains_key("doc_id") && pushed.is_none());

		self.rt.block_on(async {
			let table = self.table().await?;
			let total = table.count_rows(None).await.map_err(VectorError::backend)?;
			if total == 0 {
				return Ok(Vec::new());
			}
			let mut limit = (if post_filter { n_results.saturating_mul(OVERSAMPLE) } else { n_results }).min(total);
			loop {
				let mut hits = self.search(&table, &query_vec, limit, pushed.as_deref(), post_filter.then_some(filters)).await?;
				// a pushed-down filter already ranks only matching rows; a window
				// covering the whole table has seen every candidate
				if !post_filter || hits.len() >= n_results || limit >= total {
					hits.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.id.cmp(&b.id)));
					hits.truncate(n_results);
					return Ok(hits);
				}
				tracing::debug!(table = %self.name, limit, matched = hits.len(), "widening filtered search");
				limit = limit.saturating_mul(OVERSAMPLE).min(total);
			}
		})
	}

	fn count(&self) -> Result<usize, VectorError> {
		self.rt.block_on(async {
			let table = self.table().await?;
			table.count_rows(None).await.map_err(VectorError::backend)
		})
	}

	/// Drop and recreate the table.
	fn reset(&self) -> Result<(), VectorError> {
		self.rt.block_on(async {
			drop_if_exists(&self.db, &self.name).await?;
			self.table().await?;
			Ok(())
		})
	}
}
