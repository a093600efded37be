//! In-process vector backend: brute-force squared Euclidean distance over an
//! id-keyed map. Deterministic and ephemeral.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use policydb_core::metadata::matches_filters;
use policydb_core::traits::{Embedder, VectorBackend, VectorCollection};
use policydb_core::{Filters, IndexedRecord, RetrievalResult, VectorError};

use crate::embedding::{embed_checked, embed_one};

type Store = Arc<RwLock<BTreeMap<String, (IndexedRecord, Vec<f32>)>>>;

fn poisoned<T>(_: T) -> VectorError {
    VectorError::Backend("memory collection lock poisoned".into())
}

pub struct MemoryBackend {
    collections: Mutex<HashMap<String, Store>>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryBackend {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { collections: Mutex::new(HashMap::new()), embedder }
    }
}

impl VectorBackend for MemoryBackend {
    type Collection = MemoryCollection;

    /// Returns a handle to the existing collection when `name` is taken.
    fn create_collection(&self, name: &str) -> Result<MemoryCollection, VectorError> {
        let mut collections = self.collections.lock().map_err(poisoned)?;
        let store = collections.entry(name.to_string()).or_default().clone();
        Ok(MemoryCollection { name: name.to_string(), store, embedder: self.embedder.clone() })
    }

    fn delete_collection(&self, name: &str) -> Result<(), VectorError> {
        let removed = self.collections.lock().map_err(poisoned)?.remove(name);
        if let Some(store) = removed {
            store.write().map_err(poisoned)?.clear();
        }
        Ok(())
    }
}

pub struct MemoryCollection {
    name: String,
    store: Store,
    embedder: Arc<dyn Embedder>,
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&self, records: &[IndexedRecord]) -> Result<usize, VectorError> {
        if records.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = embed_checked(self.embedder.as_ref(), &texts)?;
        let mut store = self.store.write().map_err(poisoned)?;
        for (record, vector) in records.iter().zip(vectors) {
            store.insert(record.id.clone(), (record.clone(), vector));
        }
        Ok(records.len())
    }

    fn query(&self, text: &str, n_results: usize, filters: &Filters) -> Result<Vec<RetrievalResult>, VectorError> {
        if n_results == 0 {
            return Ok(Vec::new());
        }
        let query = embed_one(self.embedder.as_ref(), text)?;
        let store = self.store.read().map_err(poisoned)?;
        let mut hits: Vec<RetrievalResult> = store
            .values()
            .filter(|(record, _)| matches_filters(&record.metadata, filters))
            .map(|(record, vector)| RetrievalResult {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: squared_l2(&query, vector),
            })
            .collect();
        hits.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(n_results);
        Ok(hits)
    }

    fn count(&self) -> Result<usize, VectorError> {
        Ok(self.store.read().map_err(poisoned)?.len())
    }

    fn reset(&self) -> Result<(), VectorError> {
        self.store.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
