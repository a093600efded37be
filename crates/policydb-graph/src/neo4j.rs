//! Neo4j adapter over the HTTP transactional Cypher endpoint
//! (`POST {uri}/db/{database}/tx/commit`).
//!
//! Every call is a single auto-committed transaction. Like the Lance
//! backend, the client owns a tokio runtime and blocks on each request.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::runtime::Runtime;

use policydb_core::config::GraphSettings;
use policydb_core::metadata::flatten_metadata;
use policydb_core::traits::{ExpansionMap, GraphStore};
use policydb_core::{GraphError, Metadata};

use crate::is_valid_rel_type;

const UPSERT_DOCUMENT: &str = "MERGE (d:Document {id: $id}) SET d += $props";
const EXPAND: &str = "MATCH (d:Document)-[r]-(n:Document) \
     WHERE d.id IN $ids AND ($types IS NULL OR type(r) IN $types) AND n.id <> d.id \
     RETURN d.id AS src, collect(DISTINCT n.id) AS neighbours";

pub struct Neo4jGraphStore {
    rt: Runtime,
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub(crate) fn relate_statement(rel_type: &str) -> Result<String, GraphError> {
    if !is_valid_rel_type(rel_type) {
        return Err(GraphError::InvalidRelationship(rel_type.to_string()));
    }
    Ok(format!(
        "MERGE (a:Document {{id: $src}}) MERGE (b:Document {{id: $dst}}) MERGE (a)-[:`{rel_type}`]->(b)"
    ))
}

fn parse_expansion(response: TxResponse) -> ExpansionMap {
    let mut out = ExpansionMap::new();
    for row in response.results.into_iter().flat_map(|r| r.data) {
        let (Some(Value::String(src)), Some(Value::Array(ns))) = (row.row.first(), row.row.get(1)) else {
            continue;
        };
        let neighbours: BTreeSet<String> = ns.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        if !neighbours.is_empty() {
            out.entry(src.clone()).or_default().extend(neighbours);
        }
    }
    out
}

impl Neo4jGraphStore {
    /// Fails with [`GraphError::InvalidConfig`] unless uri, user and password
    /// are all set.
    pub fn from_settings(settings: &GraphSettings) -> Result<Self, GraphError> {
        let (uri, user, password) = settings
            .require_credentials()
            .map_err(|e| GraphError::InvalidConfig(e.to_string()))?;
        let rt = Runtime::new().map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| GraphError::InvalidConfig(e.to_string()))?;
        let endpoint = format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), settings.database);
        tracing::info!(endpoint = %endpoint, "configured neo4j graph store");
        Ok(Self { rt, client, endpoint, user: user.to_string(), password: password.to_string() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn run(&self, statement: &str, parameters: Value) -> Result<TxResponse, GraphError> {
        let body = json!({ "statements": [{ "statement": statement, "parameters": parameters }] });
        self.rt.block_on(async {
            let resp = self
                .client
                .post(&self.endpoint)
                .basic_auth(&self.user, Some(&self.password))
                .json(&body)
                .send()
                .await
                .map_err(|e| GraphError::Unavailable(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(GraphError::Unavailable(format!("HTTP {status}: {text}")));
            }
            let parsed: TxResponse = resp.json().await.map_err(|e| GraphError::Query(e.to_string()))?;
            if let Some(err) = parsed.errors.first() {
                return Err(GraphError::Query(format!("{}: {}", err.code, err.message)));
            }
            Ok(parsed)
        })
    }
}

impl GraphStore for Neo4jGraphStore {
    fn upsert_document(&self, id: &str, properties: &Metadata) -> Result<(), GraphError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(());
        }
        // node properties must be primitives
        let props = serde_json::to_value(flatten_metadata(properties)).map_err(|e| GraphError::Query(e.to_string()))?;
        self.run(UPSERT_DOCUMENT, json!({ "id": id, "props": props }))?;
        Ok(())
    }

    fn relate_documents(&self, src_id: &str, dst_id: &str, rel_type: &str) -> Result<(), GraphError> {
        let (src_id, dst_id) = (src_id.trim(), dst_id.trim());
        if src_id.is_empty() || dst_id.is_empty() {
            return Ok(());
        }
        let statement = relate_statement(rel_type)?;
        self.run(&statement, json!({ "src": src_id, "dst": dst_id }))?;
        Ok(())
    }

    fn expand(&self, doc_ids: &[String], rel_types: Option<&[String]>) -> Result<ExpansionMap, GraphError> {
        if doc_ids.is_empty() {
            return Ok(ExpansionMap::new());
        }
        let response = self.run(EXPAND, json!({ "ids": doc_ids, "types": rel_types }))?;
        let map = parse_expansion(response);
        tracing::debug!(requested = doc_ids.len(), expanded = map.len(), "neo4j expansion");
        Ok(map)
    }
}
