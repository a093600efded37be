//! LanceDB connection and table helpers.
use lancedb::{connect, Connection};

use arrow_array::RecordBatchIterator;
use std::sync::Arc;

use policydb_core::VectorError;

pub async fn open_db(uri: &str) -> Result<Connection, VectorError> {
    connect(uri).execute().await.map_err(VectorError::backend)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool, VectorError> {
    let names = conn.table_names().execute().await.map_err(VectorError::backend)?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<(), VectorError> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(VectorError::backend)?;
    tracing::info!(table = name, "created lance table");
    Ok(())
}
