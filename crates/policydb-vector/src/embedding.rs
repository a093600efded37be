use policydb_core::traits::Embedder;
use policydb_core::VectorError;

/// Embed `texts`, requiring exactly one vector of the embedder's width per
/// input.
pub(crate) fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError> {
    let vectors = embedder.embed_batch(texts)?;
    if vectors.len() != texts.len() {
        return Err(VectorError::Backend(format!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    let dim = embedder.dim();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(VectorError::Dimension { expected: dim, got: bad.len() });
    }
    Ok(vectors)
}

/// Embed a single query text.
pub(crate) fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, VectorError> {
    embed_checked(embedder, &[text.to_string()])?
        .pop()
        .ok_or_else(|| VectorError::Backend("embedder returned no vector".into()))
}
