//! Embedding provider abstraction
//!
//! Vector generation is delegated to a pluggable provider; the store never
//! computes embeddings itself. Providers may be slow or remote, so every
//! call is bounded by a timeout and failures are non-fatal: callers degrade
//! to lexical-only search with a recorded warning.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Default embedding dimension for the local hash provider.
pub const HASH_EMBEDDING_DIM: usize = 256;

/// Default request timeout for remote providers.
pub const EMBED_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);

/// Pluggable text-to-vector provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Provider identifier for logs.
    fn name(&self) -> &str;

    /// Embed a single text. Must return a vector of `dimension()` length.
    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>>;
}

/// Cosine similarity between two vectors. Returns 0.0 on dimension
/// mismatch or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Deterministic local provider: hashed bag-of-words, unit-normalized.
///
/// Texts sharing tokens map to nearby vectors, which is enough for
/// clustering and similarity gating in tests and offline deployments.
/// Not a substitute for a trained model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HASH_EMBEDDING_DIM)
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Lowercased alphanumeric tokens of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }

    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let bucket = (fnv1a(&token) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// HttpEmbedder
// ---------------------------------------------------------------------------

/// Remote provider speaking a minimal JSON embeddings protocol:
/// POST `{ "model": ..., "input": ... }` → `{ "embedding": [f32, ...] }`.
///
/// The request timeout is enforced by the underlying client; a timeout or
/// transport error surfaces as [`StoreError::EmbeddingUnavailable`], which
/// callers absorb.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            dimension,
        })
    }
}

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "http-embedder"
    }

    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| StoreError::EmbeddingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::EmbeddingUnavailable(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| StoreError::EmbeddingUnavailable(e.to_string()))?;

        if body.embedding.len() != self.dimension {
            return Err(StoreError::EmbeddingUnavailable(format!(
                "expected dimension {}, got {}",
                self.dimension,
                body.embedding.len()
            )));
        }
        Ok(body.embedding)
    }
}

// ---------------------------------------------------------------------------
// FailingEmbedder (testing only)
// ---------------------------------------------------------------------------

/// Provider that always fails; used to test lexical-only degradation.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn dimension(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "failing-embedder"
    }

    async fn embed(&self, _text: &str) -> StoreResult<Vec<f32>> {
        Err(StoreError::EmbeddingUnavailable(
            "provider configured to fail".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("use the write lock").await.unwrap();
        let b = embedder.embed("use the write lock").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn test_hash_embedder_unit_norm() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("normalize me please").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_score_higher() {
        let embedder = HashEmbedder::default();
        let base = embedder
            .embed("database connection pool exhausted")
            .await
            .unwrap();
        let near = embedder
            .embed("connection pool exhausted again")
            .await
            .unwrap();
        let far = embedder.embed("team lunch on friday").await.unwrap();

        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[tokio::test]
    async fn test_failing_embedder() {
        let err = FailingEmbedder.embed("anything").await;
        assert!(matches!(err, Err(StoreError::EmbeddingUnavailable(_))));
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Use the Write-Lock, always!"),
            vec!["use", "the", "write", "lock", "always"]
        );
        assert!(tokenize("  ").is_empty());
    }
}
