//! Knowledge retrieval: embed the query, rank pre-embedded guidance chunks by
//! cosine similarity.
//!
//! The orchestrator decides what counts as a usable result; this module only
//! reports ranked chunks with similarity clamped into [0, 1].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("could not parse retrieval payload: {0}")]
    Parse(String),

    #[error("retrieval timed out")]
    Timeout,

    #[error("knowledge index error: {0}")]
    Index(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator traits
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` chunks, most similar first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Index
// ────────────────────────────────────────────────────────────────────────────

/// One pre-embedded guidance excerpt as stored in the index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    /// Document the excerpt was cut from, e.g. `timing_guidelines.txt`.
    pub source: String,
    #[serde(default)]
    pub category: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub source: String,
    pub category: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    chunks: Vec<KnowledgeChunk>,
}

impl VectorIndex {
    pub fn new(chunks: Vec<KnowledgeChunk>) -> Result<Self, RetrievalError> {
        if let Some(first) = chunks.first() {
            let dim = first.embedding.len();
            if dim == 0 {
                return Err(RetrievalError::Index(format!("chunk {} has an empty embedding", first.id)));
            }
            if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
                return Err(RetrievalError::Index(format!(
                    "chunk {} has dimension {}, expected {}",
                    bad.id,
                    bad.embedding.len(),
                    dim
                )));
            }
        }
        Ok(Self { chunks })
    }

    /// Loads a JSON array of `KnowledgeChunk`s.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Index(format!("cannot read {}: {e}", path.display())))?;
        let chunks: Vec<KnowledgeChunk> =
            serde_json::from_str(&raw).map_err(|e| RetrievalError::Parse(e.to_string()))?;
        let index = Self::new(chunks)?;
        info!("Loaded {} knowledge chunks from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(f64, &KnowledgeChunk)> = self
            .chunks
            .iter()
            .map(|c| (cosine_similarity(query, &c.embedding).clamp(0.0, 1.0), c))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(score, c)| RetrievedChunk {
                id: c.id.clone(),
                source: c.source.clone(),
                category: c.category.clone(),
                text: c.text.clone(),
                score,
            })
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI embeddings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: EMBEDDING_MODEL,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout
                } else {
                    RetrievalError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Parse(e.to_string()))?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Parse("no embedding returned".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Retriever
// ────────────────────────────────────────────────────────────────────────────

pub struct KnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
}

impl KnowledgeRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: VectorIndex) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl Retriever for KnowledgeRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let results = self.index.search(&vector, k);
        debug!(
            "Retrieved {} chunks for '{}' (best score {:.3})",
            results.len(),
            query,
            results.first().map(|r| r.score).unwrap_or(0.0)
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source: format!("{id}.txt"),
            category: "timing".to_string(),
            text: format!("guidance {id}"),
            embedding,
        }
    }

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_cosine_similarity_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity_and_clamps() {
        let index = VectorIndex::new(vec![
            chunk("opposite", vec![-1.0, 0.0]),
            chunk("close", vec![0.9, 0.1]),
            chunk("exact", vec![1.0, 0.0]),
            chunk("side", vec![0.2, 1.0]),
        ])
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 3);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "close", "side"]);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));

        let all = index.search(&[1.0, 0.0], 10);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].score, 0.0);
    }

    #[test]
    fn test_mixed_dimensions_are_rejected() {
        let err = VectorIndex::new(vec![chunk("a", vec![1.0, 0.0]), chunk("b", vec![1.0])]).unwrap_err();
        assert!(matches!(err, RetrievalError::Index(_)));
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let chunks = vec![chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])];
        std::fs::write(&path, serde_json::to_string(&chunks).unwrap()).unwrap();
        let index = VectorIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert!(matches!(
            VectorIndex::load(&dir.path().join("missing.json")),
            Err(RetrievalError::Index(_))
        ));
    }

    #[tokio::test]
    async fn test_knowledge_retriever_embeds_then_searches() {
        let index = VectorIndex::new(vec![chunk("a", vec![0.0, 1.0]), chunk("b", vec![1.0, 0.0])]).unwrap();
        let retriever = KnowledgeRetriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.1])), index);
        let hits = retriever.retrieve("when should I follow up?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_results() {
        let retriever = KnowledgeRetriever::new(Arc::new(FixedEmbedder(vec![1.0])), VectorIndex::default());
        assert!(retriever.retrieve("anything", 3).await.unwrap().is_empty());
    }
}
