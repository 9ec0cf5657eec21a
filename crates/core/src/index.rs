//! In-memory vector index with JSON persistence.
//!
//! An index is built once from a chunk set, saved to disk, and treated as
//! immutable afterwards. A rebuild produces a new value that replaces the old
//! one wholesale.

use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{PdfChunk, SearchHit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: PdfChunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub embedding_model: String,
    pub dimensions: usize,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Embeds every chunk and assembles the index. Nothing is written to disk.
    pub async fn build(
        chunks: Vec<PdfChunk>,
        embedder: &dyn Embedder,
        fingerprint: impl Into<String>,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(IndexError::Incompatible(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimensions,
                        actual: vector.len(),
                    });
                }
                Ok(IndexedChunk { chunk, vector })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        Ok(Self {
            embedding_model: embedder.model_name().to_string(),
            dimensions,
            fingerprint: fingerprint.into(),
            built_at: Utc::now(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Overwrites any index already at `path`. The file is replaced by rename.
    pub async fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(self)?;
        let staging = staging_path(path);
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;

        info!(path = %path.display(), chunks = self.len(), "index saved");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = tokio::fs::read(path).await?;
        let index: Self = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), chunks = index.len(), "index loaded");
        Ok(index)
    }

    /// Rejects an index built in a different vector space than the configured
    /// embedder produces. An empty index has no vectors to disagree with.
    pub fn ensure_compatible(&self, model_name: &str, dimensions: usize) -> Result<(), IndexError> {
        if self.embedding_model != model_name {
            return Err(IndexError::Incompatible(format!(
                "index built with {}, configured embedder is {model_name}",
                self.embedding_model
            )));
        }
        if !self.is_empty() && self.dimensions != dimensions {
            return Err(IndexError::Incompatible(format!(
                "index has {}-dimensional vectors, configured embedder produces {dimensions}",
                self.dimensions
            )));
        }
        Ok(())
    }

    /// The `top_k` entries most similar to `query_vector`, best first.
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query_vector, &entry.vector)))
            .collect();

        // stable sort keeps index order among equal scores
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| SearchHit {
                score,
                chunk: self.entries[position].chunk.clone(),
            })
            .collect())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}
