//! Owned service context: the current index handle and stats record, plus
//! the collaborators that rebuild them.
//!
//! Readers take a snapshot (`Arc<VectorIndex>` plus a stats clone) under the
//! read lock; warmup and reindex are serialized by a separate mutex and
//! install the new index and stats together under the write lock.

use crate::answer::AnswerEngine;
use crate::chunking::build_chunks;
use crate::embeddings::Embedder;
use crate::error::{IndexError, IngestError, PipelineError};
use crate::extractor::PdfExtractor;
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::ingest::{extract_folder, fingerprint_folder};
use crate::models::{Extraction, PdfStats, PipelineConfig};
use crate::presign::PresignedPost;
use crate::store::{is_flat_key, sync_bucket, ObjectStore};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    AlreadyWarm,
    Loaded,
    Built,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexSummary {
    pub files: usize,
    pub chunks: usize,
}

#[derive(Default)]
struct PipelineState {
    index: Option<Arc<VectorIndex>>,
    stats: Vec<PdfStats>,
}

struct Prepared {
    extraction: Extraction,
    fingerprint: String,
}

pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    answers: AnswerEngine,
    state: RwLock<PipelineState>,
    rebuild: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn PdfExtractor>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let answers = AnswerEngine::new(embedder.clone(), generator, config.top_k);
        Self {
            config,
            store,
            extractor,
            embedder,
            answers,
            state: RwLock::new(PipelineState::default()),
            rebuild: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub async fn is_warm(&self) -> bool {
        self.state.read().await.index.is_some()
    }

    /// Loads or builds the index once. Later calls return `AlreadyWarm` without work.
    ///
    /// A persisted index is reused only when it was built from the same PDF set
    /// (by content fingerprint) with the configured embedding model.
    pub async fn warmup(&self) -> Result<WarmupOutcome, PipelineError> {
        if self.is_warm().await {
            return Ok(WarmupOutcome::AlreadyWarm);
        }

        let _rebuild = self.rebuild.lock().await;
        if self.is_warm().await {
            return Ok(WarmupOutcome::AlreadyWarm);
        }

        let prepared = self.prepare().await?;
        let (index, outcome) = match self.load_matching(&prepared.fingerprint).await {
            Some(index) => (index, WarmupOutcome::Loaded),
            None => {
                let index = self.build(&prepared).await?;
                (index, WarmupOutcome::Built)
            }
        };

        info!(?outcome, chunks = index.len(), files = prepared.extraction.stats.len(), "warmup complete");
        self.install(index, prepared.extraction.stats).await;
        Ok(outcome)
    }

    /// Syncs, extracts and rebuilds unconditionally, ignoring any persisted index.
    pub async fn reindex(&self) -> Result<ReindexSummary, PipelineError> {
        let _rebuild = self.rebuild.lock().await;

        let prepared = self.prepare().await?;
        let index = self.build(&prepared).await?;
        let summary = ReindexSummary {
            files: prepared.extraction.stats.len(),
            chunks: index.len(),
        };

        info!(files = summary.files, chunks = summary.chunks, "reindex complete");
        self.install(index, prepared.extraction.stats).await;
        Ok(summary)
    }

    pub async fn ask(&self, query: &str) -> Result<String, PipelineError> {
        self.warmup().await?;

        let (index, stats) = {
            let state = self.state.read().await;
            let index = state
                .index
                .clone()
                .ok_or_else(|| IndexError::Incompatible("index missing after warmup".to_string()))?;
            (index, state.stats.clone())
        };

        Ok(self.answers.answer(&index, &stats, query).await?)
    }

    pub async fn stats(&self) -> Result<Vec<PdfStats>, PipelineError> {
        self.warmup().await?;
        Ok(self.state.read().await.stats.clone())
    }

    pub fn presign_upload(&self, filename: &str) -> Result<PresignedPost, PipelineError> {
        let filename = filename.trim();
        if !is_flat_key(filename) {
            return Err(PipelineError::InvalidArgument(format!(
                "filename must be a plain file name, got {filename:?}"
            )));
        }
        Ok(self.store.presign_upload(filename)?)
    }

    async fn prepare(&self) -> Result<Prepared, PipelineError> {
        sync_bucket(self.store.as_ref(), &self.config.data_dir).await?;

        let data_dir = self.config.data_dir.clone();
        let extractor = self.extractor.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            let extraction = extract_folder(&data_dir, extractor.as_ref())?;
            let fingerprint = fingerprint_folder(&data_dir)?;
            Ok::<_, IngestError>(Prepared {
                extraction,
                fingerprint,
            })
        })
        .await
        .map_err(|error| IngestError::Task(error.to_string()))??;

        Ok(prepared)
    }

    async fn build(&self, prepared: &Prepared) -> Result<Arc<VectorIndex>, PipelineError> {
        let chunks = build_chunks(&prepared.extraction.passages, &self.config.ingestion)?;
        let index = VectorIndex::build(chunks, self.embedder.as_ref(), prepared.fingerprint.clone()).await?;
        index.save(&self.config.index_path).await?;
        Ok(Arc::new(index))
    }

    async fn load_matching(&self, fingerprint: &str) -> Option<Arc<VectorIndex>> {
        let path = &self.config.index_path;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return None;
        }

        let index = match VectorIndex::load(path).await {
            Ok(index) => index,
            Err(error) => {
                warn!(path = %path.display(), %error, "persisted index unreadable, rebuilding");
                return None;
            }
        };

        let dimensions = if index.is_empty() {
            index.dimensions
        } else {
            match self.embedder.output_dimensions().await {
                Ok(dimensions) => dimensions,
                Err(error) => {
                    warn!(%error, "could not determine embedding dimensions, rebuilding");
                    return None;
                }
            }
        };
        if let Err(error) = index.ensure_compatible(self.embedder.model_name(), dimensions) {
            warn!(%error, "persisted index unusable, rebuilding");
            return None;
        }
        if index.fingerprint != fingerprint {
            info!("pdf set changed since the index was built, rebuilding");
            return None;
        }

        Some(Arc::new(index))
    }

    async fn install(&self, index: Arc<VectorIndex>, stats: Vec<PdfStats>) {
        let mut state = self.state.write().await;
        state.index = Some(index);
        state.stats = stats;
    }
}
