use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-file page and word totals from the latest extraction pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdfStats {
    pub filename: String,
    pub pages: u32,
    pub words: u64,
}

/// Text of one non-empty PDF page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub source: String,
    pub page: u32,
    pub words: u64,
    pub total_pages: u32,
    pub total_words: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfChunk {
    pub source: String,
    pub page: u32,
    pub words: u64,
    pub total_pages: u32,
    pub total_words: u64,
    pub chunk_index: u32,
    pub char_offset: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub passages: Vec<Passage>,
    pub stats: Vec<PdfStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub chunk: PdfChunk,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub index_path: PathBuf,
    pub top_k: usize,
    pub ingestion: IngestionOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            index_path: PathBuf::from("vector_index.json"),
            top_k: 15,
            ingestion: IngestionOptions::default(),
        }
    }
}

pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
