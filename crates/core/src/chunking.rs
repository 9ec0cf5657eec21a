use crate::error::IngestError;
use crate::models::{IngestionOptions, Passage, PdfChunk};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl IngestionOptions {
    /// Checks the chunk window settings before any ingestion runs.
    pub fn validate(&self) -> Result<(), IngestError> {
        ChunkingConfig::from(self).validate()
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Splits `text` into overlapping windows, returning `(char_offset, piece)` pairs.
///
/// A window that would end mid-text is pulled back to the last whitespace in
/// its second half, so words are only cut when a window has no such break.
pub(crate) fn split_with_overlap(text: &str, config: ChunkingConfig) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= config.max_chars {
        return vec![(0, text.to_string())];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let mut end = (start + config.max_chars).min(chars.len());
        if end < chars.len() {
            let floor = start + config.max_chars / 2;
            if let Some(pos) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = pos + 1;
            }
        }

        pieces.push((start, chars[start..end].iter().collect()));
        if end == chars.len() {
            break;
        }

        let next = end.saturating_sub(config.overlap_chars);
        start = if next > start { next } else { end };
    }

    pieces
}

pub(crate) fn chunk_passage(passage: &Passage, config: ChunkingConfig) -> Vec<PdfChunk> {
    split_with_overlap(&passage.text, config)
        .into_iter()
        .enumerate()
        .map(|(index, (char_offset, text))| PdfChunk {
            source: passage.source.clone(),
            page: passage.page,
            words: passage.words,
            total_pages: passage.total_pages,
            total_words: passage.total_words,
            chunk_index: index as u32,
            char_offset,
            text,
        })
        .collect()
}

pub fn build_chunks(
    passages: &[Passage],
    options: &IngestionOptions,
) -> Result<Vec<PdfChunk>, IngestError> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let chunks: Vec<PdfChunk> = passages
        .iter()
        .flat_map(|passage| chunk_passage(passage, config))
        .collect();

    info!(chunks = chunks.len(), pages = passages.len(), "chunked passages");
    Ok(chunks)
}
