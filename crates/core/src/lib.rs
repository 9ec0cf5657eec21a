pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod presign;
pub mod store;
pub mod stores;

pub use answer::{compose_prompt, is_greeting, AnswerEngine, DEFAULT_TOP_K, GREETING_REPLY};
pub use chunking::{build_chunks, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
pub use error::{AnswerError, IndexError, IngestError, ModelError, PipelineError, SyncError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use generation::{Generator, OllamaGenerator, DEFAULT_GENERATION_MODEL, DEFAULT_NUM_CTX};
pub use index::{IndexedChunk, VectorIndex};
pub use ingest::{digest_file, discover_pdf_files, extract_folder, fingerprint_folder};
pub use models::{
    count_words, Extraction, IngestionOptions, Passage, PdfChunk, PdfStats, PipelineConfig,
    SearchHit,
};
pub use pipeline::{Pipeline, ReindexSummary, WarmupOutcome};
pub use presign::{PostPolicySigner, PresignedPost, UPLOAD_CONTENT_TYPE, UPLOAD_EXPIRY_SECS};
pub use store::{sync_bucket, ObjectStore, SyncReport};
pub use stores::{Credentials, MemoryObjectStore, S3Client};
