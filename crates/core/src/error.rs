use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: String, details: String },

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from object store ({status}): {details}")]
    BackendResponse { status: u16, details: String },

    #[error("could not parse bucket listing: {0}")]
    Listing(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("object not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("model returned no output: {0}")]
    EmptyOutput(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ModelError),

    #[error("persisted index is incompatible: {0}")]
    Incompatible(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PipelineError {
    /// True when the caller supplied bad input rather than a backend failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidArgument(_))
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
