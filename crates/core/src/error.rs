use crate::models::{FailureKind, ProductId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure talking to an external collaborator (translation, index, generation).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{backend} timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("backend request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("translation backend unavailable: {0}")]
    TranslationUnavailable(#[source] BackendError),

    #[error("corpus has no passages")]
    EmptyCorpus,

    #[error("retrieval backend unavailable: {0}")]
    Retrieval(#[source] BackendError),

    #[error("generation backend unavailable: {0}")]
    GenerationUnavailable(#[source] BackendError),

    #[error("query matches several products equally: {0:?}")]
    AmbiguousProduct(Vec<ProductId>),

    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// State-machine failure kind for errors raised by a pipeline stage.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineError::TranslationUnavailable(_) => Some(FailureKind::TranslationUnavailable),
            PipelineError::EmptyCorpus => Some(FailureKind::EmptyCorpus),
            PipelineError::Retrieval(_) => Some(FailureKind::RetrievalUnavailable),
            PipelineError::GenerationUnavailable(_) => Some(FailureKind::GenerationUnavailable),
            PipelineError::AmbiguousProduct(_)
            | PipelineError::Ingest(_)
            | PipelineError::Config(_) => None,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
