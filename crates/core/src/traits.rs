use crate::models::{Language, MetadataPredicate, Passage};
use crate::BackendError;
use async_trait::async_trait;

/// Nearest-neighbour lookup over precomputed passage embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns `(passage_id, score)` pairs, best first.
    async fn nearest(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&MetadataPredicate>,
    ) -> Result<Vec<(String, f64)>, BackendError>;

    fn passage(&self, passage_id: &str) -> Option<Passage>;

    fn passage_count(&self) -> usize;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, BackendError>;
}

/// Text generation: one prompt in, one completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError>;
}

/// System instruction plus user content, with a sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}
