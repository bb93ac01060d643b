pub mod backends;
pub mod chunking;
pub mod config;
pub mod contacts;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod intent;
pub mod language;
pub mod models;
pub mod normalizer;
pub mod phrases;
pub mod pipeline;
pub mod product;
pub mod retriever;
pub mod router;
pub mod sections;
pub mod traits;

pub use backends::ChatCompletionsClient;
pub use chunking::{build_passages, chunk_by_paragraph, normalize_whitespace, ChunkingConfig};
pub use config::AssistantConfig;
pub use contacts::{contacts_document, CONTACTS_SOURCE};
pub use context::ContextAssembler;
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{BackendError, IngestError, PipelineError};
pub use extractor::{extract_document_text, LopdfExtractor, PlainTextExtractor, TextExtractor};
pub use generator::{AnswerGenerator, GeneratedAnswer, GeneratorSettings};
pub use index::{CorpusIndex, CorpusIndexBuilder};
pub use ingest::{
    discover_documents, ingest_folder, ingest_folder_best_effort, IngestionReport, SkippedFile,
};
pub use intent::{IntentClassifier, KeywordTable};
pub use language::detect_language;
pub use models::{
    Context, Document, FailureKind, Intent, Language, MetadataPredicate, Passage, PipelineState,
    Product, ProductCategory, ProductId, QaResponse, Query, QueryType, RetrievalResult,
    ScoredPassage,
};
pub use normalizer::{NormalizedQuery, QueryNormalizer};
pub use phrases::{PhraseBook, PhraseEntry};
pub use pipeline::AssistantPipeline;
pub use product::{canonical_product_id, ProductCatalog};
pub use retriever::{Retriever, RetrieverSettings};
pub use router::QueryTypeRouter;
pub use traits::{CompletionBackend, Prompt, Translator, VectorIndex};
