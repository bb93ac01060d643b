use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages the assistant understands. English is the pivot language.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Chichewa,
}

impl Language {
    pub const PIVOT: Language = Language::English;

    pub fn is_pivot(self) -> bool {
        self == Self::PIVOT
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chichewa => "Chichewa",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Document section a query is asking about.
///
/// The declaration order of the specific intents is the tie-break priority
/// used by the classifier: benefits, requirements, fees, features.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Benefits,
    Requirements,
    Fees,
    Features,
    General,
}

impl Intent {
    /// Specific intents in classification priority order.
    pub const PRIORITY: [Intent; 4] = [
        Intent::Benefits,
        Intent::Requirements,
        Intent::Fees,
        Intent::Features,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Benefits => "benefits",
            Intent::Requirements => "requirements",
            Intent::Fees => "fees",
            Intent::Features => "features",
            Intent::General => "general",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Intent::Benefits => "Benefits",
            Intent::Requirements => "Requirements",
            Intent::Fees => "Fees",
            Intent::Features => "Features",
            Intent::General => "General",
        }
    }

    pub fn is_specific(self) -> bool {
        self != Intent::General
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Greeting,
    OutOfScope,
    ProductInquiry,
}

impl QueryType {
    pub fn short_circuits(self) -> bool {
        self != QueryType::ProductInquiry
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            QueryType::Greeting => "greeting",
            QueryType::OutOfScope => "out_of_scope",
            QueryType::ProductInquiry => "product_inquiry",
        };
        f.write_str(value)
    }
}

/// Canonical product identifier, e.g. `amayi angathe`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wraps an already-canonical id. Use `product::canonical_product_id`
    /// to derive one from a filename.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title-cased form for prompts and context headers.
    pub fn display_name(&self) -> String {
        self.0
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Savings,
    Loan,
    Current,
    Card,
    Investment,
    Other,
}

impl ProductCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductCategory::Savings => "savings",
            ProductCategory::Loan => "loan",
            ProductCategory::Current => "current",
            ProductCategory::Card => "card",
            ProductCategory::Investment => "investment",
            ProductCategory::Other => "other",
        }
    }
}

/// One ingested source file. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub source_filename: String,
    pub raw_text: String,
    pub product_id: Option<ProductId>,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Contiguous slice of one document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub passage_id: String,
    pub document_id: String,
    pub source_filename: String,
    pub product_id: Option<ProductId>,
    pub position: u64,
    pub text: String,
    /// `None` when no section label could be inferred.
    pub section: Option<Intent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub display_name: String,
    pub category: ProductCategory,
    /// Back-references by id; passages are owned by the index.
    pub passage_ids: Vec<String>,
}

/// Optional narrowing applied by the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct MetadataPredicate {
    pub product_id: Option<ProductId>,
    pub intent: Option<Intent>,
}

impl MetadataPredicate {
    pub fn is_empty(&self) -> bool {
        self.product_id.is_none() && self.intent.is_none()
    }

    /// Per-passage check. A constraint only applies when the passage carries
    /// the corresponding metadata, otherwise the passage is let through.
    pub fn admits(&self, passage: &Passage) -> bool {
        let product_ok = match (&self.product_id, &passage.product_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        let intent_ok = match (self.intent, passage.section) {
            (Some(wanted), Some(actual)) if wanted.is_specific() => wanted == actual,
            _ => true,
        };
        product_ok && intent_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f64,
}

/// Candidates ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredPassage>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// One user turn. Lives for a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub raw_text: String,
    pub source_language: Language,
    pub pivot_text: String,
    pub intent: Intent,
    pub product_id: Option<ProductId>,
}

/// Bounded text block handed to generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Context {
    pub text: String,
    pub passage_ids: Vec<String>,
    /// Source filenames in first-use order, without duplicates.
    pub sources: Vec<String>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.passage_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TranslationUnavailable,
    EmptyCorpus,
    RetrievalUnavailable,
    GenerationUnavailable,
}

/// Per-query state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Normalized,
    Routed,
    ShortCircuited,
    Classified,
    Retrieved,
    Assembled,
    Generated,
    Returned,
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::ShortCircuited | PipelineState::Returned | PipelineState::Failed(_)
        )
    }
}

/// What the chat front end receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaResponse {
    pub answer_text: String,
    pub source_list: Vec<String>,
    pub intent: Intent,
    pub product_id: Option<ProductId>,
    pub query_type: QueryType,
    pub source_language: Language,
    pub pivot_text: String,
    /// Set when translation failed and the raw text was used as pivot text.
    pub degraded: bool,
    pub final_state: PipelineState,
}
