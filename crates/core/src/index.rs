//! In-process corpus index.
//!
//! Built once from ingested documents and never mutated afterwards; share it
//! as `Arc<CorpusIndex>` across concurrent queries without locking.

use crate::chunking::{build_passages, ChunkingConfig};
use crate::contacts::contacts_document;
use crate::embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder};
use crate::error::IngestError;
use crate::models::{Document, MetadataPredicate, Passage};
use crate::product::ProductCatalog;
use crate::sections::SectionLabeler;
use crate::traits::VectorIndex;
use crate::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct CorpusIndex {
    documents: Vec<Document>,
    passages: Vec<Passage>,
    vectors: Vec<Vec<f32>>,
    by_id: HashMap<String, usize>,
    catalog: ProductCatalog,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("documents", &self.documents.len())
            .field("passages", &self.passages.len())
            .field("products", &self.catalog.len())
            .finish()
    }
}

pub struct CorpusIndexBuilder {
    documents: Vec<Document>,
    chunking: ChunkingConfig,
    labeler: SectionLabeler,
    embedder: Arc<dyn Embedder>,
    include_contacts: bool,
}

impl Default for CorpusIndexBuilder {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            chunking: ChunkingConfig::default(),
            labeler: SectionLabeler::default(),
            embedder: Arc::new(CharacterNgramEmbedder::default()),
            include_contacts: false,
        }
    }
}

impl CorpusIndexBuilder {
    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn labeler(mut self, labeler: SectionLabeler) -> Self {
        self.labeler = labeler;
        self
    }

    pub fn document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }

    /// Adds the built-in bank contact directory. It registers no product.
    pub fn with_contacts(mut self) -> Self {
        self.include_contacts = true;
        self
    }

    /// Resolves product ids, chunks and embeds every document.
    pub fn build(self) -> Result<CorpusIndex, IngestError> {
        let mut catalog = ProductCatalog::new();
        let mut documents = Vec::with_capacity(self.documents.len() + 1);
        let mut passages = Vec::new();

        let product_documents = self.documents.into_iter().map(|document| (document, true));
        let reference_documents = self
            .include_contacts
            .then(contacts_document)
            .into_iter()
            .map(|document| (document, false));

        for (mut document, names_product) in product_documents.chain(reference_documents) {
            if names_product {
                let registered = catalog.register(&document.source_filename);
                if document.product_id.is_none() {
                    document.product_id = registered;
                }
            }

            for passage in build_passages(&document, &self.labeler, self.chunking)? {
                if let Some(product_id) = &passage.product_id {
                    catalog.link_passage(product_id, &passage.passage_id);
                }
                passages.push(passage);
            }
            documents.push(document);
        }

        let vectors: Vec<Vec<f32>> = passages
            .iter()
            .map(|passage| self.embedder.embed(&embedding_text(passage)))
            .collect();

        let by_id = passages
            .iter()
            .enumerate()
            .map(|(position, passage)| (passage.passage_id.clone(), position))
            .collect();

        let labelled = passages.iter().filter(|p| p.section.is_some()).count();
        info!(
            documents = documents.len(),
            passages = passages.len(),
            labelled_passages = labelled,
            products = catalog.len(),
            "corpus index built"
        );

        Ok(CorpusIndex {
            documents,
            passages,
            vectors,
            by_id,
            catalog,
            embedder: self.embedder,
        })
    }
}

/// Passage text prefixed with its product and section, so a query naming
/// the product matches passages whose body never repeats the name.
fn embedding_text(passage: &Passage) -> String {
    let mut text = String::new();
    if let Some(product_id) = &passage.product_id {
        text.push_str(product_id.as_str());
        text.push('\n');
    }
    if let Some(section) = passage.section {
        text.push_str(section.as_str());
        text.push('\n');
    }
    text.push_str(&passage.text);
    text
}

impl CorpusIndex {
    pub fn builder() -> CorpusIndexBuilder {
        CorpusIndexBuilder::default()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn has_section_metadata(&self) -> bool {
        self.passages.iter().any(|passage| passage.section.is_some())
    }

    /// Brute-force cosine ranking; ties keep corpus order.
    pub fn rank(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&MetadataPredicate>,
    ) -> Vec<(String, f64)> {
        let query_vector = self.embedder.embed(query_text);
        let mut scored: Vec<(usize, f64)> = self
            .passages
            .iter()
            .enumerate()
            .filter(|(_, passage)| predicate.map_or(true, |predicate| predicate.admits(passage)))
            .map(|(position, _)| (position, cosine_similarity(&query_vector, &self.vectors[position])))
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        scored
            .into_iter()
            .take(k)
            .map(|(position, score)| (self.passages[position].passage_id.clone(), score))
            .collect()
    }
}

#[async_trait]
impl VectorIndex for CorpusIndex {
    async fn nearest(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&MetadataPredicate>,
    ) -> Result<Vec<(String, f64)>, BackendError> {
        Ok(self.rank(query_text, k, predicate))
    }

    fn passage(&self, passage_id: &str) -> Option<Passage> {
        self.by_id
            .get(passage_id)
            .map(|position| self.passages[*position].clone())
    }

    fn passage_count(&self) -> usize {
        self.passages.len()
    }
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Arc<T> {
    async fn nearest(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&MetadataPredicate>,
    ) -> Result<Vec<(String, f64)>, BackendError> {
        (**self).nearest(query_text, k, predicate).await
    }

    fn passage(&self, passage_id: &str) -> Option<Passage> {
        (**self).passage(passage_id)
    }

    fn passage_count(&self) -> usize {
        (**self).passage_count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::ProductId;

    pub fn document(filename: &str, raw_text: &str) -> Document {
        Document {
            document_id: format!("doc-{filename}"),
            source_filename: filename.to_string(),
            raw_text: raw_text.to_string(),
            product_id: None,
            checksum: "checksum".to_string(),
            ingested_at: chrono::Utc::now(),
        }
    }

    pub const AMAYI: &str = "AMAYI ANGATHE BUSINESS SAVINGS ACCOUNT\n\
        An account for women entrepreneurs and business owners.\n\n\
        BENEFITS\n\
        Free monthly maintenance for the first 6 months.\n\
        Free ATM card upon account opening.\n\
        Low minimum balance of MK 3,000.\n\n\
        REQUIREMENTS\n\
        Valid national ID.\n\
        Proof of business registration or trading license.\n\
        Minimum balance of MK 3,000 required to open the account.\n\n\
        FEES AND CHARGES\n\
        Monthly maintenance MK 200 after the first 6 months.\n\
        ATM withdrawals free at our ATMs, MK 150 at other banks.";

    pub const MLIMI: &str = "MLIMI LOAN\n\
        A loan for farmers and agricultural businesses.\n\n\
        BENEFITS\n\
        Flexible repayment schedule aligned with harvest cycles.\n\
        No collateral required for loans under MK 200,000.\n\n\
        REQUIREMENTS\n\
        Valid national ID.\n\
        Proof of farming activity such as land ownership or lease.\n\n\
        FEES\n\
        Interest rate of 18-22% per annum depending on loan size.\n\
        Processing fee of 2% of the loan amount.";

    pub fn banking_index() -> CorpusIndex {
        CorpusIndex::builder()
            .document(document("01-amayi-angathe-account.pdf", AMAYI))
            .document(document("02_mlimi_loan.pdf", MLIMI))
            .build()
            .expect("fixture index builds")
    }

    pub fn banking_index_with_contacts() -> CorpusIndex {
        CorpusIndex::builder()
            .document(document("01-amayi-angathe-account.pdf", AMAYI))
            .document(document("02_mlimi_loan.pdf", MLIMI))
            .with_contacts()
            .build()
            .expect("fixture index builds")
    }

    pub fn amayi() -> ProductId {
        ProductId::new("amayi angathe")
    }

    pub fn mlimi() -> ProductId {
        ProductId::new("mlimi")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::contacts::CONTACTS_SOURCE;
    use crate::models::Intent;

    #[test]
    fn build_resolves_products_and_sections() {
        let index = banking_index();
        assert_eq!(index.catalog().len(), 2);
        assert!(index.has_section_metadata());
        assert!(index
            .documents()
            .iter()
            .all(|document| document.product_id.is_some()));

        let amayi_sections: Vec<Option<Intent>> = index
            .passages()
            .iter()
            .filter(|p| p.product_id == Some(amayi()))
            .map(|p| p.section)
            .collect();
        assert!(amayi_sections.contains(&Some(Intent::Benefits)));
        assert!(amayi_sections.contains(&Some(Intent::Requirements)));
        assert!(amayi_sections.contains(&Some(Intent::Fees)));

        let product = index.catalog().get(&amayi()).expect("product");
        assert_eq!(product.passage_ids.len(), amayi_sections.len());
    }

    #[tokio::test]
    async fn nearest_is_ordered_and_filtered() {
        let index = banking_index();
        let predicate = MetadataPredicate {
            product_id: Some(mlimi()),
            intent: Some(Intent::Fees),
        };
        let hits = index
            .nearest("mlimi loan interest rate", 5, Some(&predicate))
            .await
            .expect("nearest");
        assert!(!hits.is_empty());
        for window in hits.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
        for (passage_id, _) in &hits {
            let passage = index.passage(passage_id).expect("passage");
            assert!(predicate.admits(&passage));
        }
    }

    #[test]
    fn contacts_are_indexed_without_a_product() {
        let index = banking_index_with_contacts();
        assert_eq!(index.catalog().len(), 2);
        assert_eq!(index.documents().len(), 3);

        let contact_passages: Vec<&Passage> = index
            .passages()
            .iter()
            .filter(|p| p.source_filename == CONTACTS_SOURCE)
            .collect();
        assert!(!contact_passages.is_empty());
        assert!(contact_passages
            .iter()
            .all(|p| p.product_id.is_none() && p.section.is_none()));

        let ranked = index.rank("What is the call centre number?", 1, None);
        let top = index.passage(&ranked[0].0).expect("passage");
        assert_eq!(top.source_filename, CONTACTS_SOURCE);
        assert!(top.text.contains("626"));
    }

    #[test]
    fn empty_builder_yields_empty_index() {
        let index = CorpusIndex::builder().build().expect("index");
        assert_eq!(index.passage_count(), 0);
        assert!(!index.has_section_metadata());
    }
}
