use crate::config::RetrievalSection;
use crate::error::{BackendError, PipelineError};
use crate::models::{Intent, MetadataPredicate, Query, RetrievalResult, ScoredPassage};
use crate::traits::VectorIndex;
use std::time::Duration;
use tracing::{debug, warn};

pub const MAX_TOP_K: usize = 20;

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub top_k: usize,
    pub min_score: f64,
    pub filter_by_intent: bool,
    pub filter_by_product: bool,
    pub timeout: Duration,
}

impl RetrieverSettings {
    pub fn from_config(section: &RetrievalSection, timeout: Duration) -> Self {
        Self {
            top_k: section.top_k,
            min_score: section.min_score,
            filter_by_intent: section.filter_by_intent,
            filter_by_product: section.filter_by_product,
            timeout,
        }
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self::from_config(&RetrievalSection::default(), Duration::from_secs(5))
    }
}

/// Contract wrapper over a [`VectorIndex`].
pub struct Retriever<I> {
    index: I,
    settings: RetrieverSettings,
}

impl<I> Retriever<I>
where
    I: VectorIndex,
{
    pub fn new(index: I, settings: RetrieverSettings) -> Self {
        Self { index, settings }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// `k` clamped to `1..=MAX_TOP_K`.
    pub fn effective_k(&self, k: usize) -> usize {
        k.clamp(1, MAX_TOP_K)
    }

    /// Metadata narrowing for a classified query, honouring the filter flags.
    pub fn predicate_for(&self, query: &Query) -> Option<MetadataPredicate> {
        let predicate = MetadataPredicate {
            product_id: query
                .product_id
                .clone()
                .filter(|_| self.settings.filter_by_product),
            intent: Some(query.intent).filter(|intent| {
                self.settings.filter_by_intent && intent.is_specific()
            }),
        };
        (!predicate.is_empty()).then_some(predicate)
    }

    /// Ranks passages for a classified query.
    ///
    /// When the full predicate leaves nothing above the threshold the
    /// section constraint is relaxed once, keeping the product constraint,
    /// so a product without a labelled section still yields passages for
    /// the context assembler to order.
    pub async fn retrieve_for(&self, query: &Query) -> Result<RetrievalResult, PipelineError> {
        let predicate = self.predicate_for(query);
        let result = self
            .retrieve(&query.pivot_text, predicate.as_ref(), self.settings.top_k)
            .await?;

        match predicate {
            Some(predicate) if result.is_empty() && predicate.intent.is_some() => {
                let relaxed = MetadataPredicate {
                    product_id: predicate.product_id,
                    intent: None,
                };
                debug!(?relaxed, "no passages for section filter, relaxing");
                let relaxed = (!relaxed.is_empty()).then_some(relaxed);
                self.retrieve(&query.pivot_text, relaxed.as_ref(), self.settings.top_k)
                    .await
            }
            _ => Ok(result),
        }
    }

    /// Nearest passages by descending score, dropping those under
    /// `min_score`. An empty corpus is an error; an empty result is not.
    pub async fn retrieve(
        &self,
        query_text: &str,
        predicate: Option<&MetadataPredicate>,
        k: usize,
    ) -> Result<RetrievalResult, PipelineError> {
        if self.index.passage_count() == 0 {
            return Err(PipelineError::EmptyCorpus);
        }

        let k = self.effective_k(k);
        let timeout = self.settings.timeout;
        let ranked = tokio::time::timeout(timeout, self.index.nearest(query_text, k, predicate))
            .await
            .map_err(|_| BackendError::Timeout {
                backend: "vector-index".to_string(),
                after: timeout,
            })
            .and_then(|result| result)
            .map_err(|error| {
                warn!(%error, "retrieval failed");
                PipelineError::Retrieval(error)
            })?;

        let mut hits = Vec::with_capacity(ranked.len());
        for (passage_id, score) in ranked.into_iter().take(k) {
            if score < self.settings.min_score {
                continue;
            }
            match self.index.passage(&passage_id) {
                Some(passage) => hits.push(ScoredPassage { passage, score }),
                None => debug!(passage_id, "index returned unknown passage id"),
            }
        }
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));

        debug!(
            k,
            hits = hits.len(),
            intent = predicate.and_then(|p| p.intent).map(Intent::as_str),
            product = predicate.and_then(|p| p.product_id.as_ref()).map(|p| p.as_str()),
            "retrieval complete"
        );
        Ok(RetrievalResult { hits })
    }
}
