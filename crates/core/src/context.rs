//! Context assembly.
//!
//! Turns a ranked retrieval result into one bounded, section-aware text
//! block. Passages whose section matches the query intent always come
//! before the rest regardless of score, and a passage is either included
//! whole or not at all.

use crate::chunking::normalize_whitespace;
use crate::config::ContextSection;
use crate::models::{Context, Intent, Passage, ProductId, RetrievalResult, ScoredPassage};
use std::collections::HashSet;
use tracing::debug;

const SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
    strict_sections: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from(&ContextSection::default())
    }
}

impl From<&ContextSection> for ContextAssembler {
    fn from(value: &ContextSection) -> Self {
        Self {
            max_chars: value.max_chars,
            strict_sections: value.strict_sections,
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq)]
enum DedupKey {
    Section(Option<ProductId>, Intent),
    Text(String),
}

impl ContextAssembler {
    pub fn new(max_chars: usize, strict_sections: bool) -> Self {
        Self {
            max_chars,
            strict_sections,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn assemble(
        &self,
        result: &RetrievalResult,
        intent: Intent,
        product_id: Option<&ProductId>,
    ) -> Context {
        let ordered = self.prioritize(result, intent, product_id);
        let unique = deduplicate(ordered);

        let mut context = Context::default();
        let mut used = 0usize;
        let mut sources = HashSet::new();

        for hit in unique {
            let block = render_block(&hit.passage);
            let cost = block.chars().count()
                + if context.text.is_empty() { 0 } else { SEPARATOR.len() };
            if used + cost > self.max_chars {
                debug!(
                    passage_id = %hit.passage.passage_id,
                    used,
                    cost,
                    "context budget reached"
                );
                break;
            }

            if !context.text.is_empty() {
                context.text.push_str(SEPARATOR);
            }
            context.text.push_str(&block);
            used += cost;
            context.passage_ids.push(hit.passage.passage_id.clone());
            if sources.insert(hit.passage.source_filename.clone()) {
                context.sources.push(hit.passage.source_filename.clone());
            }
        }

        debug!(
            intent = intent.as_str(),
            passages = context.passage_ids.len(),
            chars = used,
            "context assembled"
        );
        context
    }

    /// Product narrowing, then intent partition, each partition kept in
    /// score order.
    fn prioritize<'a>(
        &self,
        result: &'a RetrievalResult,
        intent: Intent,
        product_id: Option<&ProductId>,
    ) -> Vec<&'a ScoredPassage> {
        let mut hits: Vec<&ScoredPassage> = result.hits.iter().collect();
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));

        if let Some(product_id) = product_id {
            let of_product = |hit: &&ScoredPassage| hit.passage.product_id.as_ref() == Some(product_id);
            if self.strict_sections && hits.iter().any(of_product) {
                hits.retain(of_product);
            } else {
                let (mut matching, rest): (Vec<_>, Vec<_>) = hits.into_iter().partition(of_product);
                matching.extend(rest);
                hits = matching;
            }
        }

        if !intent.is_specific() {
            return hits;
        }

        let (mut matching, rest): (Vec<_>, Vec<_>) = hits
            .into_iter()
            .partition(|hit| hit.passage.section == Some(intent));
        if self.strict_sections && !matching.is_empty() {
            return matching;
        }
        matching.extend(rest);
        matching
    }
}

/// Keeps the first (highest priority) passage per product and section.
/// Unlabelled passages are only collapsed when their text is identical.
fn deduplicate(hits: Vec<&ScoredPassage>) -> Vec<&ScoredPassage> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| {
            let key = match hit.passage.section {
                Some(section) => DedupKey::Section(hit.passage.product_id.clone(), section),
                None => DedupKey::Text(normalize_whitespace(&hit.passage.text).to_lowercase()),
            };
            seen.insert(key)
        })
        .collect()
}

fn render_block(passage: &Passage) -> String {
    let mut header = Vec::new();
    if let Some(product_id) = &passage.product_id {
        header.push(format!("Product: {}", product_id.display_name()));
    }
    if let Some(section) = passage.section {
        header.push(format!("Section: {}", section.label()));
    }
    if header.is_empty() {
        header.push(format!("Source: {}", passage.source_filename));
    }
    format!("[{}]\n{}", header.join(" | "), passage.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, product: Option<&str>, section: Option<Intent>, score: f64, text: &str) -> ScoredPassage {
        ScoredPassage {
            passage: Passage {
                passage_id: id.to_string(),
                document_id: format!("doc-{}", product.unwrap_or("none")),
                source_filename: format!("{}.pdf", product.unwrap_or("misc").replace(' ', "-")),
                product_id: product.map(ProductId::new),
                position: 0,
                text: text.to_string(),
                section,
            },
            score,
        }
    }

    fn result(hits: Vec<ScoredPassage>) -> RetrievalResult {
        RetrievalResult { hits }
    }

    #[test]
    fn intent_matches_are_promoted_over_higher_scores() {
        let assembler = ContextAssembler::new(3_000, false);
        let retrieved = result(vec![
            hit("req", Some("amayi angathe"), Some(Intent::Requirements), 0.9, "Valid national ID."),
            hit("ben", Some("amayi angathe"), Some(Intent::Benefits), 0.4, "Free ATM card."),
        ]);
        let context = assembler.assemble(&retrieved, Intent::Benefits, None);
        assert_eq!(context.passage_ids, vec!["ben", "req"]);
        assert!(context.text.starts_with("[Product: Amayi Angathe | Section: Benefits]"));
    }

    #[test]
    fn strict_mode_keeps_only_the_requested_section_and_product() {
        let assembler = ContextAssembler::default();
        let retrieved = result(vec![
            hit("req", Some("amayi angathe"), Some(Intent::Requirements), 0.9, "Minimum balance MK 3,000 to open."),
            hit("ben", Some("amayi angathe"), Some(Intent::Benefits), 0.5, "Free ATM card."),
            hit("other", Some("mlimi"), Some(Intent::Benefits), 0.8, "Flexible repayments."),
        ]);
        let product = ProductId::new("amayi angathe");
        let context = assembler.assemble(&retrieved, Intent::Benefits, Some(&product));
        assert_eq!(context.passage_ids, vec!["ben"]);
        assert_eq!(context.sources, vec!["amayi-angathe.pdf"]);
        assert!(!context.text.contains("Minimum balance"));
    }

    #[test]
    fn no_matching_section_falls_back_to_score_order() {
        let assembler = ContextAssembler::default();
        let retrieved = result(vec![
            hit("a", Some("mlimi"), None, 0.3, "Intro to the loan."),
            hit("b", Some("mlimi"), Some(Intent::Fees), 0.7, "Processing fee 2%."),
        ]);
        let context = assembler.assemble(&retrieved, Intent::Features, None);
        assert_eq!(context.passage_ids, vec!["b", "a"]);
    }

    #[test]
    fn product_and_section_pairs_are_unique() {
        let assembler = ContextAssembler::new(10_000, false);
        let retrieved = result(vec![
            hit("b1", Some("mlimi"), Some(Intent::Benefits), 0.9, "Harvest-aligned repayments."),
            hit("b2", Some("mlimi"), Some(Intent::Benefits), 0.8, "No collateral under MK 200,000."),
            hit("f1", Some("mlimi"), Some(Intent::Fees), 0.7, "Processing fee 2%."),
            hit("u1", None, None, 0.6, "Call   626 for help."),
            hit("u2", None, None, 0.5, "call 626 for help."),
            hit("u3", None, None, 0.4, "Visit any branch."),
        ]);
        let context = assembler.assemble(&retrieved, Intent::General, None);
        assert_eq!(context.passage_ids, vec!["b1", "f1", "u1", "u3"]);

        let mut pairs = HashSet::new();
        for id in &context.passage_ids {
            let passage = &retrieved.hits.iter().find(|h| &h.passage.passage_id == id).expect("hit").passage;
            if let Some(section) = passage.section {
                assert!(pairs.insert((passage.product_id.clone(), section)));
            }
        }
    }

    #[test]
    fn budget_drops_whole_passages_from_the_tail() {
        let long = "Free monthly maintenance for six months. ".repeat(4);
        let retrieved = result(vec![
            hit("a", Some("amayi angathe"), Some(Intent::Benefits), 0.9, long.trim()),
            hit("b", Some("amayi angathe"), Some(Intent::Fees), 0.8, long.trim()),
            hit("c", Some("amayi angathe"), Some(Intent::Requirements), 0.7, "Valid ID."),
        ]);
        let first_block = render_block(&retrieved.hits[0].passage);
        let budget = first_block.chars().count() + 10;
        let assembler = ContextAssembler::new(budget, false);

        let context = assembler.assemble(&retrieved, Intent::General, None);
        assert_eq!(context.passage_ids, vec!["a"]);
        assert!(context.text.chars().count() <= budget);
        assert!(context.text.ends_with("six months."));
    }

    #[test]
    fn unlabelled_passages_use_source_header() {
        let assembler = ContextAssembler::default();
        let retrieved = result(vec![hit("x", None, None, 0.5, "Branch hours 8 to 3.")]);
        let context = assembler.assemble(&retrieved, Intent::General, None);
        assert!(context.text.starts_with("[Source: misc.pdf]\nBranch hours"));
    }

    #[test]
    fn empty_result_gives_empty_context() {
        let context = ContextAssembler::default().assemble(&RetrievalResult::default(), Intent::Fees, None);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
        assert!(context.sources.is_empty());
    }
}
