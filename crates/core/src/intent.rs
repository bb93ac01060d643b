//! Deterministic keyword-table intent classification.
//!
//! Intents are tested in the fixed priority order
//! benefits > requirements > fees > features; the first intent with any
//! keyword in the text wins, otherwise `general`. Matching is
//! case-insensitive and anchored at word starts, with at most a two
//! letter inflection after the keyword ("fees", "zofunikira"), so "fee"
//! does not fire on "coffee" or "feedback". Synonyms missing from the
//! tables are not recognised. That is a known limitation and stays
//! deterministic.

use crate::models::{Intent, Language};
use std::collections::BTreeMap;
use tracing::debug;

const MAX_INFLECTION_CHARS: usize = 2;

/// `keyword` occurs in `lowered` at the start of a word and the rest of
/// that word is a short inflection.
pub(crate) fn contains_keyword(lowered: &str, keyword: &str) -> bool {
    lowered.match_indices(keyword).any(|(start, _)| {
        let at_word_start = lowered[..start]
            .chars()
            .next_back()
            .map_or(true, |previous| !previous.is_alphanumeric());
        let tail = lowered[start + keyword.len()..]
            .chars()
            .take_while(|next| next.is_alphanumeric())
            .count();
        at_word_start && tail <= MAX_INFLECTION_CHARS
    })
}

/// Keyword sets for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    pub language: Language,
    rules: BTreeMap<Intent, Vec<String>>,
}

impl KeywordTable {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            rules: BTreeMap::new(),
        }
    }

    /// Adds keywords for a specific intent. `General` is the fallback and
    /// cannot carry keywords.
    pub fn with_keywords(mut self, intent: Intent, keywords: &[&str]) -> Self {
        if intent.is_specific() {
            self.rules
                .entry(intent)
                .or_default()
                .extend(keywords.iter().map(|keyword| keyword.to_lowercase()));
        }
        self
    }

    pub fn without_keyword(mut self, intent: Intent, keyword: &str) -> Self {
        let keyword = keyword.to_lowercase();
        if let Some(words) = self.rules.get_mut(&intent) {
            words.retain(|existing| existing != &keyword);
        }
        self
    }

    pub fn keywords(&self, intent: Intent) -> &[String] {
        self.rules.get(&intent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First keyword of `intent` found in already lowercased text.
    pub fn keyword_for<'a>(&'a self, intent: Intent, lowered: &str) -> Option<&'a str> {
        self.keywords(intent)
            .iter()
            .find(|keyword| contains_keyword(lowered, keyword))
            .map(String::as_str)
    }

    pub fn english() -> Self {
        Self::new(Language::English)
            .with_keywords(
                Intent::Benefits,
                &["benefit", "advantage", "why choose", "what do i get", "perks"],
            )
            .with_keywords(
                Intent::Requirements,
                &[
                    "requirement",
                    "eligibility",
                    "eligible",
                    "qualify",
                    "need to",
                    "criteria",
                    "documents needed",
                ],
            )
            .with_keywords(
                Intent::Fees,
                &[
                    "fee",
                    "cost",
                    "charge",
                    "price",
                    "interest",
                    "how much",
                    "tariff",
                ],
            )
            .with_keywords(
                Intent::Features,
                &["how does", "how to use", "functionality", "works", "feature"],
            )
    }

    pub fn chichewa() -> Self {
        Self::new(Language::Chichewa)
            .with_keywords(Intent::Benefits, &["ubwino", "zabwino"])
            .with_keywords(Intent::Requirements, &["zofunikira", "zofunika", "ziyeneretso"])
            .with_keywords(Intent::Fees, &["mtengo", "mitengo", "phindu", "chiwongola"])
            .with_keywords(Intent::Features, &["kagwiritsidwe", "zimagwira"])
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self::english(),
            Language::Chichewa => Self::chichewa(),
        }
    }
}

/// Classifier over an ordered set of per-language tables.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    tables: Vec<KeywordTable>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(vec![KeywordTable::english(), KeywordTable::chichewa()])
    }
}

impl IntentClassifier {
    pub fn new(tables: Vec<KeywordTable>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[KeywordTable] {
        &self.tables
    }

    /// Classifies pivot-language text against every table.
    ///
    /// Each priority level is checked across all tables before moving to the
    /// next, so mixed-language text still honours the priority order.
    pub fn classify(&self, text: &str) -> Intent {
        let lowered = text.to_lowercase();
        for intent in Intent::PRIORITY {
            if let Some((language, keyword)) = self.keyword_in(intent, &lowered) {
                debug!(%intent, keyword, %language, "intent keyword matched");
                return intent;
            }
        }
        Intent::General
    }

    /// Classifies a normalized query.
    ///
    /// One walk over the priority order; at each level the raw text is
    /// checked before the pivot text, over every table, so code-switched
    /// queries keep the priority order and a translation that rewrites a
    /// section keyword does not flip the intent.
    ///
    /// For a non-pivot source a `features` match found only in the
    /// translation is not trusted: backends render unknown section words
    /// ("zofunikira") as "features", so that case falls back to `general`.
    pub fn classify_query(&self, raw_text: &str, source: Language, pivot_text: &str) -> Intent {
        if source.is_pivot() {
            return self.classify(pivot_text);
        }
        let raw = raw_text.to_lowercase();
        let pivot = pivot_text.to_lowercase();
        for intent in Intent::PRIORITY {
            if let Some((language, keyword)) = self.keyword_in(intent, &raw) {
                debug!(%intent, keyword, %language, "intent taken from source text");
                return intent;
            }
            if intent == Intent::Features {
                if let Some((_, keyword)) = self.keyword_in(intent, &pivot) {
                    debug!(keyword, "translated-only features keyword ignored");
                }
                continue;
            }
            if let Some((language, keyword)) = self.keyword_in(intent, &pivot) {
                debug!(%intent, keyword, %language, "intent taken from pivot text");
                return intent;
            }
        }
        Intent::General
    }

    fn keyword_in<'a>(&'a self, intent: Intent, lowered: &str) -> Option<(Language, &'a str)> {
        self.tables.iter().find_map(|table| {
            table
                .keyword_for(intent, lowered)
                .map(|keyword| (table.language, keyword))
        })
    }
}
