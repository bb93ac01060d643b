//! Query normalisation: language detection and translation to the pivot
//! language, with known product names carried through untranslated.

use crate::error::{BackendError, PipelineError};
use crate::language::detect_language;
use crate::models::Language;
use crate::traits::Translator;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub source_language: Language,
    pub pivot_text: String,
    /// The translation backend failed and `pivot_text` is the raw text.
    pub degraded: bool,
}

/// Product names found in a query, swapped for placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MaskedText {
    pub text: String,
    /// `(placeholder, original span)` in order of first appearance.
    pub spans: Vec<(String, String)>,
}

pub struct QueryNormalizer<T> {
    translator: T,
    timeout: Duration,
    protected: Vec<Regex>,
}

impl<T> QueryNormalizer<T>
where
    T: Translator,
{
    pub fn new(translator: T, timeout: Duration) -> Self {
        Self {
            translator,
            timeout,
            protected: Vec::new(),
        }
    }

    /// Names that must survive translation verbatim. Longer names are
    /// matched first.
    pub fn with_protected_names<I, S>(mut self, names: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort_by(|left, right| right.len().cmp(&left.len()).then(left.cmp(right)));
        names.dedup();

        self.protected = names
            .iter()
            .map(|name| {
                let words: Vec<String> = name.split_whitespace().map(regex::escape).collect();
                Regex::new(&format!(r"(?i)\b{}\b", words.join(r"[\s\-_]+")))
                    .map_err(|error| PipelineError::Config(format!("product name pattern: {error}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Pivot text or `TranslationUnavailable`. English input never reaches
    /// the backend.
    pub async fn try_normalize(&self, raw_text: &str) -> Result<(Language, String), PipelineError> {
        let trimmed = raw_text.trim();
        let source_language = detect_language(trimmed);
        if source_language.is_pivot() {
            return Ok((source_language, trimmed.to_string()));
        }

        let masked = self.mask(trimmed);
        let translated = tokio::time::timeout(
            self.timeout,
            self.translator
                .translate(&masked.text, source_language, Language::PIVOT),
        )
        .await
        .map_err(|_| BackendError::Timeout {
            backend: "translation".to_string(),
            after: self.timeout,
        })
        .and_then(|result| result)
        .and_then(|translated| {
            if translated.trim().is_empty() {
                Err(BackendError::BackendResponse {
                    backend: "translation".to_string(),
                    details: "empty translation".to_string(),
                })
            } else {
                Ok(translated)
            }
        })
        .map_err(PipelineError::TranslationUnavailable)?;

        let pivot_text = unmask(translated.trim(), &masked.spans);
        debug!(%source_language, pivot_text, "query translated");
        Ok((source_language, pivot_text))
    }

    /// Like [`Self::try_normalize`], falling back to the raw text when the
    /// backend is unavailable.
    pub async fn normalize(&self, raw_text: &str) -> NormalizedQuery {
        match self.try_normalize(raw_text).await {
            Ok((source_language, pivot_text)) => NormalizedQuery {
                source_language,
                pivot_text,
                degraded: false,
            },
            Err(error) => {
                warn!(%error, "translation unavailable, using raw query text");
                NormalizedQuery {
                    source_language: detect_language(raw_text),
                    pivot_text: raw_text.trim().to_string(),
                    degraded: true,
                }
            }
        }
    }

    pub(crate) fn mask(&self, text: &str) -> MaskedText {
        let mut masked = text.to_string();
        let mut spans = Vec::new();
        for pattern in &self.protected {
            let Some(found) = pattern.find(&masked) else {
                continue;
            };
            let original = found.as_str().to_string();
            let placeholder = format!("[P{}]", spans.len());
            masked = pattern
                .replace_all(&masked, regex::NoExpand(&placeholder))
                .into_owned();
            spans.push((placeholder, original));
        }
        MaskedText {
            text: masked,
            spans,
        }
    }
}

/// Restores placeholders; a name the backend dropped is appended.
pub(crate) fn unmask(translated: &str, spans: &[(String, String)]) -> String {
    let mut restored = translated.to_string();
    for (placeholder, original) in spans {
        if restored.contains(placeholder.as_str()) {
            restored = restored.replace(placeholder.as_str(), original);
        } else if !restored.to_lowercase().contains(&original.to_lowercase()) {
            restored.push(' ');
            restored.push_str(original);
        }
    }
    restored
}
