//! English to Chichewa terminology and phrase table.
//!
//! Used twice during answer rendering: as worked examples inside the
//! rendering prompt, and as a substitution pass over the rendered answer
//! for stock English phrases the backend left untranslated.

use crate::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Markers for entries that must never be substituted verbatim.
const SKIP: &str = "SKIP";
const REPHRASE: &str = "REPHRASE";

const BUILT_IN: &[(&str, &str, &str)] = &[
    ("Sure", "Inde", "affirmation"),
    ("I understand", "Ndamva", "acknowledgement"),
    ("Thank you for asking", "Zikomo pofunsa", "opening"),
    ("I can help with that", "Nditha kukuthandizani pa izi", "opening"),
    ("We have", "Tili ndi", "listing products"),
    ("You can", "Mutha", "instructions"),
    ("For example", "Mwachitsanzo", "examples"),
    ("Please note", "Dziwani kuti", "caveats"),
    ("If you have any questions", "Ngati muli ndi mafunso ena", "closing"),
    ("I hope this helps", "Ndikukhulupirira kuti izi zakuthandizani", "closing"),
    ("Here they are", "Ndi uwu", "listing"),
    ("Hello", SKIP, "never open with the textbook greeting"),
    ("Unfortunately", SKIP, "state the fact directly"),
    ("Actually", REPHRASE, "restructure the sentence"),
    ("Well", REPHRASE, "use Ndiye or drop it"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub english: String,
    pub chichewa: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl PhraseEntry {
    pub fn new(english: &str, chichewa: &str) -> Self {
        Self {
            english: english.to_string(),
            chichewa: chichewa.to_string(),
            context: None,
        }
    }

    /// False for empty, `SKIP` and `REPHRASE` entries.
    pub fn is_substitutable(&self) -> bool {
        let target = self.chichewa.trim();
        !target.is_empty() && target != SKIP && target != REPHRASE
    }
}

#[derive(Debug)]
struct Substitution {
    pattern: Regex,
    replacement: String,
}

#[derive(Debug)]
pub struct PhraseBook {
    entries: Vec<PhraseEntry>,
    substitutions: Vec<Substitution>,
}

impl PhraseBook {
    /// Built-in table with `overrides` merged over it; an override with the
    /// same English phrase (case-insensitive) replaces the built-in entry.
    pub fn with_overrides(overrides: &[PhraseEntry]) -> Result<Self, PipelineError> {
        let mut entries: Vec<PhraseEntry> = BUILT_IN
            .iter()
            .map(|(english, chichewa, context)| PhraseEntry {
                english: english.to_string(),
                chichewa: chichewa.to_string(),
                context: Some(context.to_string()),
            })
            .collect();

        for entry in overrides {
            let english = entry.english.trim();
            if english.is_empty() {
                continue;
            }
            match entries
                .iter_mut()
                .find(|existing| existing.english.eq_ignore_ascii_case(english))
            {
                Some(existing) => *existing = entry.clone(),
                None => entries.push(entry.clone()),
            }
        }

        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<PhraseEntry>) -> Result<Self, PipelineError> {
        let mut usable: Vec<&PhraseEntry> = entries
            .iter()
            .filter(|entry| entry.is_substitutable())
            .collect();
        // Longest phrase first so "Thank you for asking" wins over "Thank you".
        usable.sort_by(|left, right| right.english.len().cmp(&left.english.len()));

        let substitutions = usable
            .into_iter()
            .map(|entry| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(entry.english.trim()));
                Regex::new(&pattern)
                    .map(|pattern| Substitution {
                        pattern,
                        replacement: entry.chichewa.trim().to_string(),
                    })
                    .map_err(|error| PipelineError::Config(format!("phrase pattern: {error}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            substitutions,
        })
    }

    pub fn entries(&self) -> &[PhraseEntry] {
        &self.entries
    }

    /// Replaces stock English phrases left in a rendered answer.
    pub fn apply(&self, text: &str) -> String {
        self.substitutions
            .iter()
            .fold(text.to_string(), |current, substitution| {
                substitution
                    .pattern
                    .replace_all(&current, regex::NoExpand(&substitution.replacement))
                    .into_owned()
            })
    }

    /// `"English" → "Chichewa"` lines for prompts, skipping unusable entries.
    pub fn examples(&self, limit: usize) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_substitutable())
            .take(limit)
            .map(|entry| format!("\"{}\" → \"{}\"", entry.english, entry.chichewa))
            .collect()
    }

    pub fn guidelines(&self) -> String {
        let mut text = String::from(
            "CHICHEWA RESPONSE GUIDELINES:\n\
             1. Write everyday conversational Chichewa; never translate word for word.\n\
             2. Keep banking terms in English: account, loan, ATM, MK, EFT, interest rate.\n\
             3. Common phrases:\n",
        );
        for example in self.examples(15) {
            text.push_str("   - ");
            text.push_str(&example);
            text.push('\n');
        }

        let avoided: Vec<&str> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_substitutable())
            .map(|entry| entry.english.as_str())
            .collect();
        if !avoided.is_empty() {
            text.push_str("4. Do not translate these directly, restructure instead: ");
            text.push_str(&avoided.join(", "));
            text.push('\n');
        }

        text.push_str(
            "5. Use natural connectors: komanso, zomwe, moti, motsatira, ndiye, kenako, chifukwa, ngati.\n\
             6. Start with the content. If a greeting is needed use \"Zikomo\", never \"Moni\".\n\
             7. Use bullet points for lists and end with \"Ngati muli ndi mafunso ena, mutha kufunsa\".\n",
        );
        text
    }
}
