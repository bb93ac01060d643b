//! Section labelling for product documents.
//!
//! Runs once at ingestion time. Heading lines switch the current section;
//! following paragraphs inherit it until the next heading. Headings that
//! name no known section (product titles, "Contact us") clear the label.

use crate::models::Intent;

const MAX_HEADING_CHARS: usize = 60;
const MAX_HEADING_WORDS: usize = 8;

/// Lower case words allowed inside a title-case heading.
const CONNECTING_WORDS: &[&str] = &["and", "or", "of", "to", "the", "for", "a", "an", "in", "on", "with", "you"];

fn is_title_case(line: &str) -> bool {
    line.split_whitespace().all(|word| {
        let Some(first) = word.chars().find(|c| c.is_alphabetic()) else {
            return true;
        };
        first.is_uppercase() || CONNECTING_WORDS.contains(&word.to_lowercase().as_str())
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledParagraph {
    pub section: Option<Intent>,
    pub text: String,
    pub is_heading: bool,
}

#[derive(Debug, Clone)]
pub struct SectionLabeler {
    cues: Vec<(Intent, Vec<&'static str>)>,
}

impl Default for SectionLabeler {
    fn default() -> Self {
        Self {
            cues: vec![
                (
                    Intent::Benefits,
                    vec!["benefit", "advantage", "why choose", "what you get", "value proposition"],
                ),
                (
                    Intent::Requirements,
                    vec![
                        "requirement",
                        "eligibility",
                        "who can apply",
                        "who qualifies",
                        "what you need",
                        "documents required",
                        "how to apply",
                        "how to open",
                    ],
                ),
                (
                    Intent::Fees,
                    vec!["fee", "charge", "tariff", "pricing", "interest rate", "rates", "cost"],
                ),
                (
                    Intent::Features,
                    vec!["feature", "how it works", "product description", "key facts"],
                ),
            ],
        }
    }
}

impl SectionLabeler {
    /// Section named by a heading-like line, in intent priority order.
    pub fn section_of(&self, line: &str) -> Option<Intent> {
        let lowered = line.to_lowercase();
        self.cues.iter().find_map(|(intent, cues)| {
            cues.iter()
                .any(|cue| lowered.contains(cue))
                .then_some(*intent)
        })
    }

    /// Short line without sentence punctuation that ends with a colon, is
    /// upper case, or names a section and is shaped like a heading (title
    /// case, or nothing but the cue). Bullets such as "No monthly fee" carry
    /// cue words too, so a cue alone is not enough.
    pub fn is_heading(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.chars().count() > MAX_HEADING_CHARS
            || trimmed.split_whitespace().count() > MAX_HEADING_WORDS
            || trimmed.ends_with('.')
        {
            return false;
        }
        let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
        let upper = !letters.is_empty() && letters.iter().all(|c| c.is_uppercase());
        if trimmed.ends_with(':') || upper {
            return true;
        }
        self.section_of(trimmed).is_some() && (is_title_case(trimmed) || self.is_bare_cue(trimmed))
    }

    /// Nothing but cue text and connecting words, e.g. "how to apply".
    fn is_bare_cue(&self, line: &str) -> bool {
        let mut rest = line.to_lowercase();
        for (_, cues) in &self.cues {
            for cue in cues {
                rest = rest.replace(cue, " ");
            }
        }
        rest.split(|c: char| !c.is_alphabetic())
            .filter(|word| word.chars().count() > 1)
            .all(|word| CONNECTING_WORDS.contains(&word))
    }

    /// `"Benefits: free ATM card"` style lines: the label and the body.
    fn inline_section<'a>(&self, paragraph: &'a str) -> Option<(Intent, &'a str)> {
        let (head, body) = paragraph.split_once(':')?;
        if body.trim().is_empty() || !self.is_heading(head) {
            return None;
        }
        self.section_of(head).map(|intent| (intent, body))
    }

    pub fn label(&self, paragraphs: &[String]) -> Vec<LabeledParagraph> {
        let mut current: Option<Intent> = None;
        let mut labeled = Vec::with_capacity(paragraphs.len());

        for paragraph in paragraphs {
            if self.is_heading(paragraph) {
                current = self.section_of(paragraph);
                labeled.push(LabeledParagraph {
                    section: current,
                    text: paragraph.clone(),
                    is_heading: true,
                });
                continue;
            }

            if let Some((intent, _body)) = self.inline_section(paragraph) {
                current = Some(intent);
            }

            labeled.push(LabeledParagraph {
                section: current,
                text: paragraph.clone(),
                is_heading: false,
            });
        }

        labeled
    }
}
