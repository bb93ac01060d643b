use crate::config::ChunkingSection;
use crate::error::IngestError;
use crate::models::{Document, Intent, Passage};
use crate::sections::{LabeledParagraph, SectionLabeler};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&ChunkingSection::default())
    }
}

impl From<&ChunkingSection> for ChunkingConfig {
    fn from(value: &ChunkingSection) -> Self {
        Self {
            max_chars: value.max_chars,
            overlap_chars: value.overlap_chars,
            min_chars: value.min_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be below max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// A packed chunk before it becomes a [`Passage`].
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledChunk {
    pub section: Option<Intent>,
    pub text: String,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits raw document text into whitespace-normalised paragraphs.
///
/// Blank lines end a paragraph; so does a heading line, which becomes a
/// paragraph of its own. Other consecutive lines are joined.
pub fn split_paragraphs(raw: &str, labeler: &SectionLabeler) -> Vec<String> {
    fn flush(current: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
        if !current.is_empty() {
            let joined = normalize_whitespace(&current.join(" "));
            if !joined.is_empty() {
                paragraphs.push(joined);
            }
            current.clear();
        }
    }

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut current, &mut paragraphs);
            continue;
        }
        if labeler.is_heading(trimmed) {
            flush(&mut current, &mut paragraphs);
            paragraphs.push(normalize_whitespace(trimmed));
            continue;
        }
        current.push(trimmed);
    }
    flush(&mut current, &mut paragraphs);

    paragraphs
}

/// Sentence split on `.`, `!` and `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if at_boundary {
                let end = index + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Packs consecutive paragraphs of the same section into chunks of at most
/// `max_chars`. A chunk never crosses a section change. Paragraphs longer
/// than the window are split on sentence boundaries; only a single sentence
/// longer than the window is cut by characters, with `overlap_chars`.
pub fn chunk_by_paragraph(paragraphs: &[LabeledParagraph], config: ChunkingConfig) -> Vec<LabeledChunk> {
    fn push(chunks: &mut Vec<LabeledChunk>, text: &mut String, section: Option<Intent>) {
        if !text.is_empty() {
            chunks.push(LabeledChunk {
                section,
                text: std::mem::take(text),
            });
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_section: Option<Intent> = None;

    for paragraph in paragraphs {
        if paragraph.section != current_section || paragraph.is_heading {
            push(&mut chunks, &mut current, current_section);
            current_section = paragraph.section;
        }

        for piece in fit_to_window(&paragraph.text, config) {
            if current.is_empty() {
                current.push_str(&piece);
            } else if current.chars().count() + piece.chars().count() + 1 <= config.max_chars {
                current.push('\n');
                current.push_str(&piece);
            } else {
                push(&mut chunks, &mut current, current_section);
                current.push_str(&piece);
            }
        }
    }
    push(&mut chunks, &mut current, current_section);

    chunks
        .into_iter()
        .filter(|chunk| chunk.section.is_some() || chunk.text.chars().count() >= config.min_chars)
        .collect()
}

fn fit_to_window(text: &str, config: ChunkingConfig) -> Vec<String> {
    if text.chars().count() <= config.max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if sentence_len > config.max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(char_windows(&sentence, config));
            continue;
        }
        if current.is_empty() {
            current = sentence;
        } else if current.chars().count() + sentence_len + 1 <= config.max_chars {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            pieces.push(std::mem::replace(&mut current, sentence));
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn char_windows(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = config.max_chars.saturating_sub(config.overlap_chars).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Splits one document into labelled passages. All passages of a document
/// share its product id, so no passage spans two products.
pub fn build_passages(
    document: &Document,
    labeler: &SectionLabeler,
    config: ChunkingConfig,
) -> Result<Vec<Passage>, IngestError> {
    config.validate()?;
    let paragraphs = split_paragraphs(&document.raw_text, labeler);
    let labeled = labeler.label(&paragraphs);

    let passages = chunk_by_paragraph(&labeled, config)
        .into_iter()
        .enumerate()
        .map(|(position, chunk)| {
            let position = position as u64;
            Passage {
                passage_id: make_passage_id(&document.document_id, position, &chunk.text),
                document_id: document.document_id.clone(),
                source_filename: document.source_filename.clone(),
                product_id: document.product_id.clone(),
                position,
                text: chunk.text,
                section: chunk.section,
            }
        })
        .collect();

    Ok(passages)
}

fn make_passage_id(document_id: &str, position: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(position.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
