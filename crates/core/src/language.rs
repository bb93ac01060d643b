//! Lexical language detection between English and Chichewa.
//!
//! No model or training data: each token is checked against two small
//! lexicons and the language with more hits wins. Ties go to English, the
//! pivot language, so an unrecognised query is never sent for translation.

use crate::models::Language;

const CHICHEWA_MARKERS: &[&str] = &[
    "ndi", "ndili", "ndine", "ndikufuna", "ndiuzeni", "ndingathe", "ndingapeze", "za", "wa",
    "ya", "la", "cha", "zanu", "zake", "kodi", "chani", "chiyani", "bwanji", "muli", "moni",
    "zikomo", "ubwino", "zofunikira", "zofunika", "mtengo", "mitengo", "phindu", "ngongole",
    "kusunga", "ndalama", "banki", "mafunso", "funso", "pa", "mu", "kwa", "komanso", "ngati",
    "chonde", "inu", "ine", "ife", "iwo", "uyu", "izi", "ili", "ali", "angati", "zingati",
    "nanga", "ayi", "eya", "inde", "lero", "mawa", "dzulo", "kuti", "koma", "kapena", "bwino",
    "wawa", "zikuyenda", "mungandiuze", "ndifunse", "tsegula", "kutsegula", "akaunti",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "a", "an", "of", "for", "what", "which", "who", "how", "is", "are", "do", "does",
    "can", "i", "you", "me", "my", "your", "to", "in", "on", "and", "or", "with", "about",
    "tell", "please", "hello", "hi", "thanks", "thank", "benefits", "requirements", "fees",
    "features", "much", "cost", "need", "open", "get", "there", "this", "that", "it", "be",
    "have", "has", "why", "when", "where", "should", "would", "could",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageScores {
    pub chichewa_hits: usize,
    pub english_hits: usize,
}

pub fn score_language(text: &str) -> LanguageScores {
    let mut chichewa_hits = 0;
    let mut english_hits = 0;
    for token in tokens(text) {
        if CHICHEWA_MARKERS.contains(&token.as_str()) {
            chichewa_hits += 1;
        }
        if ENGLISH_MARKERS.contains(&token.as_str()) {
            english_hits += 1;
        }
    }
    LanguageScores {
        chichewa_hits,
        english_hits,
    }
}

pub fn detect_language(text: &str) -> Language {
    let scores = score_language(text);
    if scores.chichewa_hits > scores.english_hits {
        Language::Chichewa
    } else {
        Language::English
    }
}

/// Lowercased alphabetic tokens, punctuation stripped.
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|token| !token.is_empty())
        .map(|token| token.trim_matches('\'').to_lowercase())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chichewa_queries_are_detected() {
        for query in [
            "Ubwino wa amayi angathe account",
            "Zofunikira za mlimi loan ndi chani?",
            "Mtengo wa savings account",
            "Moni, muli bwanji?",
            "Phindu pa mlimi loan",
        ] {
            assert_eq!(detect_language(query), Language::Chichewa, "{query}");
        }
    }

    #[test]
    fn english_queries_are_detected() {
        for query in [
            "What are the benefits of the Amayi Angathe account?",
            "How much does the mlimi loan cost?",
            "Hello there",
        ] {
            assert_eq!(detect_language(query), Language::English, "{query}");
        }
    }

    #[test]
    fn unknown_text_defaults_to_pivot() {
        assert_eq!(detect_language("amayi angathe"), Language::English);
        assert_eq!(detect_language(""), Language::English);
    }
}
