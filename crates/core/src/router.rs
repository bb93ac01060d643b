//! Query-type routing: greetings and off-topic turns never reach retrieval.

use crate::language::tokens;
use crate::models::{Language, QueryType};
use tracing::debug;

const GREETING_PHRASES: &[&str] = &[
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "thank you",
    "muli bwanji",
    "mwadzuka bwanji",
    "mwaswera bwanji",
    "zikuyenda bwanji",
];

const GREETING_TOKENS: &[&str] = &[
    "hello", "hi", "hey", "greetings", "thanks", "bye", "goodbye", "moni", "zikomo", "wawa",
    "muli", "bwanji", "ndili", "bwino", "nanunso", "good", "morning", "afternoon", "evening",
    "how", "are", "you", "thank", "there", "ndatsazikana", "tsalani",
];

const BANKING_TERMS: &[&str] = &[
    "account", "loan", "bank", "banking", "card", "atm", "deposit", "withdraw", "savings",
    "saving", "balance", "interest", "fee", "charge", "overdraft", "mortgage", "credit",
    "debit", "cheque", "transfer", "eft", "mobile banking", "internet banking", "product",
    "benefit", "requirement", "eligib", "akaunti", "ngongole", "ndalama", "banki", "kusunga",
    "ubwino", "zofunikira", "mtengo", "phindu", "contact", "call centre", "phone", "branch",
    "service centre", "email", "nambala", "foni", "nthambi",
];

const OUT_OF_SCOPE_TERMS: &[&str] = &[
    "weather", "rain", "temperature", "football", "soccer", "match score", "election",
    "politic", "president", "recipe", "cook", "movie", "music", "song", "joke", "poem",
    "homework", "capital city", "news", "mvula", "nyengo", "mpira", "nyimbo", "ndale",
    "kwacha bwanji",
];

#[derive(Debug, Clone, Default)]
pub struct QueryTypeRouter {
    extra_banking_terms: Vec<String>,
}

impl QueryTypeRouter {
    /// `product_names` count as banking terms, so "moni, amayi angathe?" is
    /// an inquiry rather than a greeting.
    pub fn with_product_names<I, S>(product_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extra_banking_terms: product_names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Routes on both raw and pivot text; either may carry the cue.
    pub fn route(&self, raw_text: &str, pivot_text: &str) -> QueryType {
        let combined = format!("{raw_text}\n{pivot_text}").to_lowercase();
        let query_type = self.route_lowered(&combined);
        debug!(%query_type, "query routed");
        query_type
    }

    fn route_lowered(&self, lowered: &str) -> QueryType {
        if self.mentions_banking(lowered) {
            return QueryType::ProductInquiry;
        }
        if is_math_expression(lowered)
            || OUT_OF_SCOPE_TERMS.iter().any(|term| lowered.contains(term))
        {
            return QueryType::OutOfScope;
        }
        if is_greeting(lowered) {
            return QueryType::Greeting;
        }
        QueryType::ProductInquiry
    }

    fn mentions_banking(&self, lowered: &str) -> bool {
        BANKING_TERMS.iter().any(|term| lowered.contains(term))
            || self
                .extra_banking_terms
                .iter()
                .any(|term| lowered.contains(term.as_str()))
    }
}

fn is_greeting(lowered: &str) -> bool {
    let mut remainder = lowered.to_string();
    for phrase in GREETING_PHRASES {
        remainder = remainder.replace(phrase, " ");
    }
    let leftover: Vec<String> = tokens(&remainder)
        .filter(|token| !GREETING_TOKENS.contains(&token.as_str()))
        .collect();
    let had_greeting = GREETING_PHRASES.iter().any(|phrase| lowered.contains(phrase))
        || tokens(lowered).any(|token| GREETING_TOKENS.contains(&token.as_str()));
    had_greeting && leftover.is_empty()
}

fn is_math_expression(lowered: &str) -> bool {
    let has_digit = lowered.chars().any(|c| c.is_ascii_digit());
    let has_operator = lowered
        .chars()
        .any(|c| matches!(c, '+' | '*' | '/' | '=' | '×' | '÷'));
    has_digit && has_operator
}

/// Fixed welcome text for greeting turns.
pub fn greeting_reply(language: Language) -> &'static str {
    match language {
        Language::English => {
            "Hello! I can help you with questions about our bank's products, such as \
             accounts and loans: their benefits, requirements, fees and features. \
             What would you like to know?"
        }
        Language::Chichewa => {
            "Zikomo pobwera! Ndingakuthandizeni ndi mafunso okhudza zinthu za banki yathu \
             monga ma account ndi ma loan: ubwino wake, zofunikira, mitengo ndi \
             kagwiritsidwe ntchito. Mukufuna kudziwa chiyani?"
        }
    }
}

/// Fixed redirect text for off-topic turns.
pub fn out_of_scope_reply(language: Language) -> &'static str {
    match language {
        Language::English => {
            "I'm sorry, I can only answer questions about our bank's products and \
             services, such as accounts, loans and cards. Is there anything about \
             our products you would like to know?"
        }
        Language::Chichewa => {
            "Pepani, ndingathe kuyankha mafunso okhudza zinthu za banki yathu zokha, \
             monga ma account, ma loan ndi ma card. Kodi pali zina zomwe mukufuna \
             kudziwa za zinthu zathu?"
        }
    }
}
