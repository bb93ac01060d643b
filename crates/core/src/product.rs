//! Canonical product ids derived from filenames, and free-text resolution
//! against the set of ids known to the corpus.

use crate::error::PipelineError;
use crate::models::{Product, ProductCategory, ProductId};
use std::collections::BTreeMap;
use tracing::debug;

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "txt", "md"];

/// Trailing tokens that describe the document rather than the product.
const GENERIC_SUFFIXES: &[&str] = &[
    "account",
    "accounts",
    "loan",
    "loans",
    "factsheet",
    "fact",
    "sheet",
    "product",
    "products",
    "profile",
    "brochure",
    "leaflet",
    "file",
];

/// Derives a canonical product id from a filename or source identifier.
///
/// Steps: drop a known document extension, replace separators and
/// punctuation with spaces, drop leading tokens that carry digits (ids,
/// dates, ordinals), drop generic trailing tokens, lowercase and trim.
/// The result is a fixed point: feeding it back returns it unchanged.
pub fn canonical_product_id(source: &str) -> Option<ProductId> {
    let base = source
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source)
        .trim();
    let stem = strip_extension(base);

    let spaced: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    let leading_noise = words
        .iter()
        .take_while(|word| word.chars().any(|c| c.is_ascii_digit()))
        .count();
    words.drain(..leading_noise);

    while words.len() > 1 && words.last().is_some_and(|word| GENERIC_SUFFIXES.contains(word)) {
        words.pop();
    }

    if words.is_empty() {
        return None;
    }
    Some(ProductId::new(words.join(" ")))
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, extension))
            if !stem.is_empty()
                && DOCUMENT_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(extension)) =>
        {
            stem
        }
        _ => name,
    }
}

/// Category from the filename tokens, read before suffix stripping.
pub fn infer_category(source: &str) -> ProductCategory {
    let lowered = source.to_lowercase();
    let has = |needle: &str| lowered.contains(needle);
    if has("loan") || has("mortgage") || has("advance") || has("finance") {
        ProductCategory::Loan
    } else if has("card") {
        ProductCategory::Card
    } else if has("current") || has("cheque") || has("transact") {
        ProductCategory::Current
    } else if has("deposit") || has("investment") || has("bond") || has("treasury") {
        ProductCategory::Investment
    } else if has("saving") || has("account") {
        ProductCategory::Savings
    } else {
        ProductCategory::Other
    }
}

/// Products known to the corpus, built once at index time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCatalog {
    products: BTreeMap<ProductId, Product>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the product behind `source_filename`, returning its id.
    pub fn register(&mut self, source_filename: &str) -> Option<ProductId> {
        let id = canonical_product_id(source_filename)?;
        let category = infer_category(source_filename);
        self.products.entry(id.clone()).or_insert_with(|| Product {
            display_name: id.display_name(),
            id: id.clone(),
            category,
            passage_ids: Vec::new(),
        });
        Some(id)
    }

    pub fn link_passage(&mut self, id: &ProductId, passage_id: &str) {
        if let Some(product) = self.products.get_mut(id) {
            product.passage_ids.push(passage_id.to_string());
        }
    }

    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.products.keys()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Strict free-text resolution.
    ///
    /// Ids are tried longest first, so "amayi angathe" beats "amayi". A
    /// match only counts on word boundaries. If two different ids of the
    /// same length both match and neither contains the other, the query
    /// is ambiguous.
    pub fn resolve_text_strict(&self, text: &str) -> Result<Option<ProductId>, PipelineError> {
        let haystack = format!(" {} ", normalize_free_text(text));
        let mut ordered: Vec<&ProductId> = self.products.keys().collect();
        ordered.sort_by(|left, right| {
            right
                .as_str()
                .len()
                .cmp(&left.as_str().len())
                .then_with(|| left.cmp(right))
        });

        let matched: Vec<&ProductId> = ordered
            .into_iter()
            .filter(|id| haystack.contains(&format!(" {} ", id.as_str())))
            .collect();

        let Some(first) = matched.first() else {
            return Ok(None);
        };

        let rivals: Vec<ProductId> = matched
            .iter()
            .filter(|id| {
                id.as_str().len() == first.as_str().len()
                    && !first.as_str().contains(id.as_str())
            })
            .map(|id| (*id).clone())
            .collect();

        if !rivals.is_empty() {
            let mut tied = vec![(*first).clone()];
            tied.extend(rivals);
            return Err(PipelineError::AmbiguousProduct(tied));
        }

        Ok(Some((*first).clone()))
    }

    /// Free-text resolution where ambiguity means "no product filter".
    pub fn resolve_text(&self, text: &str) -> Option<ProductId> {
        match self.resolve_text_strict(text) {
            Ok(found) => found,
            Err(error) => {
                debug!(%error, "product resolution ambiguous, using no product filter");
                None
            }
        }
    }
}

fn normalize_free_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_canonicalised() {
        let cases = [
            ("amayi-angathe-account.pdf", "amayi angathe"),
            ("01_Mlimi_Loan.PDF", "mlimi"),
            ("2023-05_nb01_pafupi-savings-account-factsheet.docx", "pafupi savings"),
            ("national-bank-products/visa-gold-card.pdf", "visa gold card"),
            ("Amayi Angathe", "amayi angathe"),
            ("savings account.txt", "savings"),
            ("loan.pdf", "loan"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                canonical_product_id(input).map(|id| id.as_str().to_string()),
                Some(expected.to_string()),
                "{input}"
            );
        }
    }

    #[test]
    fn canonicalisation_is_idempotent() {
        for input in [
            "01_Mlimi_Loan.PDF",
            "123-amayi-angathe-account-factsheet.pdf",
            "v2 fixed.deposit.account.md",
            "Kwacha__Current  Account.docx",
            "loan-account.pdf",
        ] {
            let once = canonical_product_id(input).expect("id");
            let twice = canonical_product_id(once.as_str()).expect("id");
            assert_eq!(once, twice, "{input}");
        }
    }

    #[test]
    fn noise_only_names_have_no_product() {
        assert_eq!(canonical_product_id("2024_01.pdf"), None);
        assert_eq!(canonical_product_id("  "), None);
    }

    #[test]
    fn categories_come_from_filename_tokens() {
        assert_eq!(infer_category("mlimi-loan.pdf"), ProductCategory::Loan);
        assert_eq!(infer_category("amayi-angathe-account.pdf"), ProductCategory::Savings);
        assert_eq!(infer_category("kwacha-current-account.pdf"), ProductCategory::Current);
        assert_eq!(infer_category("visa-card.pdf"), ProductCategory::Card);
        assert_eq!(infer_category("brochure.pdf"), ProductCategory::Other);
    }

    fn catalog(names: &[&str]) -> ProductCatalog {
        let mut catalog = ProductCatalog::new();
        for name in names {
            catalog.register(name);
        }
        catalog
    }

    #[test]
    fn free_text_prefers_the_longest_id() {
        let catalog = catalog(&["amayi.pdf", "amayi-angathe-account.pdf", "mlimi-loan.pdf"]);
        assert_eq!(
            catalog.resolve_text("Benefits of amayi angathe account"),
            Some(ProductId::new("amayi angathe"))
        );
        assert_eq!(
            catalog.resolve_text("What is the Mlimi loan?"),
            Some(ProductId::new("mlimi"))
        );
        assert_eq!(catalog.resolve_text("What is a savings account?"), None);
    }

    #[test]
    fn matches_respect_word_boundaries() {
        let catalog = catalog(&["mlimi-loan.pdf"]);
        assert_eq!(catalog.resolve_text("alimlimi"), None);
    }

    #[test]
    fn equal_rank_matches_are_ambiguous() {
        let catalog = catalog(&["mlimi-loan.pdf", "pafupi-account.pdf", "kwiri-loan.pdf"]);
        let strict = catalog.resolve_text_strict("compare mlimi and kwiri");
        assert!(matches!(strict, Err(PipelineError::AmbiguousProduct(ids)) if ids.len() == 2));
        assert_eq!(catalog.resolve_text("compare mlimi and kwiri"), None);
    }

    #[test]
    fn catalog_tracks_passages_by_id() {
        let mut catalog = ProductCatalog::new();
        let id = catalog.register("mlimi-loan.pdf").expect("id");
        catalog.link_passage(&id, "p-1");
        let product = catalog.get(&id).expect("product");
        assert_eq!(product.display_name, "Mlimi");
        assert_eq!(product.category, ProductCategory::Loan);
        assert_eq!(product.passage_ids, vec!["p-1".to_string()]);
    }
}
