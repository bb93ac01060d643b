use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

/// Extensions the ingestion boundary accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

pub trait TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError>;
}

#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(text);
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        // Page boundaries end paragraphs.
        Ok(pages.join("\n\n"))
    }
}

/// UTF-8 text and markdown files, read as-is.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let text = std::fs::read_to_string(path)?;
        let text = text.trim_start_matches('\u{feff}');
        if text.trim().is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "file has no text: {}",
                path.display()
            )));
        }
        Ok(text.to_string())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Picks the extractor by file extension.
pub fn extract_document_text(path: &Path) -> Result<String, IngestError> {
    match extension(path).as_deref() {
        Some("pdf") => LopdfExtractor.extract_text(path),
        Some("txt") | Some("md") => PlainTextExtractor.extract_text(path),
        _ => Err(IngestError::InvalidArgument(format!(
            "unsupported document type: {}",
            path.display()
        ))),
    }
}
