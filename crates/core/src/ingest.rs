use crate::error::IngestError;
use crate::extractor::{extract_document_text, is_supported};
use crate::models::Document;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Supported documents under `folder`, recursively, in path order.
pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
}

pub fn ingest_folder(folder: &Path) -> Result<Vec<Document>, IngestError> {
    let report = ingest_folder_best_effort(folder)?;
    Ok(report.documents)
}

/// Reads every supported file; unreadable files are reported, not fatal.
/// Fails only when the folder holds no supported file at all.
pub fn ingest_folder_best_effort(folder: &Path) -> Result<IngestionReport, IngestError> {
    let files = discover_documents(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf, txt or md files found in {}",
            folder.display()
        )));
    }

    let mut report = IngestionReport::default();
    for path in files {
        match load_document(&path) {
            Ok(document) => {
                debug!(file = %document.source_filename, chars = document.raw_text.len(), "document ingested");
                report.documents.push(document);
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping document");
                report.skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// One file as a [`Document`]. The product id is left for the index to
/// resolve.
pub fn load_document(path: &Path) -> Result<Document, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;
    let raw_text = extract_document_text(path)?;

    Ok(Document {
        document_id: generate_document_id(path),
        source_filename: name.to_string(),
        raw_text,
        product_id: None,
        checksum,
        ingested_at: Utc::now(),
    })
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}
