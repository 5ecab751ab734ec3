//! Document text extraction
//!
//! PDF pages are combined into a single document before chunking; plain
//! text and Markdown are read as-is.

use crate::error::{RagdexError, Result};
use std::path::Path;

/// File extensions picked up by a directory scan
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// True if the path looks like a document this pipeline can ingest
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Extract the full text of a document
pub fn extract_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => pdf_extract::extract_text(path).map_err(|e| RagdexError::Ingestion {
            path: path.to_path_buf(),
            message: format!("PDF extraction failed: {}", e),
        }),
        "txt" | "md" => std::fs::read_to_string(path).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to read document: {}", path.display()),
        }),
        other => Err(RagdexError::Ingestion {
            path: path.to_path_buf(),
            message: format!("Unsupported document type: .{}", other),
        }),
    }
}
