//! Content hashing for change detection
//!
//! BLAKE3 over raw file bytes: deterministic, collision-resistant well
//! beyond what change detection needs. Security is not a goal here.

use crate::error::{RagdexError, Result};
use std::path::Path;

/// Compute the hex digest of a file's bytes
pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| RagdexError::Io {
        source: e,
        context: format!("Failed to read file for hashing: {}", path.display()),
    })?;
    Ok(digest_bytes(&bytes))
}

/// Compute the hex digest of a byte slice
pub fn digest_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest_bytes(b"hello"), digest_bytes(b"hello"));
        assert_ne!(digest_bytes(b"hello"), digest_bytes(b"hello!"));
    }

    #[test]
    fn test_digest_file_matches_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.txt");
        std::fs::write(&path, b"some document content").unwrap();

        assert_eq!(
            digest_file(&path).unwrap(),
            digest_bytes(b"some document content")
        );
    }

    #[test]
    fn test_digest_missing_file() {
        let result = digest_file(Path::new("/nonexistent/file.txt"));
        assert!(result.is_err());
    }
}
