//! Processed-files manifest
//!
//! Maps source path to the content digest last ingested successfully. A
//! file is (re-)chunked and (re-)indexed iff its digest is absent or
//! differs from the manifest entry; entries are only recorded after the
//! whole batch for that file succeeded, so failed runs are retried.

use crate::error::{RagdexError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub digest: String,
    pub recorded_at: DateTime<Utc>,
}

/// Persisted record of which content has already been ingested
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProcessedManifest {
    /// BTreeMap keeps the on-disk file diffable
    entries: BTreeMap<String, ManifestEntry>,
}

impl ProcessedManifest {
    /// Load the manifest, or start empty if none exists yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to read manifest: {}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| RagdexError::Json {
            source: e,
            context: format!("Failed to parse manifest: {}", path.display()),
        })
    }

    /// Persist the manifest atomically (write to temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagdexError::Io {
                source: e,
                context: format!("Failed to create manifest directory: {:?}", parent),
            })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| RagdexError::Json {
            source: e,
            context: "Failed to serialize manifest".to_string(),
        })?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to write manifest temp file: {}", temp_path.display()),
        })?;
        std::fs::rename(&temp_path, path).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to rename manifest into place: {}", path.display()),
        })?;

        Ok(())
    }

    /// True iff the path is unknown or its stored digest differs
    pub fn should_process(&self, path: &Path, digest: &str) -> bool {
        match self.entries.get(&Self::key(path)) {
            Some(entry) => entry.digest != digest,
            None => true,
        }
    }

    /// Record a successfully processed file
    pub fn record(&mut self, path: &Path, digest: String) {
        self.entries.insert(
            Self::key(path),
            ManifestEntry {
                digest,
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}
