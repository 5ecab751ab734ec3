//! Ingestion pipeline
//!
//! discover -> hash-check -> extract -> chunk -> embed -> index, with
//! chunk batches distributed across a bounded worker pool. Batches are
//! commutative; the only coordination is the join before the manifest is
//! persisted. A failed batch never aborts its siblings: the file behind
//! it is left out of the manifest and retried on the next run.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{Chunk, LexicalIndex, VectorEntry, VectorIndex};
use crate::ingest::chunker::Chunker;
use crate::ingest::extract::{extract_text, is_supported};
use crate::ingest::hasher::digest_file;
use crate::ingest::manifest::ProcessedManifest;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Outcome of one ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_added: usize,
}

struct PendingFile {
    path: PathBuf,
    digest: String,
}

struct FileBatch {
    file_idx: usize,
    batch_id: usize,
    chunks: Vec<Chunk>,
}

/// Ingestion is the only write path; it runs as an exclusive maintenance
/// window, so the indexes it owns are not shared with live queries.
pub struct IngestPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
    lexical_index: Arc<Mutex<LexicalIndex>>,
    chunker: Chunker,
    batch_size: usize,
    max_concurrent: usize,
}

impl IngestPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<VectorIndex>,
        lexical_index: Arc<Mutex<LexicalIndex>>,
        chunker: Chunker,
        batch_size: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            provider,
            vector_index,
            lexical_index,
            chunker,
            batch_size,
            max_concurrent,
        }
    }

    /// Ingest new and changed documents from `documents_dir`. With
    /// `force` set, unchanged files are re-processed anyway.
    pub async fn run(
        &self,
        documents_dir: &Path,
        manifest_path: &Path,
        force: bool,
    ) -> Result<IngestReport> {
        let mut manifest = ProcessedManifest::load(manifest_path)?;
        let mut report = IngestReport::default();

        let files = discover_documents(documents_dir)?;

        // Phase 1: hash-check, extract and chunk serially; per-file
        // failures are logged and skipped, never fatal
        let mut pending: Vec<PendingFile> = Vec::new();
        let mut batches: Vec<FileBatch> = Vec::new();
        let mut next_id = self.vector_index.max_id().map(|id| id + 1).unwrap_or(0);

        for path in files {
            report.files_seen += 1;

            let digest = match digest_file(&path) {
                Ok(digest) => digest,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.files_failed += 1;
                    continue;
                }
            };

            if !force && !manifest.should_process(&path, &digest) {
                debug!("Unchanged, skipping {}", path.display());
                report.files_skipped += 1;
                continue;
            }

            let text = match extract_text(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.files_failed += 1;
                    continue;
                }
            };

            let source = path.display().to_string();
            let chunks: Vec<Chunk> = self
                .chunker
                .split(&text)
                .into_iter()
                .enumerate()
                .map(|(ordinal, text)| {
                    let chunk = Chunk {
                        id: next_id,
                        text,
                        source: source.clone(),
                        ordinal,
                    };
                    next_id += 1;
                    chunk
                })
                .collect();

            info!("Chunked {} into {} chunks", path.display(), chunks.len());

            let file_idx = pending.len();
            for (batch_id, slice) in chunks.chunks(self.batch_size).enumerate() {
                batches.push(FileBatch {
                    file_idx,
                    batch_id,
                    chunks: slice.to_vec(),
                });
            }
            pending.push(PendingFile { path, digest });
        }

        if pending.is_empty() {
            info!("No new or changed documents to ingest");
            return Ok(report);
        }

        // Phase 2: bounded worker pool over the batches
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(batches.len());

        for batch in batches {
            let provider = self.provider.clone();
            let vector_index = self.vector_index.clone();
            let lexical_index = self.lexical_index.clone();
            let semaphore = semaphore.clone();

            let file_idx = batch.file_idx;
            let batch_id = batch.batch_id;
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| e.to_string())?;
                process_batch(provider, vector_index, lexical_index, batch.chunks).await
            });
            tasks.push((file_idx, batch_id, handle));
        }

        let mut failed_files: HashSet<usize> = HashSet::new();
        for (file_idx, batch_id, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("worker panicked: {}", e)),
            };
            match outcome {
                Ok(count) => report.chunks_added += count,
                Err(e) => {
                    warn!(
                        "Batch {} of {} failed, file will be retried next run: {}",
                        batch_id,
                        pending[file_idx].path.display(),
                        e
                    );
                    failed_files.insert(file_idx);
                }
            }
        }

        // Phase 3: persist indexes first, then record manifest entries for
        // files whose every batch succeeded. A crash between the two means
        // a duplicate-tolerant re-ingest, never a silently dropped file.
        self.vector_index
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to persist vector index: {}", e))?;
        self.lexical_index
            .lock()
            .await
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to persist lexical index: {}", e))?;

        for (file_idx, file) in pending.iter().enumerate() {
            if failed_files.contains(&file_idx) {
                report.files_failed += 1;
            } else {
                manifest.record(&file.path, file.digest.clone());
                report.files_processed += 1;
            }
        }
        manifest.save(manifest_path)?;

        info!(
            "Ingestion complete: {} processed, {} skipped, {} failed, {} chunks added",
            report.files_processed, report.files_skipped, report.files_failed, report.chunks_added
        );

        Ok(report)
    }
}

/// Embed one batch and add it to both indexes, keeping the result sets of
/// vector and lexical search comparable
async fn process_batch(
    provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
    lexical_index: Arc<Mutex<LexicalIndex>>,
    chunks: Vec<Chunk>,
) -> std::result::Result<usize, String> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    // Embedding is CPU-bound; run it off the async workers so a large
    // batch cannot stall the runtime
    let embeddings = tokio::task::spawn_blocking(move || provider.embed_batch(&texts))
        .await
        .map_err(|e| format!("embedding task panicked: {}", e))?
        .map_err(|e| e.to_string())?;

    if embeddings.len() != chunks.len() {
        return Err(format!(
            "embedding count mismatch: expected {}, got {}",
            chunks.len(),
            embeddings.len()
        ));
    }

    let entries: Vec<VectorEntry> = chunks
        .iter()
        .cloned()
        .zip(embeddings)
        .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
        .collect();

    let count = entries.len();
    vector_index.insert_batch(entries).map_err(|e| e.to_string())?;
    lexical_index.lock().await.insert_batch(chunks);

    Ok(count)
}

/// Supported documents in `dir`, sorted for a deterministic walk order
fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| crate::error::RagdexError::Io {
        source: e,
        context: format!("Failed to read documents directory: {}", dir.display()),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    files.sort();
    Ok(files)
}
