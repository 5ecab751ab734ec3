//! Document ingestion
//!
//! Content-hash deduplication, chunking and dual index construction.
//! Re-runs are idempotent: a file is re-indexed only when its content
//! digest changes.

pub mod chunker;
pub mod extract;
pub mod hasher;
pub mod manifest;
pub mod pipeline;

pub use chunker::Chunker;
pub use manifest::ProcessedManifest;
pub use pipeline::{IngestPipeline, IngestReport};
