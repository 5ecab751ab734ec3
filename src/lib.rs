//! ragdex - Hybrid document retrieval engine
//!
//! Ingests documents into dual (vector + lexical) indexes with content-hash
//! deduplication, and answers retrieval queries by fusing lexical and
//! semantic signals, weighted by recent conversation context.

pub mod cli;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod retrieval;

pub use error::{RagdexError, Result};
