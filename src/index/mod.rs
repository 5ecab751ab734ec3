//! Dual index construction: vector (HNSW) and lexical (BM25)
//!
//! Both indexes store chunks; in hybrid mode every chunk added to one is
//! added to the other in the same ingestion batch so result sets stay
//! comparable.

mod lexical;
mod vector;

pub use lexical::{LexicalIndex, LexicalIndexError, LexicalSearchResult, tokenize};
pub use vector::{VectorEntry, VectorIndex, VectorIndexError, VectorSearchResult};

use serde::{Deserialize, Serialize};

/// A bounded contiguous span of a document's text, the unit of indexing
/// and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique id, monotonically assigned at ingestion time
    pub id: u64,
    /// Text span
    pub text: String,
    /// Source document path (back-reference, not ownership)
    pub source: String,
    /// Position of this chunk within its source document
    pub ordinal: usize,
}
