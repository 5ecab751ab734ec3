//! Hybrid retrieval
//!
//! Conversation-weighted query composition, parallel vector + lexical
//! candidate fetch, cosine fusion over the pooled candidates, and
//! optional LLM-assisted query refinement.

mod composer;
mod hybrid;
mod refiner;

pub use composer::{ComposeError, QueryComposer};
pub use hybrid::{HybridRetriever, SearchError};
pub use refiner::QueryRefiner;

use crate::conversation::ConversationTurn;
use serde::{Deserialize, Serialize};

/// Which index first produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    Vector,
    Lexical,
}

/// A pooled candidate awaiting fusion; one tagged shape for results from
/// either index
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub id: u64,
    pub text: String,
    pub source: String,
    pub origin: CandidateOrigin,
}

/// A ranked retrieval result; produced fresh per query, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub text: String,
    pub source: String,
    /// Cosine-similarity-based relevance, higher is more relevant
    pub score: f32,
}

/// Retrieval request as consumed from the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

/// Response payload: `sources[i]` and `content[i]` describe the i-th
/// ranked result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub sources: Vec<String>,
    pub content: Vec<String>,
    pub scores: Vec<f32>,
}

impl From<Vec<RetrievalResult>> for RetrievalResponse {
    fn from(results: Vec<RetrievalResult>) -> Self {
        let mut sources = Vec::with_capacity(results.len());
        let mut content = Vec::with_capacity(results.len());
        let mut scores = Vec::with_capacity(results.len());
        for result in results {
            sources.push(result.source);
            content.push(result.text);
            scores.push(result.score);
        }
        Self {
            sources,
            content,
            scores,
        }
    }
}
