//! Hybrid search combining semantic and lexical retrieval
//!
//! Candidates from both indexes are pooled and re-scored by cosine
//! similarity against the composed query vector. One recomputed metric
//! over the pooled candidates avoids calibrating BM25 scores against
//! vector distances, at the cost of one embedding call per candidate;
//! candidate pools are at most 2k entries.

use crate::config::{RetrievalConfig, SearchMode};
use crate::conversation::ConversationTurn;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::index::{tokenize, LexicalIndex, VectorIndex};
use crate::retrieval::{
    CandidateOrigin, ComposeError, QueryComposer, QueryRefiner, RetrievalCandidate,
    RetrievalRequest, RetrievalResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding service failure during a query. Surfaced rather than
    /// swallowed: an empty result would be indistinguishable from "no
    /// relevant documents".
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Vector search failed: {0}")]
    VectorSearch(String),
}

impl From<ComposeError> for SearchError {
    fn from(e: ComposeError) -> Self {
        match e {
            ComposeError::Embedding(msg) => SearchError::EmbeddingUnavailable(msg),
            ComposeError::ZeroNorm => SearchError::Numeric(e.to_string()),
        }
    }
}

impl From<SearchError> for crate::error::RagdexError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::EmbeddingUnavailable(msg) => Self::EmbeddingUnavailable(msg),
            SearchError::Numeric(msg) => Self::Numeric(msg),
            other => Self::Other(anyhow::Error::new(other)),
        }
    }
}

/// Retriever over the dual indexes
///
/// Reads share no mutable state; each request owns its composed query
/// vector and candidate pool. Ingestion never runs concurrently with
/// queries (exclusive maintenance window).
pub struct HybridRetriever {
    provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
    lexical_index: Arc<LexicalIndex>,
    composer: QueryComposer,
    refiner: Option<QueryRefiner>,
    mode: SearchMode,
    ef_search: usize,
}

impl HybridRetriever {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<VectorIndex>,
        lexical_index: Arc<LexicalIndex>,
        refiner: Option<QueryRefiner>,
        config: &RetrievalConfig,
        ef_search: usize,
    ) -> Self {
        let composer = QueryComposer::new(provider.clone(), config.weight_decay);
        Self {
            provider,
            vector_index,
            lexical_index,
            composer,
            refiner,
            mode: config.mode,
            ef_search,
        }
    }

    /// Answer a retrieval request: top-k results ranked by relevance
    pub async fn search(
        &self,
        request: &RetrievalRequest,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, SearchError> {
        let question = request.question.as_str();
        let history: &[ConversationTurn] = &request.history;

        if question.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Question cannot be empty".to_string(),
            ));
        }

        // Nothing indexed yet is a valid state, not an error
        if self.vector_index.is_empty() && self.lexical_index.is_empty() {
            return Ok(Vec::new());
        }

        let question = match &self.refiner {
            Some(refiner) => refiner.refine(question, history).await,
            None => question.to_string(),
        };

        let query_vector = self.composer.compose(&question, history)?;

        match self.mode {
            SearchMode::Semantic => self.semantic_search(&query_vector, k),
            SearchMode::Hybrid => self.hybrid_search(&question, &query_vector, k).await,
        }
    }

    /// Vector index only; the index's cosine similarity is the relevance
    /// score directly
    fn semantic_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, SearchError> {
        let hits = self
            .vector_index
            .search(query_vector, k, self.ef_search)
            .map_err(|e| SearchError::VectorSearch(e.to_string()))?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.vector_index.get(hit.id).map(|chunk| RetrievalResult {
                    text: chunk.text,
                    source: chunk.source,
                    score: hit.score,
                })
            })
            .collect())
    }

    /// Parallel vector + lexical fetch, then cosine fusion over the
    /// pooled candidates
    async fn hybrid_search(
        &self,
        question: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, SearchError> {
        let (vector_candidates, lexical_candidates) = tokio::join!(
            self.vector_candidates(query_vector, k),
            self.lexical_candidates(question, k)
        );
        let vector_candidates = vector_candidates?;

        debug!(
            "Pooling {} vector and {} lexical candidates",
            vector_candidates.len(),
            lexical_candidates.len()
        );

        let pooled = pool_candidates(vector_candidates, lexical_candidates);
        score_pool(self.provider.as_ref(), query_vector, pooled, k)
    }

    async fn vector_candidates(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let hits = self
            .vector_index
            .search(query_vector, k, self.ef_search)
            .map_err(|e| SearchError::VectorSearch(e.to_string()))?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.vector_index.get(hit.id).map(|chunk| RetrievalCandidate {
                    id: chunk.id,
                    text: chunk.text,
                    source: chunk.source,
                    origin: CandidateOrigin::Vector,
                })
            })
            .collect())
    }

    async fn lexical_candidates(&self, question: &str, k: usize) -> Vec<RetrievalCandidate> {
        let tokens = tokenize(question);
        self.lexical_index
            .top_k(&tokens, k)
            .into_iter()
            .map(|result| RetrievalCandidate {
                id: result.chunk.id,
                text: result.chunk.text,
                source: result.chunk.source,
                origin: CandidateOrigin::Lexical,
            })
            .collect()
    }
}

/// Union of the two candidate sets, deduplicated by chunk id. First-seen
/// order (vector results before lexical results) is preserved; the stable
/// fusion sort later relies on it for tie-breaking.
fn pool_candidates(
    vector_candidates: Vec<RetrievalCandidate>,
    lexical_candidates: Vec<RetrievalCandidate>,
) -> Vec<RetrievalCandidate> {
    let mut seen: HashSet<u64> = HashSet::new();
    vector_candidates
        .into_iter()
        .chain(lexical_candidates)
        .filter(|candidate| seen.insert(candidate.id))
        .collect()
}

/// Re-embed every pooled candidate and rank by cosine similarity against
/// the composed query vector, truncated to k
fn score_pool(
    provider: &dyn EmbeddingProvider,
    query_vector: &[f32],
    pooled: Vec<RetrievalCandidate>,
    k: usize,
) -> Result<Vec<RetrievalResult>, SearchError> {
    if pooled.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = pooled.iter().map(|c| c.text.clone()).collect();
    let embeddings = provider
        .embed_batch(&texts)
        .map_err(|e| SearchError::EmbeddingUnavailable(e.to_string()))?;

    let mut scored: Vec<(RetrievalCandidate, f32)> = pooled
        .into_iter()
        .zip(embeddings)
        .map(|(candidate, embedding)| {
            let score = cosine_similarity(query_vector, &embedding);
            (candidate, score)
        })
        .collect();

    // Stable sort: exact score ties keep first-seen order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(candidate, score)| RetrievalResult {
            text: candidate.text,
            source: candidate.source,
            score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::index::{Chunk, VectorEntry};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Deterministic embedder backed by a fixed lookup table
    struct TableProvider {
        table: HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    impl TableProvider {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            let dimension = entries[0].1.len();
            Self {
                table: entries
                    .iter()
                    .map(|(text, vec)| (text.to_string(), vec.clone()))
                    .collect(),
                dimension,
            }
        }
    }

    impl EmbeddingProvider for TableProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::InvalidInput(format!("unknown text: {}", text)))
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("backend down".to_string()))
        }

        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("backend down".to_string()))
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn candidate(id: u64, text: &str, origin: CandidateOrigin) -> RetrievalCandidate {
        RetrievalCandidate {
            id,
            text: text.to_string(),
            source: format!("doc{}.txt", id),
            origin,
        }
    }

    #[test]
    fn test_pool_union_dedupes_by_id() {
        let vector = vec![
            candidate(0, "a", CandidateOrigin::Vector),
            candidate(1, "b", CandidateOrigin::Vector),
            candidate(2, "c", CandidateOrigin::Vector),
        ];
        let lexical = vec![
            candidate(2, "c", CandidateOrigin::Lexical),
            candidate(3, "d", CandidateOrigin::Lexical),
            candidate(4, "e", CandidateOrigin::Lexical),
        ];

        let pooled = pool_candidates(vector, lexical);
        assert_eq!(pooled.len(), 5);

        let ids: Vec<u64> = pooled.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        // The overlapping chunk keeps its vector origin (first seen)
        assert_eq!(pooled[2].origin, CandidateOrigin::Vector);
    }

    #[test]
    fn test_fusion_sorts_descending_with_stable_ties() {
        let provider = TableProvider::new(&[
            ("a", vec![0.95, 0.05, 0.0, 0.0]),
            ("b", vec![0.9, 0.1, 0.0, 0.0]),
            ("c", vec![0.85, 0.15, 0.0, 0.0]),
            // d and e embed identically: an exact score tie
            ("d", vec![0.2, 0.8, 0.0, 0.0]),
            ("e", vec![0.2, 0.8, 0.0, 0.0]),
        ]);
        let query = vec![1.0, 0.0, 0.0, 0.0];

        let pooled = pool_candidates(
            vec![
                candidate(0, "a", CandidateOrigin::Vector),
                candidate(1, "b", CandidateOrigin::Vector),
                candidate(2, "c", CandidateOrigin::Vector),
            ],
            vec![
                candidate(2, "c", CandidateOrigin::Lexical),
                candidate(3, "d", CandidateOrigin::Lexical),
                candidate(4, "e", CandidateOrigin::Lexical),
            ],
        );
        assert_eq!(pooled.len(), 5);

        let results = score_pool(&provider, &query, pooled, 5).unwrap();
        assert_eq!(results.len(), 5);

        // Strictly descending over the distinct scores
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let sources: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        // The tie between d (seen before e) keeps first-seen order
        assert_eq!(
            sources,
            vec!["doc0.txt", "doc1.txt", "doc2.txt", "doc3.txt", "doc4.txt"]
        );
    }

    #[test]
    fn test_vector_sourced_tie_beats_lexical_sourced() {
        let provider = TableProvider::new(&[
            ("same text v", vec![0.5, 0.5, 0.0, 0.0]),
            ("same text l", vec![0.5, 0.5, 0.0, 0.0]),
        ]);
        let query = vec![1.0, 0.0, 0.0, 0.0];

        let pooled = pool_candidates(
            vec![candidate(0, "same text v", CandidateOrigin::Vector)],
            vec![candidate(1, "same text l", CandidateOrigin::Lexical)],
        );

        let results = score_pool(&provider, &query, pooled, 2).unwrap();
        assert_eq!(results[0].source, "doc0.txt");
        assert_eq!(results[1].source, "doc1.txt");
    }

    #[test]
    fn test_embedding_failure_is_surfaced() {
        let pooled = vec![candidate(0, "a", CandidateOrigin::Vector)];
        let result = score_pool(&FailingProvider, &[1.0, 0.0, 0.0, 0.0], pooled, 5);
        assert!(matches!(
            result,
            Err(SearchError::EmbeddingUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_indexes_return_empty_not_error() {
        let temp = TempDir::new().unwrap();
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingProvider);
        let vector_index = Arc::new(
            VectorIndex::open(temp.path().join("v.json"), 4, "failing", 200, 16).unwrap(),
        );
        let lexical_index =
            Arc::new(LexicalIndex::open(temp.path().join("l.json")).unwrap());

        let retriever = HybridRetriever::new(
            provider,
            vector_index,
            lexical_index,
            None,
            &RetrievalConfig::default(),
            64,
        );

        // Provider would fail, but empty indexes short-circuit first
        let request = RetrievalRequest {
            question: "anything".to_string(),
            history: Vec::new(),
        };
        let results = retriever.search(&request, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_search_over_small_corpus() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(TableProvider::new(&[
            ("zebra quokka query", vec![1.0, 0.0, 0.0, 0.0]),
            ("vector one", vec![0.95, 0.05, 0.0, 0.0]),
            ("vector two", vec![0.9, 0.1, 0.0, 0.0]),
            ("zebra quokka overlap", vec![0.85, 0.15, 0.0, 0.0]),
            ("zebra quokka three", vec![0.2, 0.8, 0.0, 0.0]),
            ("zebra quokka four", vec![0.1, 0.9, 0.0, 0.0]),
        ]));

        let vector_index = Arc::new(
            VectorIndex::open(temp.path().join("v.json"), 4, "table", 200, 16).unwrap(),
        );
        let mut lexical = LexicalIndex::open(temp.path().join("l.json")).unwrap();

        let corpus = [
            "vector one",
            "vector two",
            "zebra quokka overlap",
            "zebra quokka three",
            "zebra quokka four",
        ];
        for (id, text) in corpus.iter().enumerate() {
            let chunk = Chunk {
                id: id as u64,
                text: text.to_string(),
                source: format!("doc{}.txt", id),
                ordinal: 0,
            };
            let embedding = provider.embed(text).unwrap();
            vector_index
                .insert(VectorEntry {
                    chunk: chunk.clone(),
                    embedding,
                })
                .unwrap();
            lexical.insert_batch(vec![chunk]);
        }

        let retriever = HybridRetriever::new(
            provider.clone(),
            vector_index,
            Arc::new(lexical),
            None,
            &RetrievalConfig::default(),
            64,
        );

        // A request deserialized from an API payload with no history key
        // defaults to an empty conversation
        let request: RetrievalRequest =
            serde_json::from_str(r#"{"question": "zebra quokka query"}"#).unwrap();
        let results = retriever.search(&request, 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source, "doc0.txt");
        assert_eq!(results[1].source, "doc1.txt");
        assert_eq!(results[2].source, "doc2.txt");
        assert!(results[0].score > results[2].score);
    }
}
