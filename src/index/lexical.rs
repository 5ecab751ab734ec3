/// In-memory BM25 lexical index over lower-cased word tokens
///
/// Scores with saturating term frequency (k1) and document-length
/// normalization against the average document length (b). Ties are broken
/// by ingestion order so results stay deterministic.
use super::Chunk;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Error, Debug)]
pub enum LexicalIndexError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Search result with the stored chunk and its BM25 score
#[derive(Debug, Clone)]
pub struct LexicalSearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Lower-cased word tokens, split on non-alphanumeric boundaries.
///
/// Deterministic: the index applies this to chunk text at build time and
/// callers apply it to query text, so both sides agree on the vocabulary.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[derive(Serialize, Deserialize)]
struct PersistedLexical {
    chunks: Vec<Chunk>,
}

/// BM25 term-frequency index
///
/// Chunks are persisted as JSON; token statistics are recomputed
/// deterministically on load.
pub struct LexicalIndex {
    chunks: Vec<Chunk>,
    /// Token counts per document, parallel to `chunks`
    term_freqs: Vec<AHashMap<String, usize>>,
    /// Token lengths per document, parallel to `chunks`
    doc_lens: Vec<usize>,
    /// Number of documents containing each token
    doc_freq: AHashMap<String, usize>,
    index_path: PathBuf,
}

impl LexicalIndex {
    /// Open the index at `index_path`, creating an empty one if no
    /// persisted state exists
    pub fn open(index_path: PathBuf) -> Result<Self, LexicalIndexError> {
        if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)?;
            let persisted: PersistedLexical = serde_json::from_str(&content)
                .map_err(|e| LexicalIndexError::SerializationError(e.to_string()))?;

            let mut index = Self::empty(index_path);
            for chunk in persisted.chunks {
                index.index_chunk(chunk);
            }
            tracing::debug!("Loaded lexical index with {} chunks", index.len());
            Ok(index)
        } else {
            Ok(Self::empty(index_path))
        }
    }

    fn empty(index_path: PathBuf) -> Self {
        Self {
            chunks: Vec::new(),
            term_freqs: Vec::new(),
            doc_lens: Vec::new(),
            doc_freq: AHashMap::new(),
            index_path,
        }
    }

    /// Persist chunks to disk (atomic rename)
    pub fn save(&self) -> Result<(), LexicalIndexError> {
        let persisted = PersistedLexical {
            chunks: self.chunks.clone(),
        };

        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string(&persisted)
            .map_err(|e| LexicalIndexError::SerializationError(e.to_string()))?;
        let temp_path = self.index_path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.index_path)?;

        Ok(())
    }

    /// Add a batch of chunks to the index
    pub fn insert_batch(&mut self, batch: Vec<Chunk>) {
        for chunk in batch {
            self.index_chunk(chunk);
        }
    }

    fn index_chunk(&mut self, chunk: Chunk) {
        let tokens = tokenize(&chunk.text);
        let mut freqs: AHashMap<String, usize> = AHashMap::new();
        for token in &tokens {
            *freqs.entry(token.clone()).or_insert(0) += 1;
        }
        for token in freqs.keys() {
            *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
        }
        self.doc_lens.push(tokens.len());
        self.term_freqs.push(freqs);
        self.chunks.push(chunk);
    }

    /// BM25 score of every indexed document against the query tokens,
    /// indexed by ingestion position
    pub fn score_tokens(&self, query_tokens: &[String]) -> Vec<f32> {
        let n = self.chunks.len();
        let mut scores = vec![0.0f32; n];
        if n == 0 {
            return scores;
        }

        let avg_len = self.doc_lens.iter().sum::<usize>() as f32 / n as f32;

        for token in query_tokens {
            let df = match self.doc_freq.get(token) {
                Some(df) => *df as f32,
                None => continue,
            };
            // Non-negative idf variant; the classical Robertson form can
            // go negative for tokens present in most documents
            let idf = (1.0 + (n as f32 - df + 0.5) / (df + 0.5)).ln();

            for (i, freqs) in self.term_freqs.iter().enumerate() {
                let tf = match freqs.get(token) {
                    Some(tf) => *tf as f32,
                    None => continue,
                };
                let norm = K1 * (1.0 - B + B * self.doc_lens[i] as f32 / avg_len);
                scores[i] += idf * tf * (K1 + 1.0) / (tf + norm);
            }
        }

        scores
    }

    /// Top-k chunks by BM25 score, descending; zero-score documents are
    /// omitted and exact ties keep ingestion order
    pub fn top_k(&self, query_tokens: &[String], k: usize) -> Vec<LexicalSearchResult> {
        let scores = self.score_tokens(query_tokens);

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Stable sort: equal scores retain ingestion order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(i, score)| LexicalSearchResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
