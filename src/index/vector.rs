/// HNSW vector index for similarity search
use super::Chunk;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Index was built with embedding model {indexed}, configured model is {configured}")]
    ModelMismatch { indexed: String, configured: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Search result with chunk ID and similarity score
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: u64,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// A chunk paired with its embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// On-disk representation of the index
#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    /// Embedding model the entries were produced with; mixing models
    /// across ingestion and query time is an invariant violation
    model: String,
    dimension: usize,
    entries: Vec<VectorEntry>,
}

/// HNSW vector index over cosine distance
///
/// Entries are persisted as JSON; the HNSW graph is rebuilt from the
/// stored embeddings on load.
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    entries: RwLock<Vec<VectorEntry>>,
    dimension: usize,
    model: String,
    index_path: PathBuf,
}

impl VectorIndex {
    /// Open the index at `index_path`, creating an empty one if no
    /// persisted state exists
    pub fn open(
        index_path: PathBuf,
        dimension: usize,
        model: &str,
        ef_construction: usize,
        m: usize,
    ) -> Result<Self, VectorIndexError> {
        if index_path.exists() {
            Self::load(index_path, dimension, model, ef_construction, m)
        } else {
            let index = Hnsw::<f32, DistCosine>::new(
                m,
                dimension,
                ef_construction,
                200, // max_nb_connection
                DistCosine,
            );

            Ok(Self {
                index: RwLock::new(index),
                entries: RwLock::new(Vec::new()),
                dimension,
                model: model.to_string(),
                index_path,
            })
        }
    }

    fn load(
        index_path: PathBuf,
        dimension: usize,
        model: &str,
        ef_construction: usize,
        m: usize,
    ) -> Result<Self, VectorIndexError> {
        let content = std::fs::read_to_string(&index_path)?;
        let persisted: PersistedIndex = serde_json::from_str(&content)
            .map_err(|e| VectorIndexError::SerializationError(e.to_string()))?;

        if persisted.model != model {
            return Err(VectorIndexError::ModelMismatch {
                indexed: persisted.model,
                configured: model.to_string(),
            });
        }
        if persisted.dimension != dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: dimension,
                actual: persisted.dimension,
            });
        }

        let index =
            Hnsw::<f32, DistCosine>::new(m, dimension, ef_construction, 200, DistCosine);
        for entry in &persisted.entries {
            index.insert((&entry.embedding, entry.chunk.id as usize));
        }

        tracing::debug!(
            "Loaded vector index with {} entries from {:?}",
            persisted.entries.len(),
            index_path
        );

        Ok(Self {
            index: RwLock::new(index),
            entries: RwLock::new(persisted.entries),
            dimension,
            model: model.to_string(),
            index_path,
        })
    }

    /// Persist entries to disk (atomic rename)
    pub fn save(&self) -> Result<(), VectorIndexError> {
        let entries = self.entries.read().unwrap();
        let persisted = PersistedIndex {
            model: self.model.clone(),
            dimension: self.dimension,
            entries: entries.clone(),
        };

        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string(&persisted)
            .map_err(|e| VectorIndexError::SerializationError(e.to_string()))?;
        let temp_path = self.index_path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.index_path)?;

        Ok(())
    }

    /// Insert a single entry
    pub fn insert(&self, entry: VectorEntry) -> Result<(), VectorIndexError> {
        if entry.embedding.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: entry.embedding.len(),
            });
        }

        let index = self.index.write().unwrap();
        index.insert((&entry.embedding, entry.chunk.id as usize));
        drop(index);

        self.entries.write().unwrap().push(entry);
        Ok(())
    }

    /// Insert multiple entries; batches from ingestion workers are
    /// commutative and order independent
    pub fn insert_batch(&self, batch: Vec<VectorEntry>) -> Result<(), VectorIndexError> {
        for entry in batch {
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Search for the k nearest entries to `query`
    ///
    /// Returns (id, cosine similarity) pairs sorted by similarity
    /// descending. An empty index yields an empty result, not an error.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<VectorSearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let neighbours = index.search(query, k, ef_search);

        Ok(neighbours
            .into_iter()
            .map(|n| VectorSearchResult {
                id: n.d_id as u64,
                score: 1.0 - n.distance,
            })
            .collect())
    }

    /// Look up a stored chunk by id
    pub fn get(&self, id: u64) -> Option<Chunk> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.chunk.id == id)
            .map(|e| e.chunk.clone())
    }

    /// Highest chunk id currently stored, if any; ingestion assigns
    /// max + 1 so ids stay unique across restarts
    pub fn max_id(&self) -> Option<u64> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|e| e.chunk.id)
            .max()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: u64, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            chunk: Chunk {
                id,
                text: format!("chunk {}", id),
                source: "doc.txt".to_string(),
                ordinal: id as usize,
            },
            embedding,
        }
    }

    fn open_index(dir: &TempDir, dim: usize) -> VectorIndex {
        VectorIndex::open(dir.path().join("vectors.json"), dim, "test-model", 200, 16).unwrap()
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let temp = TempDir::new().unwrap();
        let index = open_index(&temp, 4);

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 5, 50).unwrap();
        assert!(results.is_empty());
        assert!(index.is_empty());
        assert_eq!(index.max_id(), None);
    }

    #[test]
    fn test_insert_and_search() {
        let temp = TempDir::new().unwrap();
        let index = open_index(&temp, 4);

        index.insert(entry(1, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        index.insert(entry(2, vec![0.0, 1.0, 0.0, 0.0])).unwrap();
        index.insert(entry(3, vec![0.9, 0.1, 0.0, 0.0])).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2, 50).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].id == 1 || results[0].id == 3);
        assert!(results[0].score > 0.8);
    }

    #[test]
    fn test_dimension_validation() {
        let temp = TempDir::new().unwrap();
        let index = open_index(&temp, 4);

        let result = index.insert(entry(1, vec![1.0, 0.0]));
        assert!(matches!(
            result,
            Err(VectorIndexError::InvalidDimension { .. })
        ));

        index.insert(entry(1, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        assert!(index.search(&[1.0, 0.0], 1, 50).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();

        {
            let index = open_index(&temp, 4);
            index.insert(entry(7, vec![0.5, 0.5, 0.0, 0.0])).unwrap();
            index.save().unwrap();
        }

        let index = open_index(&temp, 4);
        assert_eq!(index.len(), 1);
        assert_eq!(index.max_id(), Some(7));
        assert_eq!(index.get(7).unwrap().text, "chunk 7");

        let results = index.search(&[0.5, 0.5, 0.0, 0.0], 1, 50).unwrap();
        assert_eq!(results[0].id, 7);
    }

    #[test]
    fn test_model_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.json");

        {
            let index = VectorIndex::open(path.clone(), 4, "model-a", 200, 16).unwrap();
            index.insert(entry(1, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
            index.save().unwrap();
        }

        let result = VectorIndex::open(path, 4, "model-b", 200, 16);
        assert!(matches!(result, Err(VectorIndexError::ModelMismatch { .. })));
    }
}
