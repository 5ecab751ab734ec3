//! Conversation-weighted query composition
//!
//! One query vector that favors the current question but drifts toward
//! recent user intent: the question is embedded at weight 1.0, then each
//! prior user turn (walking most recent first) contributes its embedding
//! at an exponentially decayed weight. The sum is normalized to unit
//! length, so multi-turn conversations get continuity without
//! re-embedding whole transcripts per turn.

use crate::conversation::{ConversationTurn, Role};
use crate::embedding::EmbeddingProvider;
use ndarray::Array1;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Composed query vector has zero norm (degenerate input)")]
    ZeroNorm,
}

pub struct QueryComposer {
    provider: Arc<dyn EmbeddingProvider>,
    weight_decay: f32,
}

impl QueryComposer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, weight_decay: f32) -> Self {
        Self {
            provider,
            weight_decay,
        }
    }

    /// Compose a unit-length query vector from the question and the user
    /// turns of the conversation history
    pub fn compose(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Vec<f32>, ComposeError> {
        let question_embedding = self
            .provider
            .embed(question)
            .map_err(|e| ComposeError::Embedding(e.to_string()))?;
        let mut combined = Array1::from(question_embedding);

        let mut weight = 1.0f32;
        for turn in history.iter().rev() {
            if turn.role != Role::User {
                continue;
            }
            weight *= self.weight_decay;
            let embedding = self
                .provider
                .embed(&turn.content)
                .map_err(|e| ComposeError::Embedding(e.to_string()))?;
            combined.scaled_add(weight, &Array1::from(embedding));
        }

        let norm = combined.dot(&combined).sqrt();
        if norm <= f32::EPSILON {
            return Err(ComposeError::ZeroNorm);
        }

        Ok((combined / norm).to_vec())
    }
}
