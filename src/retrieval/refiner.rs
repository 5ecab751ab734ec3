//! LLM-assisted query refinement
//!
//! Best-effort rewrite of the raw question into a sharper retrieval
//! query, conditioned on the last two conversational exchanges. Pure
//! passthrough on any failure: refinement is a quality improvement,
//! never a prerequisite for retrieval.

use crate::completion::{ChatMessage, CompletionService};
use crate::conversation::ConversationTurn;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REFINE_TASK_PROMPT: &str =
    "You are a helpful assistant tasked with refining questions for semantic search if necessary. \
     Rewrite the user's question to make it more precise and focused based on the provided \
     conversation context. If the question is already clear and well-formulated, return it \
     unchanged. Provide only the refined or original question as your output. Do not answer \
     the question.";

/// How many trailing turns condition the rewrite (two exchanges)
const CONTEXT_TURNS: usize = 4;

pub struct QueryRefiner {
    service: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl QueryRefiner {
    pub fn new(service: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Refine the question, falling back to the original on service
    /// failure, timeout, or a blank response
    pub async fn refine(&self, question: &str, history: &[ConversationTurn]) -> String {
        let messages = build_messages(question, history);

        match tokio::time::timeout(self.timeout, self.service.complete(&messages)).await {
            Ok(Ok(refined)) => {
                let refined = refined.trim();
                if refined.is_empty() {
                    debug!("Refiner returned blank output, keeping original question");
                    question.to_string()
                } else {
                    debug!("Refined question: {}", refined);
                    refined.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!("Query refinement failed, using original question: {}", e);
                question.to_string()
            }
            Err(_) => {
                warn!(
                    "Query refinement timed out after {:?}, using original question",
                    self.timeout
                );
                question.to_string()
            }
        }
    }
}

fn build_messages(question: &str, history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(REFINE_TASK_PROMPT)];

    let start = history.len().saturating_sub(CONTEXT_TURNS);
    let recent = &history[start..];
    if !recent.is_empty() {
        let context: String = recent
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");
        messages.push(ChatMessage::system(format!(
            "The following is the relevant conversation context:\n{}",
            context
        )));
    }

    messages.push(ChatMessage::user(format!(
        "The following is the question you shall refine:\n{}",
        question
    )));

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use async_trait::async_trait;

    struct FixedCompletion(String);

    #[async_trait]
    impl CompletionService for FixedCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl CompletionService for FailingCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            Err(CompletionError::RequestFailed("connection refused".to_string()))
        }
    }

    struct HangingCompletion;

    #[async_trait]
    impl CompletionService for HangingCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_successful_refinement() {
        let refiner = QueryRefiner::new(
            Arc::new(FixedCompletion("  What is the capital of France?  ".to_string())),
            Duration::from_secs(5),
        );
        let refined = refiner.refine("capital france?", &[]).await;
        assert_eq!(refined, "What is the capital of France?");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let refiner = QueryRefiner::new(Arc::new(FailingCompletion), Duration::from_secs(5));
        let refined = refiner.refine("capital france?", &[]).await;
        assert_eq!(refined, "capital france?");
    }

    #[tokio::test]
    async fn test_blank_response_falls_back_to_original() {
        let refiner = QueryRefiner::new(
            Arc::new(FixedCompletion("   ".to_string())),
            Duration::from_secs(5),
        );
        let refined = refiner.refine("capital france?", &[]).await;
        assert_eq!(refined, "capital france?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_original() {
        let refiner = QueryRefiner::new(Arc::new(HangingCompletion), Duration::from_millis(100));
        let refined = refiner.refine("capital france?", &[]).await;
        assert_eq!(refined, "capital france?");
    }

    #[test]
    fn test_context_limited_to_last_four_turns() {
        let history: Vec<ConversationTurn> = (0..6)
            .map(|i| ConversationTurn::user(format!("turn {}", i)))
            .collect();

        let messages = build_messages("q", &history);
        assert_eq!(messages.len(), 3);
        let context = &messages[1].content;
        assert!(!context.contains("turn 1"));
        assert!(context.contains("turn 2"));
        assert!(context.contains("turn 5"));
    }
}
