//! Answer strategies tried in order by the orchestrator.
//!
//! Each [`AnswerStrategy`] turns the same [`AnswerContext`] into answer text
//! or an error. The orchestrator walks its list and keeps the first success,
//! so the chain is "generate, else extract" by default and
//! [`ExtractiveStrategy`] guarantees the chain always ends in an answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{AnswerMode, SearchResult};
use crate::error::{RagError, Result, with_timeout};
use crate::generation::GenerationProvider;
use crate::memory::ConversationEntry;
use crate::prompt::{TUTOR_SYSTEM_PROMPT, answer_request, extractive_answer, format_context};

/// Everything a strategy may use to answer one question.
#[derive(Debug, Clone, Copy)]
pub struct AnswerContext<'a> {
    /// The question.
    pub query: &'a str,
    /// Retrieved results selected for the prompt, most similar first.
    pub sources: &'a [SearchResult],
    /// Prior conversation turns, oldest first.
    pub history: &'a [ConversationEntry],
}

/// One way of producing an answer.
#[async_trait]
pub trait AnswerStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// The [`AnswerMode`] reported when this strategy wins.
    fn mode(&self) -> AnswerMode;

    /// Try to answer. Errors make the orchestrator move to the next strategy.
    async fn attempt(&self, context: &AnswerContext<'_>) -> Result<String>;
}

/// Asks the generation capability, rejecting timeouts and degenerate output.
pub struct GenerativeStrategy {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
    min_answer_chars: usize,
}

impl GenerativeStrategy {
    /// Create a strategy around `provider`.
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        timeout: Duration,
        min_answer_chars: usize,
    ) -> Self {
        Self { provider, timeout, min_answer_chars }
    }
}

#[async_trait]
impl AnswerStrategy for GenerativeStrategy {
    fn name(&self) -> &str {
        "generative"
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::Generated
    }

    async fn attempt(&self, context: &AnswerContext<'_>) -> Result<String> {
        let prompt_context = format_context(context.sources.iter().map(|r| &r.chunk));
        let user_message = answer_request(context.query, &prompt_context);

        debug!(
            provider = self.provider.name(),
            sources = context.sources.len(),
            history = context.history.len(),
            "requesting generation"
        );

        let reply = with_timeout(
            "generation",
            self.timeout,
            self.provider.complete(TUTOR_SYSTEM_PROMPT, context.history, &user_message),
        )
        .await?;

        let answer = reply.trim();
        if answer.chars().count() < self.min_answer_chars {
            return Err(RagError::GenerationError {
                provider: self.provider.name().to_string(),
                message: format!(
                    "answer too short ({} chars, minimum {})",
                    answer.chars().count(),
                    self.min_answer_chars
                ),
            });
        }
        Ok(answer.to_string())
    }
}

/// Lists the selected sources verbatim. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveStrategy;

#[async_trait]
impl AnswerStrategy for ExtractiveStrategy {
    fn name(&self) -> &str {
        "extractive"
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::Fallback
    }

    async fn attempt(&self, context: &AnswerContext<'_>) -> Result<String> {
        Ok(extractive_answer(context.sources.iter().map(|r| &r.chunk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use crate::memory::Role;
    use std::sync::Mutex;

    struct Recording {
        reply: String,
        seen: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl GenerationProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            system: &str,
            turns: &[ConversationEntry],
            user_message: &str,
        ) -> Result<String> {
            self.seen.lock().unwrap().push((
                system.to_string(),
                turns.len(),
                user_message.to_string(),
            ));
            Ok(self.reply.clone())
        }
    }

    struct Sleepy;

    #[async_trait]
    impl GenerationProvider for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn complete(&self, _: &str, _: &[ConversationEntry], _: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }
    }

    fn sources() -> Vec<SearchResult> {
        vec![SearchResult::new(
            Chunk::new("Page 1_0", "Enzymes lower activation energy.", "Page 1", "bio.pdf"),
            0.2,
        )]
    }

    #[tokio::test]
    async fn generative_sends_context_history_and_query() {
        let provider = Arc::new(Recording {
            reply: "  Enzymes speed up reactions by lowering activation energy.  ".into(),
            seen: Mutex::new(Vec::new()),
        });
        let strategy = GenerativeStrategy::new(provider.clone(), Duration::from_secs(5), 20);
        let sources = sources();
        let history = vec![ConversationEntry::new(Role::User, "earlier")];
        let context = AnswerContext { query: "What do enzymes do?", sources: &sources, history: &history };

        let answer = strategy.attempt(&context).await.unwrap();
        assert_eq!(answer, "Enzymes speed up reactions by lowering activation energy.");

        let seen = provider.seen.lock().unwrap();
        let (system, turns, message) = &seen[0];
        assert_eq!(system, TUTOR_SYSTEM_PROMPT);
        assert_eq!(*turns, 1);
        assert!(message.contains("Source 1 (bio.pdf, Page 1): Enzymes lower activation energy."));
        assert!(message.contains("Student Question: What do enzymes do?"));
    }

    #[tokio::test]
    async fn short_output_is_a_generation_failure() {
        let provider = Arc::new(Recording { reply: "  Yes.  ".into(), seen: Mutex::new(Vec::new()) });
        let strategy = GenerativeStrategy::new(provider, Duration::from_secs(5), 20);
        let sources = sources();
        let context = AnswerContext { query: "q", sources: &sources, history: &[] };
        let err = strategy.attempt(&context).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let strategy = GenerativeStrategy::new(Arc::new(Sleepy), Duration::from_secs(1), 20);
        let sources = sources();
        let context = AnswerContext { query: "q", sources: &sources, history: &[] };
        let err = strategy.attempt(&context).await.unwrap_err();
        assert!(matches!(err, RagError::Timeout { seconds: 1, .. }));
    }

    #[tokio::test]
    async fn extractive_quotes_sources() {
        let sources = sources();
        let context = AnswerContext { query: "q", sources: &sources, history: &[] };
        let answer = ExtractiveStrategy.attempt(&context).await.unwrap();
        assert!(answer.contains("Enzymes lower activation energy."));
        assert_eq!(ExtractiveStrategy.mode(), AnswerMode::Fallback);
    }
}
