//! Text generation capability used to compose answers.

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::ConversationEntry;

/// An opaque text-completion backend.
///
/// A call receives a system instruction, prior conversation turns in arrival
/// order, and the final user message. Implementations return the completion
/// text or an error; callers treat any error as a transient failure.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::GenerationProvider;
///
/// let reply = provider.complete("You are a tutor.", &[], "What is osmosis?").await?;
/// ```
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Complete a conversation.
    async fn complete(
        &self,
        system: &str,
        turns: &[ConversationEntry],
        user_message: &str,
    ) -> Result<String>;
}
