//! OpenAI embedding and chat-completion providers.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! providers call the REST API directly with `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::memory::ConversationEntry;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "OpenAI";

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion budget for a five-question JSON quiz. Pass it to
/// [`OpenAIGenerationProvider::with_max_tokens`] for the provider given to
/// `RagOrchestratorBuilder::quiz_provider`.
pub const QUIZ_MAX_TOKENS: u32 = 1500;

fn api_key_from_env() -> Result<String> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(RagError::CapabilityUnavailable {
            capability: PROVIDER.into(),
            message: "OPENAI_API_KEY environment variable not set".into(),
        }),
    }
}

fn check_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(RagError::CapabilityUnavailable {
            capability: PROVIDER.into(),
            message: "API key must not be empty".into(),
        });
    }
    Ok(())
}

/// POST `body` to `{base_url}{path}` and decode the JSON reply.
async fn post_json<B, R>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    api_key: &str,
    body: &B,
    to_error: fn(String) -> RagError,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response = client
        .post(format!("{base_url}{path}"))
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            error!(provider = PROVIDER, path, error = %e, "request failed");
            to_error(format!("request failed: {e}"))
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

        error!(provider = PROVIDER, path, %status, "API error");
        return Err(to_error(format!("API returned {status}: {detail}")));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, path, error = %e, "failed to parse response");
        to_error(format!("failed to parse response: {e}"))
    })
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the `/v1/embeddings` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let embedding = provider.embed("photosynthesis").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// Passed to the API for Matryoshka truncation when set.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider using `text-embedding-3-small` (1536 dimensions).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CapabilityUnavailable`] for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request embeddings truncated to `dims`.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let mut response: EmbeddingResponse = post_json(
            &self.client,
            &self.base_url,
            "/embeddings",
            &self.api_key,
            &request,
            embedding_error,
        )
        .await?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`GenerationProvider`] backed by the `/v1/chat/completions` endpoint.
///
/// Defaults to `gpt-3.5-turbo` with `max_tokens = 500` and
/// `temperature = 0.7`.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::openai::OpenAIGenerationProvider;
///
/// let llm = OpenAIGenerationProvider::from_env()?.with_model("gpt-4o-mini");
/// let orchestrator = RagOrchestrator::builder()
///     .index(index)
///     .generation_provider(Arc::new(llm))
///     .build()?;
/// ```
pub struct OpenAIGenerationProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIGenerationProvider {
    /// Create a provider with the default model and sampling settings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CapabilityUnavailable`] for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the completion length limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn chat_messages<'a>(
    system: &'a str,
    turns: &'a [ConversationEntry],
    user_message: &'a str,
) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(turns.len() + 2);
    messages.push(ChatMessage { role: "system", content: system });
    messages.extend(
        turns.iter().map(|t| ChatMessage { role: t.role.as_str(), content: &t.content }),
    );
    messages.push(ChatMessage { role: "user", content: user_message });
    messages
}

#[async_trait]
impl GenerationProvider for OpenAIGenerationProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        system: &str,
        turns: &[ConversationEntry],
        user_message: &str,
    ) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, turns = turns.len(), "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages(system, turns, user_message),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response: ChatResponse = post_json(
            &self.client,
            &self.base_url,
            "/chat/completions",
            &self.api_key,
            &request,
            generation_error,
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| generation_error("API returned no completion".into()))
    }
}
