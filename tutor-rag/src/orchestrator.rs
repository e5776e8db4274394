//! Question answering over the vector index.
//!
//! The [`RagOrchestrator`] coordinates the full workflow by composing a
//! [`Chunker`], a shared [`VectorIndex`], a [`ConversationMemory`], an
//! optional [`GenerationProvider`], and an ordered list of
//! [`AnswerStrategy`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tutor_rag::{RagOrchestrator, RagConfig, SourceUnit, VectorIndex};
//!
//! let orchestrator = RagOrchestrator::builder()
//!     .config(RagConfig::default())
//!     .index(Arc::new(VectorIndex::new(Arc::new(my_embedder))))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! orchestrator.ingest(&[SourceUnit::new(text, "Page 1", "biology.pdf")]).await?;
//! let result = orchestrator.answer("What is osmosis?", 5, Some("student-7")).await?;
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::chunking::{Chunker, WindowChunker};
use crate::config::RagConfig;
use crate::document::{
    AnswerMode, AnswerResult, IngestReport, SearchResult, ServiceStatus, SourceAttribution,
    SourceUnit,
};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::VectorIndex;
use crate::memory::ConversationMemory;
use crate::prompt::{INSUFFICIENT_INFORMATION, extractive_answer};
use crate::quiz::{Quiz, QuizGenerator};
use crate::strategy::{AnswerContext, AnswerStrategy, ExtractiveStrategy, GenerativeStrategy};

/// Number of indexed chunks sampled for a quiz.
const QUIZ_SAMPLE_CHUNKS: usize = 20;

/// The retrieval-augmented answering service.
///
/// Stateless across requests apart from the conversation memory it updates.
/// Construct one via [`RagOrchestrator::builder()`].
pub struct RagOrchestrator {
    config: RagConfig,
    index: Arc<VectorIndex>,
    memory: Arc<ConversationMemory>,
    chunker: Arc<dyn Chunker>,
    generator: Option<Arc<dyn GenerationProvider>>,
    quiz_generator: Option<Arc<dyn GenerationProvider>>,
    strategies: Vec<Arc<dyn AnswerStrategy>>,
}

impl RagOrchestrator {
    /// Create a new [`RagOrchestratorBuilder`].
    pub fn builder() -> RagOrchestratorBuilder {
        RagOrchestratorBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the shared vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Return the shared conversation memory.
    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// `top_k` to use when the caller has no preference.
    pub fn default_top_k(&self) -> usize {
        self.config.default_top_k
    }

    /// Whether a generation capability is configured.
    pub fn generation_available(&self) -> bool {
        self.generator.is_some()
    }

    /// Fail with [`RagError::CapabilityUnavailable`] when no generation
    /// capability is configured. Lets callers report "service unavailable"
    /// up front instead of relying on [`AnswerMode::GenerationUnavailable`].
    pub fn ensure_generation(&self) -> Result<()> {
        if self.generator.is_some() {
            Ok(())
        } else {
            Err(RagError::CapabilityUnavailable {
                capability: "generation".into(),
                message: "no generation provider configured".into(),
            })
        }
    }

    /// Chunk extracted units and add them to the index in one batch.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if no unit yields any text, and the
    /// index error if embedding fails.
    pub async fn ingest(&self, units: &[SourceUnit]) -> Result<IngestReport> {
        let chunks: Vec<_> = units.iter().flat_map(|unit| self.chunker.split_unit(unit)).collect();
        if chunks.is_empty() {
            return Err(RagError::invalid_input("no content could be extracted from the document"));
        }

        self.index.add(&chunks).await?;
        let report = IngestReport { chunks_processed: chunks.len(), total_indexed: self.index.count() };
        info!(
            units = units.len(),
            chunks_processed = report.chunks_processed,
            total_indexed = report.total_indexed,
            "ingested document"
        );
        Ok(report)
    }

    /// Retrieve context for `query` without generating an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty query or an
    /// out-of-range `top_k`, and the index error if the query cannot be
    /// embedded.
    pub async fn context(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.validate(query, top_k)?;
        self.index.search(query, top_k).await
    }

    /// Answer `query` from the `top_k` nearest chunks, optionally in the
    /// context of `user_id`'s recent conversation.
    ///
    /// Only the first `context_k` results are used for the prompt and
    /// reported as sources. Retrieval and generation failures are absorbed:
    /// the returned [`AnswerResult::mode`] records which path produced the
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty query or an
    /// out-of-range `top_k`, before any retrieval work.
    pub async fn answer(
        &self,
        query: &str,
        top_k: usize,
        user_id: Option<&str>,
    ) -> Result<AnswerResult> {
        self.validate(query, top_k)?;
        let user_id = user_id.map(str::trim).filter(|id| !id.is_empty());

        let results = match self.index.search(query, top_k).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "retrieval failed; answering without context");
                return Ok(self.without_context(query, AnswerMode::RetrievalFailed));
            }
        };
        if results.is_empty() {
            info!(top_k, "no indexed context for query");
            return Ok(self.without_context(query, AnswerMode::NoContext));
        }

        let selected = &results[..results.len().min(self.config.context_k)];
        let history = match user_id {
            Some(id) => self.memory.recent(id, self.config.history_turns).await,
            None => Vec::new(),
        };

        let context = AnswerContext { query, sources: selected, history: &history };
        let (answer, mut mode) = self.run_strategies(&context).await;
        if mode == AnswerMode::Fallback && self.generator.is_none() {
            mode = AnswerMode::GenerationUnavailable;
        }

        if let Some(id) = user_id {
            self.memory.append_exchange(id, query, &answer).await;
        }

        let sources: Vec<SourceAttribution> =
            selected.iter().map(|r| attribution(r, self.config.snippet_chars)).collect();
        info!(
            total_sources = sources.len(),
            mode = ?mode,
            has_history = !history.is_empty(),
            "answered query"
        );

        Ok(AnswerResult {
            answer,
            total_sources: sources.len(),
            sources,
            query: query.to_string(),
            mode,
        })
    }

    /// Forget `user_id`'s conversation.
    pub async fn clear_history(&self, user_id: &str) {
        self.memory.clear(user_id).await;
    }

    /// Drop conversations idle for longer than `max_idle`. Returns how many
    /// were dropped.
    pub async fn evict_idle_conversations(&self, max_idle: std::time::Duration) -> usize {
        self.memory.evict_idle(max_idle).await
    }

    /// Generate a multiple-choice quiz from the indexed material.
    ///
    /// Uses the quiz provider when one is configured, otherwise the answer
    /// generator.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CapabilityUnavailable`] without a generation
    /// provider, [`RagError::InvalidInput`] if nothing is indexed, and
    /// [`RagError::QuizError`] if generation fails.
    pub async fn quiz(&self) -> Result<Quiz> {
        let provider = self.quiz_generator.as_ref().or(self.generator.as_ref());
        let generator = provider.cloned().ok_or_else(|| RagError::CapabilityUnavailable {
            capability: "generation".into(),
            message: "no generation provider configured".into(),
        })?;

        let chunks = self.index.chunks(QUIZ_SAMPLE_CHUNKS).await;
        if chunks.is_empty() {
            return Err(RagError::invalid_input(
                "No documents uploaded. Please upload documents first.",
            ));
        }
        QuizGenerator::new(generator, self.config.generation_timeout()).generate(&chunks).await
    }

    /// Health snapshot.
    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            indexed_chunks: self.index.count(),
            generation_available: self.generation_available(),
            active_conversations: self.memory.active_users().await,
        }
    }

    fn validate(&self, query: &str, top_k: usize) -> Result<()> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_input("query must not be empty"));
        }
        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(RagError::invalid_input(format!(
                "top_k must be between 1 and {}",
                self.config.max_top_k
            )));
        }
        Ok(())
    }

    async fn run_strategies(&self, context: &AnswerContext<'_>) -> (String, AnswerMode) {
        for strategy in &self.strategies {
            match strategy.attempt(context).await {
                Ok(answer) => return (answer, strategy.mode()),
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        transient = e.is_transient(),
                        error = %e,
                        "answer strategy failed"
                    );
                }
            }
        }
        (extractive_answer(context.sources.iter().map(|r| &r.chunk)), AnswerMode::Fallback)
    }

    fn without_context(&self, query: &str, mode: AnswerMode) -> AnswerResult {
        AnswerResult {
            answer: INSUFFICIENT_INFORMATION.to_string(),
            sources: Vec::new(),
            total_sources: 0,
            query: query.to_string(),
            mode,
        }
    }
}

fn attribution(result: &SearchResult, snippet_chars: usize) -> SourceAttribution {
    SourceAttribution {
        file: result.chunk.source_file.clone(),
        section: result.chunk.section.clone(),
        text: truncate_snippet(&result.chunk.text, snippet_chars),
        relevance_score: result.relevance_score,
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with `"..."`.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Builder for constructing a [`RagOrchestrator`].
///
/// Only `index` is required. Without a generation provider the orchestrator
/// runs in degraded mode: retrieval works and answers are assembled from the
/// retrieved sources.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = RagOrchestrator::builder()
///     .config(config)
///     .index(index)
///     .memory(Arc::new(ConversationMemory::new(10)?))   // optional
///     .generation_provider(Arc::new(llm))                // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagOrchestratorBuilder {
    config: Option<RagConfig>,
    index: Option<Arc<VectorIndex>>,
    memory: Option<Arc<ConversationMemory>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn GenerationProvider>>,
    quiz_generator: Option<Arc<dyn GenerationProvider>>,
    strategies: Option<Vec<Arc<dyn AnswerStrategy>>>,
}

impl RagOrchestratorBuilder {
    /// Set the configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the shared vector index.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the conversation memory. Defaults to one bounded by `memory_bound`.
    pub fn memory(mut self, memory: Arc<ConversationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the chunker. Defaults to a [`WindowChunker`] from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the generation capability.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(provider);
        self
    }

    /// Set a separate provider for quizzes, e.g. one allowed a longer reply
    /// than answers need. Defaults to the generation provider.
    pub fn quiz_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.quiz_generator = Some(provider);
        self
    }

    /// Replace the default strategy chain (generative, then extractive).
    ///
    /// If every strategy in the chain fails, an extractive answer is still
    /// produced.
    pub fn strategies(mut self, strategies: Vec<Arc<dyn AnswerStrategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Build the [`RagOrchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `index` is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(WindowChunker::from_config(&config)?),
        };
        let memory = match self.memory {
            Some(memory) => memory,
            None => Arc::new(ConversationMemory::new(config.memory_bound)?),
        };

        let strategies = match self.strategies {
            Some(strategies) => strategies,
            None => {
                let mut chain: Vec<Arc<dyn AnswerStrategy>> = Vec::new();
                if let Some(generator) = &self.generator {
                    chain.push(Arc::new(GenerativeStrategy::new(
                        Arc::clone(generator),
                        config.generation_timeout(),
                        config.min_answer_chars,
                    )));
                }
                chain.push(Arc::new(ExtractiveStrategy));
                chain
            }
        };

        if self.generator.is_none() {
            warn!("no generation provider configured; answers will be extractive");
        }

        Ok(RagOrchestrator {
            config,
            index,
            memory,
            chunker,
            generator: self.generator,
            quiz_generator: self.quiz_generator,
            strategies,
        })
    }
}
