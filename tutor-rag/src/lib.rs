//! # tutor-rag
//!
//! Retrieval-augmented question answering over a student's study materials.
//!
//! ## Overview
//!
//! Extracted text units (pages, slides, files) are split into overlapping
//! word windows, embedded, and stored in a [`VectorIndex`]. Questions are
//! answered by the [`RagOrchestrator`] from the nearest chunks, with per-user
//! [`ConversationMemory`] feeding recent turns back into generation.
//!
//! - [`WindowChunker`] - normalizes text and produces `{section}_{n}` chunks
//! - [`VectorIndex`] - exact nearest-neighbour search with optional snapshots
//! - [`ConversationMemory`] - bounded FIFO log per user
//! - [`RagOrchestrator`] - ingest, retrieve, answer, quiz
//!
//! Embedding and generation are capabilities supplied by the caller through
//! [`EmbeddingProvider`] and [`GenerationProvider`]. Without a generation
//! provider the orchestrator still answers by quoting the retrieved sources.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tutor_rag::{HashingEmbeddingProvider, RagConfig, RagOrchestrator, SourceUnit, VectorIndex};
//!
//! let config = RagConfig::builder().window_size(200).overlap(20).build()?;
//! let embedder = Arc::new(HashingEmbeddingProvider::default());
//! let index = Arc::new(VectorIndex::open(embedder, &config, None).await);
//!
//! let tutor = RagOrchestrator::builder().config(config).index(index).build()?;
//! tutor.ingest(&[SourceUnit::new(page_text, "Page 1", "biology.pdf")]).await?;
//!
//! let result = tutor.answer("What is osmosis?", 5, Some("student-7")).await?;
//! println!("{} ({} sources)", result.answer, result.total_sources);
//! ```
//!
//! ## Features
//!
//! - `openai` - OpenAI embedding and chat-completion providers over `reqwest`

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod memory;
pub mod orchestrator;
pub mod persistence;
pub mod prompt;
pub mod quiz;
pub mod strategy;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, WindowChunker, normalize_text};
pub use config::{RagConfig, RagConfigBuilder, SNAPSHOT_FILE_NAME};
pub use document::{
    AnswerMode, AnswerResult, Chunk, IndexedEntry, IngestReport, SearchResult, ServiceStatus,
    SourceAttribution, SourceUnit, relevance_score,
};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::GenerationProvider;
pub use index::{DistanceMetric, VectorIndex};
pub use memory::{
    ConversationEntry, ConversationHandle, ConversationLog, ConversationMemory,
    DEFAULT_MEMORY_BOUND, Role,
};
pub use orchestrator::{RagOrchestrator, RagOrchestratorBuilder};
pub use persistence::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use prompt::{INSUFFICIENT_INFORMATION, TUTOR_SYSTEM_PROMPT};
pub use quiz::{AnswerCheck, Quiz, QuizGenerator, QuizQuestion, parse_quiz_response};
pub use strategy::{AnswerContext, AnswerStrategy, ExtractiveStrategy, GenerativeStrategy};

#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider, QUIZ_MAX_TOKENS};
