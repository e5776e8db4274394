//! Data types for chunks, index entries, search results, and answers.

use serde::{Deserialize, Serialize};

/// One logical unit (page, slide) handed over by the extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceUnit {
    /// Raw extracted text.
    pub text: String,
    /// Logical origin inside the file, e.g. `"Page 3"` or `"Slide 2"`.
    pub section: String,
    /// The source file label (a path or a bare file name).
    pub source: String,
}

impl SourceUnit {
    /// Create a unit from its three parts.
    pub fn new(
        text: impl Into<String>,
        section: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self { text: text.into(), section: section.into(), source: source.into() }
    }
}

/// A window of normalized document text with identifying metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `"{section}_{n}"`, unique within one source file and section.
    pub chunk_id: String,
    /// The normalized text of the window.
    pub text: String,
    /// Logical origin inside the source file.
    pub section: String,
    /// File name of the source document.
    pub source_file: String,
    /// Number of whitespace tokens in `text`.
    pub word_count: usize,
}

impl Chunk {
    /// Create a chunk, deriving `word_count` from the text.
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        section: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            chunk_id: chunk_id.into(),
            text,
            section: section.into(),
            source_file: source_file.into(),
            word_count,
        }
    }
}

/// A [`Chunk`] with its embedding, owned by the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The embedding computed for `chunk.text` at add time.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Metric distance to the query (lower is more similar, 0 is identical).
    pub distance: f32,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub relevance_score: f32,
}

impl SearchResult {
    /// Pair a chunk with its distance and derive the relevance score.
    pub fn new(chunk: Chunk, distance: f32) -> Self {
        Self { chunk, distance, relevance_score: relevance_score(distance) }
    }
}

/// Lowest relevance score, given to infinite or NaN distances.
const MIN_RELEVANCE: f32 = f32::from_bits(1);

/// Map a non-negative distance to a relevance score in `(0, 1]`.
///
/// Negative values (floating point noise around zero) are clamped to 0.
/// Non-finite distances get the lowest score, so relevance never increases
/// with distance.
pub fn relevance_score(distance: f32) -> f32 {
    if !distance.is_finite() {
        return MIN_RELEVANCE;
    }
    (1.0 / (1.0 + distance.max(0.0))).max(MIN_RELEVANCE)
}

/// A source reported alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttribution {
    /// Source file name.
    pub file: String,
    /// Section label.
    pub section: String,
    /// Chunk text, truncated with `"..."` when long.
    pub text: String,
    /// Relevance score copied from the search result.
    pub relevance_score: f32,
}

/// Which path produced an [`AnswerResult`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// The generation capability produced the answer.
    Generated,
    /// Generation failed and the answer was assembled from sources.
    Fallback,
    /// No generation capability is configured; the answer was assembled from sources.
    GenerationUnavailable,
    /// The index returned nothing for the query.
    NoContext,
    /// Retrieval itself failed (e.g. the embedding backend was unreachable).
    RetrievalFailed,
}

/// The structured response to a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// The answer text.
    pub answer: String,
    /// Sources used for the answer, most relevant first.
    pub sources: Vec<SourceAttribution>,
    /// `sources.len()`.
    pub total_sources: usize,
    /// The query as asked.
    pub query: String,
    /// How the answer was produced.
    pub mode: AnswerMode,
}

/// Outcome of ingesting a batch of extracted units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks produced and indexed by this call.
    pub chunks_processed: usize,
    /// Index size after the call.
    pub total_indexed: usize,
}

/// Health snapshot of the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Entries in the vector index.
    pub indexed_chunks: usize,
    /// Whether a generation capability is configured.
    pub generation_available: bool,
    /// Users with a live conversation log.
    pub active_conversations: usize,
}
