//! Vector index: embed → store → exact nearest-neighbour search.
//!
//! [`VectorIndex`] owns every [`IndexedEntry`]. Embeddings are computed once
//! at add time, so a search costs one embedding call for the query plus an
//! O(n) linear scan over the entries.
//!
//! Writers are serialized by an async gate. Embedding runs before any lock on
//! the entries is taken, and a batch is validated in full before it is
//! committed inside one short write section, so readers never see a
//! partially inserted batch and a dropped `add` future leaves the index as it
//! was.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, IndexedEntry, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result, with_timeout};
use crate::persistence::SnapshotStore;

const BACKEND: &str = "flat";
const SNAPSHOT_VERSION: u32 = 1;
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// How distance between two embeddings is measured.
///
/// Every metric reports 0 for identical vectors and grows with dissimilarity,
/// which is what the `1 / (1 + distance)` relevance score assumes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance, in `[0, ∞)`.
    #[default]
    SquaredL2,
    /// Cosine distance `1 - cos(a, b)`, in `[0, 2]`. Zero vectors are at distance 1.
    Cosine,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    ///
    /// Overflowing or undefined results are reported as `f32::INFINITY`.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let distance = self.raw_distance(a, b);
        if distance.is_nan() { f32::INFINITY } else { distance }
    }

    fn raw_distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::SquaredL2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
            }
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexedEntry>,
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    provider: &'a str,
    dimensions: Option<usize>,
    entries: &'a [IndexedEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    dimensions: Option<usize>,
    entries: Vec<IndexedEntry>,
}

struct Persistence {
    store: Arc<dyn SnapshotStore>,
    location: String,
}

/// An embedding index over [`Chunk`]s with exact similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tutor_rag::{DistanceMetric, HashingEmbeddingProvider, VectorIndex};
///
/// let index = VectorIndex::new(Arc::new(HashingEmbeddingProvider::default()))
///     .with_metric(DistanceMetric::SquaredL2);
/// index.add(&chunks).await?;
/// let hits = index.search("what is osmosis", 5).await?;
/// ```
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    metric: DistanceMetric,
    embed_timeout: Duration,
    state: RwLock<IndexState>,
    write_gate: Mutex<()>,
    len: AtomicUsize,
    persistence: Option<Persistence>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("provider", &self.provider.name())
            .field("metric", &self.metric)
            .field("len", &self.count())
            .field("persist_location", &self.persistence.as_ref().map(|p| &p.location))
            .finish()
    }
}

impl VectorIndex {
    /// Create an empty, non-persistent index using squared L2 distance.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            metric: DistanceMetric::default(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            state: RwLock::new(IndexState::default()),
            write_gate: Mutex::new(()),
            len: AtomicUsize::new(0),
            persistence: None,
        }
    }

    /// Create an index from a [`RagConfig`] and restore its snapshot.
    ///
    /// Persistence is enabled when both `store` and
    /// `config.persist_location` are present. Restore failures are logged and
    /// leave the index empty.
    pub async fn open(
        provider: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        let mut index = Self::new(provider)
            .with_metric(config.distance_metric)
            .with_embed_timeout(config.embed_timeout());
        if let (Some(store), Some(location)) = (store, config.persist_location.as_ref()) {
            index = index.with_persistence(store, location.clone());
        }
        index.load().await;
        index
    }

    /// Use `metric` for distances.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Bound every embedding call by `timeout`.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Persist snapshots to `location` in `store` after every successful write.
    pub fn with_persistence(
        mut self,
        store: Arc<dyn SnapshotStore>,
        location: impl Into<String>,
    ) -> Self {
        self.persistence = Some(Persistence { store, location: location.into() });
        self
    }

    /// The configured distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Number of indexed entries.
    pub fn count(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Embed `chunks` and append them to the index.
    ///
    /// Calls accumulate; an empty slice is a no-op. The batch commits fully or
    /// not at all. When persistence is configured the snapshot is rewritten
    /// afterwards; a failed save is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns the embedding error (or [`RagError::Timeout`]) if the batch
    /// could not be embedded, and [`RagError::VectorStoreError`] if the
    /// embeddings have the wrong count or dimensionality.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            with_timeout("embedding", self.embed_timeout, self.provider.embed_batch(&texts))
                .await
                .inspect_err(|e| {
                    error!(provider = self.provider.name(), error = %e, "embedding failed during add");
                })?;

        if embeddings.len() != chunks.len() {
            return Err(store_error(format!(
                "provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let total = {
            let mut state = self.state.write().await;
            let dimensions = validate_dimensions(state.dimensions, &embeddings)?;
            state.entries.extend(
                chunks
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedEntry { chunk, embedding }),
            );
            state.dimensions = Some(dimensions);
            self.len.store(state.entries.len(), Ordering::Release);
            state.entries.len()
        };

        info!(chunk_count = chunks.len(), total, "indexed chunks");
        self.persist_or_warn().await;
        Ok(())
    }

    /// Return up to `top_k` entries closest to `query`, most similar first.
    ///
    /// An empty index returns an empty `Vec` without calling the embedding
    /// provider. `top_k` larger than the index is clamped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `top_k` is zero, and the
    /// embedding error (or [`RagError::Timeout`]) if the query cannot be
    /// embedded.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RagError::invalid_input("top_k must be at least 1"));
        }
        if self.is_empty() {
            debug!("search on empty index");
            return Ok(Vec::new());
        }

        let query_embedding =
            with_timeout("embedding", self.embed_timeout, self.provider.embed(query))
                .await
                .inspect_err(|e| {
                    error!(provider = self.provider.name(), error = %e, "query embedding failed");
                })?;

        if !all_finite(&query_embedding) {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: "query embedding has non-finite components".into(),
            });
        }

        let state = self.state.read().await;
        if let Some(dimensions) = state.dimensions {
            if dimensions != query_embedding.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.provider.name().to_string(),
                    message: format!(
                        "query embedding has {} dimensions, index has {dimensions}",
                        query_embedding.len()
                    ),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, self.metric.distance(&entry.embedding, &query_embedding)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .map(|(i, distance)| SearchResult::new(state.entries[i].chunk.clone(), distance))
            .collect();

        debug!(result_count = results.len(), top_k, "search completed");
        Ok(results)
    }

    /// Up to `limit` indexed chunks in insertion order.
    pub async fn chunks(&self, limit: usize) -> Vec<Chunk> {
        let state = self.state.read().await;
        state.entries.iter().take(limit).map(|e| e.chunk.clone()).collect()
    }

    /// Remove every entry (full rebuild) and persist the empty snapshot.
    pub async fn reset(&self) {
        let _gate = self.write_gate.lock().await;
        {
            let mut state = self.state.write().await;
            state.entries.clear();
            state.dimensions = None;
            self.len.store(0, Ordering::Release);
        }
        info!("index reset");
        self.persist_or_warn().await;
    }

    /// Restore the index from its snapshot location.
    ///
    /// Returns the number of restored entries. A missing snapshot, an
    /// unreadable or corrupt one, or one whose vectors do not match the
    /// provider's dimensionality all leave the index empty with a warning.
    pub async fn load(&self) -> usize {
        let Some(persistence) = &self.persistence else {
            return 0;
        };
        let location = persistence.location.as_str();

        let _gate = self.write_gate.lock().await;
        let restored = match persistence.store.load(location).await {
            Ok(Some(bytes)) => match self.decode_snapshot(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(location, error = %e, "ignoring unusable index snapshot; starting empty");
                    IndexState::default()
                }
            },
            Ok(None) => {
                debug!(location, "no index snapshot found");
                IndexState::default()
            }
            Err(e) => {
                warn!(location, error = %e, "could not load index snapshot; starting empty");
                IndexState::default()
            }
        };

        let count = restored.entries.len();
        *self.state.write().await = restored;
        self.len.store(count, Ordering::Release);
        if count > 0 {
            info!(location, count, "restored index snapshot");
        }
        count
    }

    /// Write the current snapshot. A no-op without persistence.
    ///
    /// Waits for in-flight writes, so snapshots are never saved concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if encoding or saving fails.
    pub async fn persist(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.write_snapshot().await
    }

    /// Save the snapshot. Callers hold `write_gate`.
    async fn write_snapshot(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let location = persistence.location.as_str();

        let bytes = {
            let state = self.state.read().await;
            serde_json::to_vec(&SnapshotRef {
                version: SNAPSHOT_VERSION,
                provider: self.provider.name(),
                dimensions: state.dimensions,
                entries: &state.entries,
            })
            .map_err(|e| RagError::PersistenceError {
                location: location.to_string(),
                message: format!("encode failed: {e}"),
            })?
        };

        persistence.store.save(location, &bytes).await
    }

    /// Callers hold `write_gate`.
    async fn persist_or_warn(&self) {
        if let Err(e) = self.write_snapshot().await {
            warn!(error = %e, "failed to persist index; continuing in memory");
        }
    }

    fn decode_snapshot(&self, bytes: &[u8]) -> Result<IndexState> {
        let corrupt = |message: String| RagError::PersistenceError {
            location: self.persistence.as_ref().map(|p| p.location.clone()).unwrap_or_default(),
            message,
        };

        let snapshot: Snapshot =
            serde_json::from_slice(bytes).map_err(|e| corrupt(format!("decode failed: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!("unsupported snapshot version {}", snapshot.version)));
        }
        if snapshot.entries.is_empty() {
            return Ok(IndexState::default());
        }

        let expected = self.provider.dimensions();
        let embeddings: Vec<&[f32]> =
            snapshot.entries.iter().map(|e| e.embedding.as_slice()).collect();
        let dimensions = validate_dimensions(snapshot.dimensions, &embeddings)
            .map_err(|e| corrupt(e.to_string()))?;
        if dimensions != expected {
            return Err(corrupt(format!(
                "snapshot has {dimensions}-dimensional vectors, provider produces {expected}"
            )));
        }

        Ok(IndexState { entries: snapshot.entries, dimensions: Some(dimensions) })
    }
}

fn store_error(message: String) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message }
}

fn all_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Check that every vector is non-empty, finite, and shares one length,
/// which must equal `existing` when the index already has entries.
fn validate_dimensions<V: AsRef<[f32]>>(existing: Option<usize>, vectors: &[V]) -> Result<usize> {
    let first = vectors.first().map(|v| v.as_ref().len()).unwrap_or(0);
    let expected = existing.unwrap_or(first);
    if expected == 0 {
        return Err(store_error("embeddings must not be empty".to_string()));
    }
    if let Some(bad) = vectors.iter().map(|v| v.as_ref().len()).find(|len| *len != expected) {
        return Err(store_error(format!(
            "embedding has {bad} dimensions, expected {expected}"
        )));
    }
    if let Some(pos) = vectors.iter().position(|v| !all_finite(v.as_ref())) {
        return Err(store_error(format!("embedding {pos} has non-finite components")));
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use crate::persistence::InMemorySnapshotStore;
    use async_trait::async_trait;

    fn chunk(section: &str, text: &str) -> Chunk {
        Chunk::new(format!("{section}_0"), text, section, "doc.pdf")
    }

    fn hashing_index() -> VectorIndex {
        VectorIndex::new(Arc::new(HashingEmbeddingProvider::new(64).unwrap()))
    }

    /// Returns fixed vectors keyed by text; unknown texts fail.
    struct TableProvider {
        dims: usize,
        table: Vec<(&'static str, Vec<f32>)>,
    }

    #[async_trait]
    impl EmbeddingProvider for TableProvider {
        fn name(&self) -> &str {
            "table"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.table.iter().find(|(t, _)| *t == text).map(|(_, v)| v.clone()).ok_or_else(|| {
                RagError::EmbeddingError { provider: "table".into(), message: text.into() }
            })
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    struct FailingStore;

    #[async_trait]
    impl SnapshotStore for FailingStore {
        async fn load(&self, location: &str) -> Result<Option<Vec<u8>>> {
            Err(RagError::PersistenceError { location: location.into(), message: "down".into() })
        }

        async fn save(&self, location: &str, _bytes: &[u8]) -> Result<()> {
            Err(RagError::PersistenceError { location: location.into(), message: "down".into() })
        }
    }

    #[test]
    fn squared_l2_distance() {
        let d = DistanceMetric::SquaredL2.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 25.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_is_zero_for_parallel_vectors() {
        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&[1.0, 2.0], &[2.0, 4.0]).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn add_accumulates_across_calls() {
        let index = hashing_index();
        index.add(&[chunk("Page 1", "cells"), chunk("Page 2", "atoms")]).await.unwrap();
        assert_eq!(index.count(), 2);
        index.add(&[chunk("Page 3", "stars")]).await.unwrap();
        assert_eq!(index.count(), 3);
        index.add(&[]).await.unwrap();
        assert_eq!(index.count(), 3);
    }

    #[tokio::test]
    async fn empty_index_search_is_empty() {
        let index = hashing_index();
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_is_invalid() {
        let index = hashing_index();
        assert!(matches!(index.search("q", 0).await, Err(RagError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn search_orders_by_distance_and_clamps_top_k() {
        let provider = TableProvider {
            dims: 2,
            table: vec![
                ("near", vec![1.0, 0.1]),
                ("far", vec![-1.0, 0.0]),
                ("mid", vec![0.5, 0.5]),
                ("query", vec![1.0, 0.0]),
            ],
        };
        let index = VectorIndex::new(Arc::new(provider));
        index
            .add(&[chunk("A", "far"), chunk("B", "near"), chunk("C", "mid")])
            .await
            .unwrap();

        let results = index.search("query", 10).await.unwrap();
        let sections: Vec<_> = results.iter().map(|r| r.chunk.section.as_str()).collect();
        assert_eq!(sections, ["B", "C", "A"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(results.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));

        assert_eq!(index.search("query", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_embedding_leaves_index_untouched() {
        let provider = TableProvider { dims: 2, table: vec![("ok", vec![1.0, 0.0])] };
        let index = VectorIndex::new(Arc::new(provider));
        index.add(&[chunk("A", "ok")]).await.unwrap();

        let err = index.add(&[chunk("B", "ok"), chunk("C", "unknown")]).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
        assert_eq!(index.count(), 1);
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected_whole() {
        let provider = TableProvider {
            dims: 2,
            table: vec![("two", vec![1.0, 0.0]), ("three", vec![1.0, 0.0, 0.0])],
        };
        let index = VectorIndex::new(Arc::new(provider));
        index.add(&[chunk("A", "two")]).await.unwrap();
        let err = index.add(&[chunk("B", "two"), chunk("C", "three")]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        assert_eq!(index.count(), 1);
    }

    #[tokio::test]
    async fn snapshot_roundtrip_restores_entries() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let provider = Arc::new(HashingEmbeddingProvider::new(32).unwrap());

        let index = VectorIndex::new(provider.clone()).with_persistence(store.clone(), "idx");
        index.add(&[chunk("Page 1", "mitochondria"), chunk("Page 2", "ribosome")]).await.unwrap();

        let restored = VectorIndex::new(provider).with_persistence(store, "idx");
        assert_eq!(restored.load().await, 2);
        assert_eq!(restored.count(), 2);
        let hits = restored.search("ribosome", 1).await.unwrap();
        assert_eq!(hits[0].chunk.section, "Page 2");
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() {
        let store = Arc::new(InMemorySnapshotStore::new());
        store.save("idx", b"not json").await.unwrap();
        let index = hashing_index().with_persistence(store, "idx");
        assert_eq!(index.load().await, 0);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn snapshot_from_other_dimensionality_is_ignored() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let small = VectorIndex::new(Arc::new(HashingEmbeddingProvider::new(8).unwrap()))
            .with_persistence(store.clone(), "idx");
        small.add(&[chunk("Page 1", "enzyme")]).await.unwrap();

        let large = hashing_index().with_persistence(store, "idx");
        assert_eq!(large.load().await, 0);
    }

    #[tokio::test]
    async fn failing_store_never_loses_the_in_memory_index() {
        let index = hashing_index().with_persistence(Arc::new(FailingStore), "idx");
        assert_eq!(index.load().await, 0);
        index.add(&[chunk("Page 1", "glucose")]).await.unwrap();
        assert_eq!(index.count(), 1);
        assert!(index.persist().await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_entries_and_allows_new_dimensions() {
        let index = hashing_index();
        index.add(&[chunk("Page 1", "nucleus")]).await.unwrap();
        index.reset().await;
        assert_eq!(index.count(), 0);
        assert!(index.search("nucleus", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_returns_insertion_order() {
        let index = hashing_index();
        index.add(&[chunk("Page 1", "a"), chunk("Page 2", "b"), chunk("Page 3", "c")]).await.unwrap();
        let sections: Vec<_> = index.chunks(2).await.into_iter().map(|c| c.section).collect();
        assert_eq!(sections, ["Page 1", "Page 2"]);
    }

    #[tokio::test]
    async fn non_finite_embeddings_are_rejected() {
        let provider = TableProvider {
            dims: 2,
            table: vec![
                ("good", vec![1.0, 0.0]),
                ("nan", vec![f32::NAN, 0.0]),
                ("inf", vec![f32::INFINITY, 0.0]),
                ("bad query", vec![0.0, f32::NAN]),
            ],
        };
        let index = VectorIndex::new(Arc::new(provider));
        index.add(&[chunk("A", "good")]).await.unwrap();

        let err = index.add(&[chunk("B", "good"), chunk("C", "nan")]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        assert!(index.add(&[chunk("D", "inf")]).await.is_err());
        assert_eq!(index.count(), 1);

        let err = index.search("bad query", 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn overflowing_distances_rank_last() {
        let provider = TableProvider {
            dims: 2,
            table: vec![
                ("good", vec![1.0, 0.0]),
                ("huge", vec![1e30, 0.0]),
                ("mid", vec![0.0, 1.0]),
                ("query", vec![1.0, 0.0]),
            ],
        };
        let index = VectorIndex::new(Arc::new(provider));
        index
            .add(&[chunk("A", "good"), chunk("C", "huge"), chunk("B", "mid")])
            .await
            .unwrap();

        let results = index.search("query", 3).await.unwrap();
        let sections: Vec<_> = results.iter().map(|r| r.chunk.section.as_str()).collect();
        assert_eq!(sections, ["A", "B", "C"]);
        assert_eq!(results[2].distance, f32::INFINITY);
        for result in &results {
            assert!(result.relevance_score > 0.0 && result.relevance_score <= 1.0);
        }
        assert!(results.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[test]
    fn undefined_distance_is_infinite() {
        let d = DistanceMetric::Cosine.distance(&[f32::MAX, f32::MAX], &[f32::MAX, f32::MAX]);
        assert!(!d.is_nan());
        assert_eq!(DistanceMetric::SquaredL2.distance(&[f32::NAN], &[0.0]), f32::INFINITY);
    }

    /// Sleeps before delegating, so an add can be dropped mid-embedding.
    struct SlowProvider(HashingEmbeddingProvider);

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            self.0.embed(text).await
        }

        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_add_leaves_index_untouched() {
        let index = VectorIndex::new(Arc::new(SlowProvider(HashingEmbeddingProvider::new(16).unwrap())));
        index.add(&[chunk("Page 1", "cells")]).await.unwrap();

        let dropped =
            tokio::time::timeout(Duration::from_secs(1), index.add(&[chunk("Page 2", "atoms")]))
                .await;
        assert!(dropped.is_err());
        assert_eq!(index.count(), 1);
        assert_eq!(index.chunks(10).await.len(), 1);

        index.add(&[chunk("Page 3", "stars")]).await.unwrap();
        assert_eq!(index.count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_persists_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("vector_index.json").to_string_lossy().into_owned();
        let index = Arc::new(
            VectorIndex::new(Arc::new(HashingEmbeddingProvider::new(16).unwrap()))
                .with_persistence(Arc::new(crate::persistence::FileSnapshotStore::new()), location.clone()),
        );
        let chunks: Vec<Chunk> =
            (0..300).map(|i| chunk(&format!("Page {i}"), &format!("word{i} topic"))).collect();
        index.add(&chunks).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move { index.persist().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reopened = VectorIndex::new(Arc::new(HashingEmbeddingProvider::new(16).unwrap()))
            .with_persistence(Arc::new(crate::persistence::FileSnapshotStore::new()), location);
        assert_eq!(reopened.load().await, 300);
    }

    #[test]
    fn validate_dimensions_rules() {
        let ok: Vec<Vec<f32>> = vec![vec![0.0; 3], vec![1.0; 3]];
        assert_eq!(validate_dimensions(None, &ok).unwrap(), 3);
        assert!(validate_dimensions(Some(4), &ok).is_err());
        let empty: Vec<Vec<f32>> = vec![vec![]];
        assert!(validate_dimensions(None, &empty).is_err());
        let infinite: Vec<Vec<f32>> = vec![vec![0.0, f32::NEG_INFINITY]];
        assert!(validate_dimensions(None, &infinite).is_err());
    }
}
