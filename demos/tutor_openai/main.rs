//! # Tutor OpenAI Example
//!
//! Same flow as `tutor_basic` with OpenAI embeddings and chat completions.
//! Without `OPENAI_API_KEY` the tutor runs retrieval-only and says so.
//!
//! Run: `cargo run --example tutor_openai --features openai -- "your question"`

use std::sync::Arc;

use tracing::warn;
use tracing_subscriber::EnvFilter;
use tutor_rag::openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider, QUIZ_MAX_TOKENS};
use tutor_rag::{
    EmbeddingProvider, FileSnapshotStore, HashingEmbeddingProvider, RagConfig, RagOrchestrator,
    SourceUnit, VectorIndex,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "How do cells get energy from glucose?".to_string());
    let config = RagConfig::from_env()?;

    let embedder: Arc<dyn EmbeddingProvider> = match OpenAIEmbeddingProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!(error = %e, "falling back to local hashing embeddings");
            Arc::new(HashingEmbeddingProvider::default())
        }
    };
    let index =
        Arc::new(VectorIndex::open(embedder, &config, Some(Arc::new(FileSnapshotStore::new()))).await);

    let mut builder = RagOrchestrator::builder().config(config).index(index);
    match OpenAIGenerationProvider::from_env() {
        Ok(llm) => {
            let quiz_llm = OpenAIGenerationProvider::from_env()?.with_max_tokens(QUIZ_MAX_TOKENS);
            builder = builder.generation_provider(Arc::new(llm)).quiz_provider(Arc::new(quiz_llm));
        }
        Err(e) => warn!(error = %e, "generation unavailable"),
    }
    let tutor = builder.build()?;

    if tutor.index().is_empty() {
        tutor
            .ingest(&[SourceUnit::new(
                "Cellular respiration in the mitochondria breaks glucose down and stores \
                 the released energy as ATP.",
                "Page 1",
                "biology.pdf",
            )])
            .await?;
    }

    if let Err(e) = tutor.ensure_generation() {
        println!("Note: {e}. Answers will quote your documents.\n");
    }

    let result = tutor.answer(&question, tutor.default_top_k(), Some("cli")).await?;
    println!("Q: {}\nA: {}\n", result.query, result.answer);
    for source in result.sources {
        println!("- {} ({}) {:.3}: {}", source.file, source.section, source.relevance_score, source.text);
    }
    Ok(())
}
