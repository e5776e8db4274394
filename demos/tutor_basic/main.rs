//! # Tutor Basic Example
//!
//! Ingests a few pages of study notes, asks follow-up questions as one
//! student, and generates a quiz.
//!
//! Uses `HashingEmbeddingProvider` and a canned `NotesGenerator` so it runs
//! with **zero API keys**. Set `TUTOR_DATA_DIR` to keep the index between
//! runs.
//!
//! Run: `cargo run --example tutor_basic`

use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use tutor_rag::{
    ConversationEntry, FileSnapshotStore, GenerationProvider, HashingEmbeddingProvider,
    RagConfig, RagOrchestrator, SnapshotStore, SourceUnit, VectorIndex,
};

// ---------------------------------------------------------------------------
// NotesGenerator: echoes the best source back as the "generated" answer
// ---------------------------------------------------------------------------

struct NotesGenerator;

#[async_trait]
impl GenerationProvider for NotesGenerator {
    fn name(&self) -> &str {
        "notes"
    }

    async fn complete(
        &self,
        _system: &str,
        turns: &[ConversationEntry],
        user_message: &str,
    ) -> tutor_rag::Result<String> {
        if user_message.contains("multiple choice") {
            return Ok(QUIZ_REPLY.to_string());
        }
        let best = user_message
            .lines()
            .find(|line| line.starts_with("Source 1"))
            .and_then(|line| line.split_once("): "))
            .map(|(_, text)| text)
            .unwrap_or("nothing relevant");
        Ok(format!("From your notes ({} earlier turns): {best}", turns.len()))
    }
}

const QUIZ_REPLY: &str = r#"{"questions": [
  {"question": "Which organelle releases energy from glucose?",
   "options": {"A": "Ribosome", "B": "Mitochondrion", "C": "Chloroplast", "D": "Vacuole"},
   "correct_answer": "B"}
]}"#;

const NOTES: [(&str, &str); 3] = [
    (
        "Page 1",
        "Photosynthesis takes place in chloroplasts. Light energy is converted into \
         chemical energy stored in glucose.",
    ),
    (
        "Page 2",
        "Mitochondria are the site of cellular respiration. They release energy from \
         glucose and store it as ATP.",
    ),
    (
        "Page 3",
        "Ribosomes build proteins by translating messenger RNA. They float in the \
         cytoplasm or sit on the rough endoplasmic reticulum.",
    ),
];

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // -- 1. Configuration from TUTOR_* variables ----------------------------
    let config = RagConfig::from_env()?;
    let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new());

    // -- 2. Index (restored from disk when TUTOR_DATA_DIR is set) -----------
    let embedder = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(VectorIndex::open(embedder, &config, Some(store)).await);
    println!("Index starts with {} chunks", index.count());

    let tutor = RagOrchestrator::builder()
        .config(config)
        .index(index)
        .generation_provider(Arc::new(NotesGenerator))
        .build()?;

    // -- 3. Ingest ----------------------------------------------------------
    let units: Vec<SourceUnit> = NOTES
        .iter()
        .map(|(section, text)| SourceUnit::new(*text, *section, "notes/biology.pdf"))
        .collect();
    let report = tutor.ingest(&units).await?;
    println!(
        "Ingested {} chunks ({} total)\n",
        report.chunks_processed, report.total_indexed
    );

    // -- 4. Ask follow-up questions as one student --------------------------
    for question in [
        "Where is energy released from glucose?",
        "What do ribosomes build?",
        "Where does photosynthesis happen?",
    ] {
        let result = tutor.answer(question, tutor.default_top_k(), Some("student-1")).await?;
        println!("Q: {question}");
        println!("A [{:?}]: {}", result.mode, result.answer);
        for source in &result.sources {
            println!(
                "   - {} / {} (relevance {:.3})",
                source.file, source.section, source.relevance_score
            );
        }
        println!();
    }

    // -- 5. Quiz ------------------------------------------------------------
    let quiz = tutor.quiz().await?;
    for (i, question) in quiz.questions.iter().enumerate() {
        println!("Quiz {}: {}", i + 1, question.question);
        for (letter, option) in &question.options {
            println!("   {letter}) {option}");
        }
        let check = quiz.check_answer(i, "b")?;
        println!("   answered b: correct = {}", check.is_correct);
    }

    let status = tutor.status().await;
    println!(
        "\nStatus: {} chunks, {} conversations, generation available = {}",
        status.indexed_chunks, status.active_conversations, status.generation_available
    );

    Ok(())
}
