//! Multiple-choice quiz generation from indexed study material.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::Chunk;
use crate::error::{RagError, Result, with_timeout};
use crate::generation::GenerationProvider;
use crate::prompt::format_context;

/// Chunks of study material included in a quiz prompt.
pub const QUIZ_CONTEXT_CHUNKS: usize = 10;

const QUIZ_SYSTEM_PROMPT: &str =
    "You are a simple quiz generator that creates 5 basic multiple choice questions.";

/// One multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    /// Question text.
    pub question: String,
    /// Option letter (`"A"`..`"D"`) to option text.
    pub options: BTreeMap<String, String>,
    /// Letter of the correct option.
    pub correct_answer: String,
}

/// A generated quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    /// The questions, in order.
    pub questions: Vec<QuizQuestion>,
    /// `questions.len()`.
    pub total_questions: usize,
}

/// Result of checking one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerCheck {
    /// Whether the answer matched, ignoring case.
    pub is_correct: bool,
    /// The expected option letter.
    pub correct_answer: String,
    /// The answer as given.
    pub user_answer: String,
}

impl Quiz {
    fn new(questions: Vec<QuizQuestion>) -> Self {
        let total_questions = questions.len();
        Self { questions, total_questions }
    }

    /// A one-question quiz carrying `message`, used when the model's reply
    /// cannot be understood.
    fn placeholder(message: &str) -> Self {
        let options =
            ["A", "B", "C", "D"].into_iter().map(|k| (k.to_string(), "Error".to_string())).collect();
        Self::new(vec![QuizQuestion {
            question: message.to_string(),
            options,
            correct_answer: "A".to_string(),
        }])
    }

    /// Check `answer` against question `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `index` is out of range.
    pub fn check_answer(&self, index: usize, answer: &str) -> Result<AnswerCheck> {
        let question = self
            .questions
            .get(index)
            .ok_or_else(|| RagError::invalid_input("Invalid question index"))?;
        Ok(AnswerCheck {
            is_correct: answer.trim().eq_ignore_ascii_case(question.correct_answer.trim()),
            correct_answer: question.correct_answer.clone(),
            user_answer: answer.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct RawQuiz {
    questions: Vec<QuizQuestion>,
}

/// Extract a quiz from a model reply.
///
/// Takes the span from the first `{` to the last `}` and parses it as
/// `{"questions": [...]}`. Replies that do not contain such an object yield a
/// one-question placeholder quiz rather than an error.
pub fn parse_quiz_response(text: &str) -> Quiz {
    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Quiz::placeholder("Unable to generate quiz. Please try again."),
    };

    let value: serde_json::Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "quiz reply is not valid JSON");
            return Quiz::placeholder("Quiz generation failed. Please try again.");
        }
    };

    match serde_json::from_value::<RawQuiz>(value) {
        Ok(raw) if !raw.questions.is_empty() => Quiz::new(raw.questions),
        _ => Quiz::placeholder("Unable to generate quiz. Please try again."),
    }
}

fn quiz_request(context: &str) -> String {
    format!(
        "Based on the following study material, generate exactly 5 simple multiple choice questions.\n\n\
         Study Material:\n{context}\n\n\
         Requirements:\n\
         - Generate exactly 5 questions\n\
         - Each question should have 4 options (A, B, C, D)\n\
         - Questions should be clear and test basic understanding\n\
         - Provide correct answer for each question\n\
         - Keep questions simple and straightforward\n\n\
         Format your response as JSON:\n\
         {{\n  \"questions\": [\n    {{\n      \"question\": \"Question text here?\",\n      \
         \"options\": {{\"A\": \"Option A\", \"B\": \"Option B\", \"C\": \"Option C\", \"D\": \"Option D\"}},\n      \
         \"correct_answer\": \"A\"\n    }}\n  ]\n}}\n\n\
         Generate exactly 5 questions:"
    )
}

/// Generates quizzes with a [`GenerationProvider`].
pub struct QuizGenerator {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl QuizGenerator {
    /// Create a generator bounded by `timeout` per call.
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generate a quiz from the first [`QUIZ_CONTEXT_CHUNKS`] of `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::QuizError`] if `chunks` is empty or the generation
    /// call fails.
    pub async fn generate(&self, chunks: &[Chunk]) -> Result<Quiz> {
        if chunks.is_empty() {
            return Err(RagError::QuizError(
                "No content available for quiz generation. Please upload documents first.".into(),
            ));
        }

        let context = format_context(chunks.iter().take(QUIZ_CONTEXT_CHUNKS));
        let reply = with_timeout(
            "quiz generation",
            self.timeout,
            self.provider.complete(QUIZ_SYSTEM_PROMPT, &[], &quiz_request(&context)),
        )
        .await
        .map_err(|e| RagError::QuizError(format!("Failed to generate quiz: {e}")))?;

        let quiz = parse_quiz_response(&reply);
        info!(total_questions = quiz.total_questions, "generated quiz");
        Ok(quiz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationEntry;
    use async_trait::async_trait;

    const REPLY: &str = r#"Here is your quiz:
{
  "questions": [
    {"question": "What do enzymes lower?", "options": {"A": "Activation energy", "B": "pH", "C": "Mass", "D": "Heat"}, "correct_answer": "A"},
    {"question": "Where is DNA stored?", "options": {"A": "Cell wall", "B": "Nucleus", "C": "Ribosome", "D": "Vacuole"}, "correct_answer": "B"}
  ]
}
Good luck!"#;

    struct Canned(&'static str);

    #[async_trait]
    impl GenerationProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, system: &str, turns: &[ConversationEntry], msg: &str) -> Result<String> {
            assert_eq!(system, QUIZ_SYSTEM_PROMPT);
            assert!(turns.is_empty());
            assert!(msg.contains("Source 1 (bio.pdf, Page 1)"));
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn parses_embedded_json() {
        let quiz = parse_quiz_response(REPLY);
        assert_eq!(quiz.total_questions, 2);
        assert_eq!(quiz.questions[1].options["B"], "Nucleus");
    }

    #[test]
    fn garbage_reply_yields_placeholder() {
        let quiz = parse_quiz_response("no json here");
        assert_eq!(quiz.total_questions, 1);
        assert_eq!(quiz.questions[0].question, "Unable to generate quiz. Please try again.");

        let broken = parse_quiz_response("{ \"questions\": [ }");
        assert_eq!(broken.questions[0].question, "Quiz generation failed. Please try again.");

        let wrong_shape = parse_quiz_response(r#"{"items": []}"#);
        assert_eq!(wrong_shape.questions[0].options.len(), 4);
    }

    #[test]
    fn check_answer_ignores_case() {
        let quiz = parse_quiz_response(REPLY);
        assert!(quiz.check_answer(1, "b").unwrap().is_correct);
        let wrong = quiz.check_answer(0, "C").unwrap();
        assert!(!wrong.is_correct);
        assert_eq!(wrong.correct_answer, "A");
        assert!(matches!(quiz.check_answer(2, "A"), Err(RagError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn generate_uses_chunks_as_context() {
        let generator = QuizGenerator::new(Arc::new(Canned(REPLY)), Duration::from_secs(5));
        let chunks = vec![Chunk::new("Page 1_0", "Enzymes...", "Page 1", "bio.pdf")];
        let quiz = generator.generate(&chunks).await.unwrap();
        assert_eq!(quiz.total_questions, 2);
    }

    #[tokio::test]
    async fn generate_without_chunks_fails() {
        let generator = QuizGenerator::new(Arc::new(Canned(REPLY)), Duration::from_secs(5));
        assert!(matches!(generator.generate(&[]).await, Err(RagError::QuizError(_))));
    }
}
