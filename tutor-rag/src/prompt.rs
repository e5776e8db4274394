//! Prompt text and context formatting shared by answering and quizzes.

use crate::document::Chunk;

/// System instruction for answer generation.
pub const TUTOR_SYSTEM_PROMPT: &str = "You are a helpful AI tutor that provides clear, \
     comprehensive answers based on provided study materials.";

/// Answer returned when nothing relevant is indexed.
pub const INSUFFICIENT_INFORMATION: &str = "I don't have enough information to answer that \
     question. Please upload some study materials first.";

/// Render chunks as numbered, delimited sources:
/// `Source {i} ({file}, {section}): {text}`, separated by blank lines.
pub fn format_context<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!("Source {} ({}, {}): {}", i + 1, chunk.source_file, chunk.section, chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The user turn sent to the generator: retrieved context, then the question.
pub fn answer_request(query: &str, context: &str) -> String {
    format!(
        "You are a helpful AI tutor. Based on the following information from study materials, \
         provide a clear and comprehensive answer to the student's question.\n\n\
         Information from study materials:\n{context}\n\n\
         Student Question: {query}\n\n\
         Please provide a concise answer that:\n\
         1. Synthesizes the information from the provided sources\n\
         2. Addresses the question directly and comprehensively\n\
         3. Organizes the response in a logical, easy-to-understand format\n\
         4. Focuses on the information available without asking for additional details\n\n\
         Answer:"
    )
}

/// An answer assembled verbatim from the sources, used when generation is
/// unavailable or fails.
pub fn extractive_answer<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    let mut lines = vec!["Based on the information from your documents, here's what I found:\n".to_string()];
    let mut any = false;
    for (i, chunk) in chunks.into_iter().enumerate() {
        any = true;
        lines.push(format!("{}. From {} ({}):", i + 1, chunk.source_file, chunk.section));
        lines.push(format!("   {}", chunk.text));
        lines.push(String::new());
    }
    if !any {
        return INSUFFICIENT_INFORMATION.to_string();
    }
    lines.push("This is a basic answer based on the retrieved content.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("Page 1_0", "Cells are units of life.", "Page 1", "bio.pdf"),
            Chunk::new("Slide 2_0", "DNA stores information.", "Slide 2", "deck.pptx"),
        ]
    }

    #[test]
    fn context_has_numbered_delimiters() {
        let context = format_context(&chunks());
        assert_eq!(
            context,
            "Source 1 (bio.pdf, Page 1): Cells are units of life.\n\n\
             Source 2 (deck.pptx, Slide 2): DNA stores information."
        );
    }

    #[test]
    fn request_ends_with_the_literal_query() {
        let request = answer_request("What is DNA?", "ctx");
        assert!(request.contains("Information from study materials:\nctx"));
        assert!(request.contains("Student Question: What is DNA?"));
        assert!(request.ends_with("Answer:"));
    }

    #[test]
    fn extractive_answer_lists_every_source() {
        let answer = extractive_answer(&chunks());
        assert!(answer.starts_with("Based on the information"));
        assert!(answer.contains("1. From bio.pdf (Page 1):\n   Cells are units of life."));
        assert!(answer.contains("2. From deck.pptx (Slide 2):"));
    }

    #[test]
    fn extractive_answer_without_sources_is_the_insufficient_message() {
        assert_eq!(extractive_answer(&[]), INSUFFICIENT_INFORMATION);
    }
}
