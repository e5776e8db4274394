//! Text normalization and overlapping token windows.
//!
//! This module provides the [`Chunker`] trait and [`WindowChunker`], which
//! splits a normalized unit of text into windows of whitespace tokens that
//! share a fixed number of tokens with their neighbours.

use crate::config::RagConfig;
use crate::document::{Chunk, SourceUnit};
use crate::error::{RagError, Result};

/// A strategy for splitting one extracted unit into chunks.
///
/// Implementations are pure: the same input always yields the same chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` from `section` of `source` into chunks.
    ///
    /// Returns an empty `Vec` if the text is empty after normalization.
    fn split(&self, text: &str, section: &str, source: &str) -> Vec<Chunk>;

    /// Split a [`SourceUnit`].
    fn split_unit(&self, unit: &SourceUnit) -> Vec<Chunk> {
        self.split(&unit.text, &unit.section, &unit.source)
    }
}

/// Normalize extracted text.
///
/// Drops every character that is not a word character (alphanumeric or `_`),
/// whitespace, or one of `. , ! ? ; : - ( ) [ ]`, then collapses whitespace
/// runs to single spaces and trims the ends. Applying it twice is the same as
/// applying it once.
pub fn normalize_text(text: &str) -> String {
    let kept: String = text.chars().filter(|c| is_allowed(*c)).collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '-' | '(' | ')' | '[' | ']')
}

/// Final path component of a source label, or the label itself when it has none.
fn file_name(source: &str) -> &str {
    match source.rsplit(['/', '\\']).next() {
        Some(name) if !name.is_empty() => name,
        _ => source,
    }
}

/// Splits text into windows of `window_size` tokens, each sharing `overlap`
/// tokens with the previous one.
///
/// Chunk IDs are `{section}_{n}` with `n` counting windows from zero.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::{Chunker, WindowChunker};
///
/// let chunker = WindowChunker::new(500, 50)?;
/// let chunks = chunker.split(&page_text, "Page 1", "uploads/biology.pdf");
/// assert_eq!(chunks[0].chunk_id, "Page 1_0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowChunker {
    window_size: usize,
    overlap: usize,
}

impl WindowChunker {
    /// Create a new `WindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `window_size` is zero or
    /// `overlap >= window_size`, since the window would never advance.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(RagError::ConfigError("window_size must be greater than zero".into()));
        }
        if overlap >= window_size {
            return Err(RagError::ConfigError(format!(
                "overlap ({overlap}) must be less than window_size ({window_size})"
            )));
        }
        Ok(Self { window_size, overlap })
    }

    /// Create a chunker from the window settings of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.window_size, config.overlap)
    }

    /// Window size in tokens.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Overlap in tokens.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.window_size - self.overlap
    }
}

impl Default for WindowChunker {
    fn default() -> Self {
        Self { window_size: 500, overlap: 50 }
    }
}

impl Chunker for WindowChunker {
    fn split(&self, text: &str, section: &str, source: &str) -> Vec<Chunk> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let source_file = file_name(source);
        let tokens: Vec<&str> = normalized.split(' ').collect();

        if tokens.len() <= self.window_size {
            return vec![Chunk::new(format!("{section}_0"), normalized, section, source_file)];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;

        while start < tokens.len() {
            let end = (start + self.window_size).min(tokens.len());
            chunks.push(Chunk::new(
                format!("{section}_{chunk_index}"),
                tokens[start..end].join(" "),
                section,
                source_file,
            ));
            chunk_index += 1;
            start += self.step();
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn normalize_strips_symbols_and_collapses_whitespace() {
        let text = "  Cells  divide\n\n(mitosis) — see §4 @home;\tdone!  ";
        assert_eq!(normalize_text(text), "Cells divide (mitosis) see 4 home; done!");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_text("a @ b\r\n c*d [e]");
        assert_eq!(normalize_text(&once), once);
        assert_eq!(once, "a b cd [e]");
    }

    #[test]
    fn rejects_non_advancing_windows() {
        assert!(matches!(WindowChunker::new(10, 10), Err(RagError::ConfigError(_))));
        assert!(matches!(WindowChunker::new(10, 11), Err(RagError::ConfigError(_))));
        assert!(matches!(WindowChunker::new(0, 0), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = WindowChunker::default();
        assert!(chunker.split("", "Page 1", "doc.pdf").is_empty());
        assert!(chunker.split(" \n\t ", "Page 1", "doc.pdf").is_empty());
        assert!(chunker.split("@@ ## $$", "Page 1", "doc.pdf").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = WindowChunker::new(10, 2).unwrap();
        let chunks = chunker.split(&words(10), "Slide 4", "uploads/deck.pptx");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "Slide 4_0");
        assert_eq!(chunks[0].word_count, 10);
        assert_eq!(chunks[0].source_file, "deck.pptx");
        assert_eq!(chunks[0].section, "Slide 4");
    }

    #[test]
    fn long_text_advances_by_window_minus_overlap() {
        let chunker = WindowChunker::new(10, 3).unwrap();
        let chunks = chunker.split(&words(25), "Page 1", "doc.pdf");
        // starts at 0, 7, 14, 21
        assert_eq!(chunks.len(), 4);
        let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, ["Page 1_0", "Page 1_1", "Page 1_2", "Page 1_3"]);
        assert!(chunks[1].text.starts_with("w7 w8 w9"));
        assert_eq!(chunks[3].text, "w21 w22 w23 w24");
        assert_eq!(chunks[3].word_count, 4);
    }

    #[test]
    fn trailing_window_may_be_fully_overlapped() {
        // 11 tokens, window 10, overlap 2: starts at 0 and 8.
        let chunker = WindowChunker::new(10, 2).unwrap();
        let chunks = chunker.split(&words(11), "Page 1", "doc.pdf");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "w8 w9 w10");
    }

    #[test]
    fn file_name_handles_separators() {
        assert_eq!(file_name("uploads/notes.pdf"), "notes.pdf");
        assert_eq!(file_name(r"C:\uploads\notes.pdf"), "notes.pdf");
        assert_eq!(file_name("notes.pdf"), "notes.pdf");
        assert_eq!(file_name("dir/"), "dir/");
    }
}
