//! Raw text -> retrieval-ready chunks.
//!
//! The stages are pure functions and run in order:
//! [`normalize`] -> [`segment`] -> [`ChunkBuilder::build`].

pub mod builder;
pub mod normalize;
pub mod segment;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

pub use builder::{split_sentences, ChunkBuilder};
pub use normalize::normalize;
pub use segment::{segment, DEFAULT_MIN_PARAGRAPH_LEN};

/// Character count, the unit every chunk budget is measured in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter).
pub fn tail_chars(text: &str, n: usize) -> &str {
    let total = char_len(text);
    if n >= total {
        return text;
    }
    let skip = total - n;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Paragraph indices a chunk was built from. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParagraphs {
    pub start: usize,
    pub end: usize,
    /// Set when the chunk holds only part of an oversized paragraph.
    pub partial: bool,
}

impl fmt::Display for SourceParagraphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)?;
        } else {
            write!(f, "{}-{}", self.start, self.end)?;
        }
        if self.partial {
            write!(f, " (partial)")?;
        }
        Ok(())
    }
}

/// The atomic retrieval unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_id: u64,
    pub text: String,
    pub length: usize,
    pub source_paragraphs: SourceParagraphs,
    embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(chunk_id: u64, text: String, source_paragraphs: SourceParagraphs) -> Self {
        let length = char_len(&text);
        Self {
            chunk_id,
            text,
            length,
            source_paragraphs,
            embedding: None,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Attach the embedding. A chunk gets exactly one, ever.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Result<Self> {
        if self.embedding.is_some() {
            return Err(RagError::EmbeddingAlreadyAttached(self.chunk_id));
        }
        self.embedding = Some(embedding);
        Ok(self)
    }

    pub(crate) fn into_parts(self) -> (u64, String, usize, SourceParagraphs, Option<Vec<f32>>) {
        (
            self.chunk_id,
            self.text,
            self.length,
            self.source_paragraphs,
            self.embedding,
        )
    }
}

/// Length distribution of one build run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChunkStats {
    pub count: usize,
    pub min_len: usize,
    pub max_len: usize,
    pub mean_len: f64,
}

impl ChunkStats {
    pub fn from_lengths(lengths: impl IntoIterator<Item = usize>) -> Self {
        let mut stats = ChunkStats::default();
        let mut total = 0usize;
        for len in lengths {
            if stats.count == 0 {
                stats.min_len = len;
                stats.max_len = len;
            } else {
                stats.min_len = stats.min_len.min(len);
                stats.max_len = stats.max_len.max(len);
            }
            stats.count += 1;
            total += len;
        }
        if stats.count > 0 {
            stats.mean_len = total as f64 / stats.count as f64;
        }
        stats
    }

    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self::from_lengths(chunks.iter().map(|c| c.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("高血压患者", 2), "患者");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_embedding_attaches_once() {
        let source = SourceParagraphs {
            start: 0,
            end: 0,
            partial: false,
        };
        let chunk = Chunk::new(7, "text".into(), source)
            .with_embedding(vec![1.0])
            .unwrap();
        assert_eq!(chunk.embedding(), Some(&[1.0][..]));
        assert!(matches!(
            chunk.with_embedding(vec![0.0]),
            Err(RagError::EmbeddingAlreadyAttached(7))
        ));
    }

    #[test]
    fn test_source_paragraphs_display() {
        let single = SourceParagraphs {
            start: 3,
            end: 3,
            partial: false,
        };
        let range = SourceParagraphs {
            start: 3,
            end: 5,
            partial: true,
        };
        assert_eq!(single.to_string(), "3");
        assert_eq!(range.to_string(), "3-5 (partial)");
    }

    #[test]
    fn test_stats() {
        let stats = ChunkStats::from_lengths([10, 30, 20]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_len, 10);
        assert_eq!(stats.max_len, 30);
        assert!((stats.mean_len - 20.0).abs() < f64::EPSILON);
        assert_eq!(ChunkStats::from_lengths([]), ChunkStats::default());
    }
}
