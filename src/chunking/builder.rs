use tracing::debug;

use super::{char_len, tail_chars, Chunk, SourceParagraphs};
use crate::error::{RagError, Result};

/// Split text after `.`, `!` or `?` followed by whitespace. The punctuation
/// stays with its sentence and the whitespace run is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_idx, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }
        let end = idx + c.len_utf8();
        if end > start {
            sentences.push(&text[start..end]);
        }
        let mut resume = next_idx;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            resume = j + w.len_utf8();
            chars.next();
        }
        start = resume;
    }

    let rest = text[start..].trim_end();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Running buffer of the chunk being accumulated.
struct Buffer {
    text: String,
    chars: usize,
    source: SourceParagraphs,
}

impl Buffer {
    fn start(piece: &str, paragraph: usize, partial: bool) -> Self {
        Self {
            text: piece.to_string(),
            chars: char_len(piece),
            source: SourceParagraphs {
                start: paragraph,
                end: paragraph,
                partial,
            },
        }
    }

    /// New buffer that opens with the tail of the previous chunk.
    fn seeded(tail: &str, piece: &str, from: usize, paragraph: usize) -> Self {
        let mut buffer = Self::start(tail, from, false);
        buffer.push(piece, char_len(piece), paragraph);
        buffer
    }

    fn fits(&self, len: usize, max_size: usize) -> bool {
        self.chars + 1 + len <= max_size
    }

    fn push(&mut self, piece: &str, len: usize, paragraph: usize) {
        self.text.push(' ');
        self.text.push_str(piece);
        self.chars += 1 + len;
        self.source.end = paragraph;
    }
}

struct Emitter {
    next_id: u64,
    chunks: Vec<Chunk>,
}

impl Emitter {
    fn emit(&mut self, buffer: Buffer) {
        let chunk = Chunk::new(self.next_id, buffer.text, buffer.source);
        debug_assert_eq!(chunk.length, buffer.chars);
        self.next_id += 1;
        self.chunks.push(chunk);
    }
}

/// Greedy paragraph packer with character overlap between neighbours.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBuilder {
    max_size: usize,
    overlap: usize,
    first_id: u64,
}

impl Default for ChunkBuilder {
    fn default() -> Self {
        Self {
            max_size: 500,
            overlap: 50,
            first_id: 0,
        }
    }
}

impl ChunkBuilder {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(RagError::Config("max chunk size must be positive".into()));
        }
        if overlap >= max_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than max chunk size ({})",
                overlap, max_size
            )));
        }
        Ok(Self {
            max_size,
            overlap,
            first_id: 0,
        })
    }

    /// Continue numbering from `first_id`, so ids stay unique across
    /// documents of one build.
    pub fn starting_at(mut self, first_id: u64) -> Self {
        self.first_id = first_id;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Pack paragraphs into chunks in a single forward pass.
    ///
    /// A paragraph longer than `max_size` is split at sentence boundaries; a
    /// lone sentence longer than `max_size` is kept whole as an oversized
    /// chunk. When a paragraph does not fit, the buffer is flushed and the
    /// next one opens with the last `overlap` characters of the flushed
    /// chunk, shortened to what still fits within `max_size`.
    pub fn build<S: AsRef<str>>(&self, paragraphs: &[S]) -> Vec<Chunk> {
        let mut out = Emitter {
            next_id: self.first_id,
            chunks: Vec::new(),
        };
        let mut buffer: Option<Buffer> = None;

        for (i, paragraph) in paragraphs.iter().enumerate() {
            let paragraph = paragraph.as_ref();
            let para_len = char_len(paragraph);
            if para_len == 0 {
                continue;
            }

            if para_len > self.max_size {
                if let Some(buf) = buffer.take() {
                    out.emit(buf);
                }
                buffer = self.pack_sentences(paragraph, i, &mut out);
                continue;
            }

            buffer = Some(match buffer.take() {
                None => Buffer::start(paragraph, i, false),
                Some(mut buf) if buf.fits(para_len, self.max_size) => {
                    buf.push(paragraph, para_len, i);
                    buf
                }
                Some(buf) => {
                    let seed = self.overlap_seed(&buf.text, para_len).map(str::to_string);
                    let from = buf.source.end;
                    out.emit(buf);
                    match seed {
                        Some(tail) => Buffer::seeded(&tail, paragraph, from, i),
                        None => Buffer::start(paragraph, i, false),
                    }
                }
            });
        }

        if let Some(buf) = buffer {
            out.emit(buf);
        }

        debug!(
            paragraphs = paragraphs.len(),
            chunks = out.chunks.len(),
            "built chunks"
        );
        out.chunks
    }

    /// Sentence-level fallback for one oversized paragraph. Returns the
    /// trailing partial buffer, which becomes the running buffer.
    fn pack_sentences(&self, paragraph: &str, index: usize, out: &mut Emitter) -> Option<Buffer> {
        let mut sub: Option<Buffer> = None;
        for sentence in split_sentences(paragraph) {
            let len = char_len(sentence);
            sub = Some(match sub.take() {
                Some(mut buf) if buf.fits(len, self.max_size) => {
                    buf.push(sentence, len, index);
                    buf
                }
                previous => {
                    if let Some(buf) = previous {
                        out.emit(buf);
                    }
                    Buffer::start(sentence, index, true)
                }
            });
        }
        sub
    }

    /// Tail of the flushed chunk that opens the next buffer: `overlap`
    /// characters, or as many as still fit in front of the next paragraph.
    fn overlap_seed<'a>(&self, flushed: &'a str, next_len: usize) -> Option<&'a str> {
        let room = self.max_size.saturating_sub(next_len + 1);
        let take = self.overlap.min(room);
        (take > 0).then(|| tail_chars(flushed, take))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("P{:02} {}", i, "clinical finding noted ".repeat(5).trim_end()))
            .collect()
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Rest. Drink fluids!  Call a doctor? ok"),
            vec!["Rest.", "Drink fluids!", "Call a doctor?", "ok"]
        );
        assert_eq!(split_sentences("No terminal whitespace."), vec!["No terminal whitespace."]);
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_max() {
        assert!(ChunkBuilder::new(100, 100).is_err());
        assert!(ChunkBuilder::new(0, 0).is_err());
        assert!(ChunkBuilder::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunks = ChunkBuilder::default().build::<String>(&[]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_paragraphs_merge_into_one_chunk() {
        let chunks = ChunkBuilder::new(200, 20).unwrap().build(&["alpha beta", "gamma delta"]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta gamma delta");
        assert_eq!(chunks[0].length, 22);
        assert_eq!(chunks[0].source_paragraphs.start, 0);
        assert_eq!(chunks[0].source_paragraphs.end, 1);
    }

    #[test]
    fn test_overlap_prefix_between_flushed_chunks() {
        let overlap = 40;
        let builder = ChunkBuilder::new(300, overlap).unwrap();
        let chunks = builder.build(&paragraphs(12));
        assert!(chunks.len() >= 3);
        for pair in chunks.windows(2) {
            let expected = tail_chars(&pair[0].text, overlap);
            assert_eq!(char_len(expected), overlap.min(pair[0].length));
            assert!(
                pair[1].text.starts_with(expected),
                "chunk {} does not start with the tail of chunk {}",
                pair[1].chunk_id,
                pair[0].chunk_id
            );
        }
    }

    #[test]
    fn test_no_overlap_when_zero() {
        let chunks = ChunkBuilder::new(300, 0).unwrap().build(&paragraphs(12));
        for pair in chunks.windows(2) {
            assert!(pair[1].text.starts_with("P"));
        }
    }

    #[test]
    fn test_overlap_shrinks_to_fit() {
        let a = "a".repeat(60);
        let b = "b".repeat(90);
        let chunks = ChunkBuilder::new(100, 20).unwrap().build(&[a.clone(), b.clone()]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, a);
        // 20 + 1 + 90 > 100, so only 9 characters of overlap fit
        assert_eq!(chunks[1].text, format!("{} {}", "a".repeat(9), b));
        assert_eq!(chunks[1].length, 100);
    }

    #[test]
    fn test_overlap_dropped_when_no_room() {
        let a = "a".repeat(60);
        let b = "b".repeat(99);
        let chunks = ChunkBuilder::new(100, 20).unwrap().build(&[a, b.clone()]);
        assert_eq!(chunks[1].text, b);
    }

    #[test]
    fn test_long_paragraph_keeps_partial_overlap() {
        let first = "x".repeat(200);
        let second = "y".repeat(530);
        let chunks = ChunkBuilder::new(600, 80).unwrap().build(&[first.clone(), second.clone()]);
        assert_eq!(chunks.len(), 2);
        // 600 - 1 - 530 = 69 characters of the previous chunk survive
        assert!(chunks[1].text.starts_with(&first[first.len() - 69..]));
        assert!(chunks[1].text.ends_with(&second));
        assert_eq!(chunks[1].length, 600);
    }

    #[test]
    fn test_sentence_scenario_thousand_chars() {
        let paragraph = vec!["A."; 334].join(" ");
        assert!(char_len(&paragraph) >= 1000);
        let chunks = ChunkBuilder::new(500, 50).unwrap().build(&[paragraph]);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.length <= 500);
            assert!(!chunk.text.is_empty());
            assert!(chunk.source_paragraphs.partial);
        }
    }

    #[test]
    fn test_unsplittable_sentence_is_kept_whole() {
        let giant = format!("{}.", "x".repeat(700));
        let text = format!("Short lead sentence. {} Tail sentence here.", giant);
        let chunks = ChunkBuilder::new(500, 50).unwrap().build(&[text]);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Short lead sentence.");
        assert_eq!(chunks[1].text, giant);
        assert!(chunks[1].length > 500);
        assert_eq!(chunks[2].text, "Tail sentence here.");
    }

    #[test]
    fn test_sizes_and_ids_over_mixed_input() {
        let long = "Symptoms include fatigue and thirst. ".repeat(30);
        let mut input = paragraphs(5);
        input.insert(2, long.trim().to_string());
        input.push("Final remark about follow up visits and dosage.".into());

        let chunks = ChunkBuilder::new(250, 30).unwrap().starting_at(10).build(&input);
        for (offset, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, 10 + offset as u64);
            assert!(!chunk.text.is_empty());
            assert!(chunk.length <= 250);
            assert_eq!(chunk.length, char_len(&chunk.text));
        }
    }

    #[test]
    fn test_leftover_sentences_become_running_buffer() {
        let long = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let chunks = ChunkBuilder::new(45, 0).unwrap().build(&[long, "tail"]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "One two three four. Five six seven eight.");
        assert_eq!(chunks[1].text, "Nine ten eleven twelve. tail");
        assert_eq!(chunks[1].source_paragraphs.start, 0);
        assert_eq!(chunks[1].source_paragraphs.end, 1);
        assert!(chunks[1].source_paragraphs.partial);
    }

    #[test]
    fn test_multibyte_overlap() {
        let paras: Vec<String> = (0..6).map(|i| format!("{}{}", i, "高血压需要长期管理".repeat(4))).collect();
        let chunks = ChunkBuilder::new(80, 10).unwrap().build(&paras);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].text.starts_with(tail_chars(&pair[0].text, 10)));
        }
    }
}
