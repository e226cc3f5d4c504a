//! Fixed-size character windows over plain text.
//!
//! Windows ignore word and sentence boundaries, so a chunk may start or end
//! mid-token. Positions are counted in chars, never bytes.

use crate::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        // Byte offset of the current window, always on a char boundary.
        let mut start = 0;

        while start < text.len() {
            let rest = &text[start..];
            let end = rest
                .char_indices()
                .nth(self.chunk_size)
                .map_or(text.len(), |(i, _)| start + i);
            chunks.push(text[start..end].to_string());

            match rest.char_indices().nth(self.stride()) {
                Some((i, _)) => start += i,
                None => break,
            }
        }

        chunks
    }

    /// Chunks every document in order. Document boundaries are not marked.
    pub fn split_texts<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts
            .iter()
            .flat_map(|text| self.split(text.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undo the overlap: every chunk after the first contributes only the
    /// chars past the shared prefix.
    fn reconstruct(chunker: &TextChunker, chunks: &[String]) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
                continue;
            }
            let prev_len = chunks[i - 1].chars().count();
            let shared = prev_len.saturating_sub(chunker.stride());
            out.extend(chunk.chars().skip(shared));
        }
        out
    }

    #[test]
    fn test_split_known_example() {
        let chunker = TextChunker::new(4, 1).unwrap();
        assert_eq!(
            chunker.split("abcdefghij"),
            vec!["abcd", "defg", "ghij", "j"]
        );
    }

    #[test]
    fn test_split_without_overlap() {
        let chunker = TextChunker::new(3, 0).unwrap();
        assert_eq!(chunker.split("abcdefgh"), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_split_empty_and_short() {
        let chunker = TextChunker::default();
        assert!(chunker.split("").is_empty());
        assert_eq!(chunker.split("short"), vec!["short"]);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_fails() {
        assert!(matches!(
            TextChunker::new(10, 10),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            TextChunker::new(10, 25),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            TextChunker::new(0, 0),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_multibyte_text_splits_on_chars() {
        let chunker = TextChunker::new(3, 1).unwrap();
        let chunks = chunker.split("héllo wörld");
        assert_eq!(chunks[0], "hél");
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn test_reconstructs_original_text() {
        let text = "The quick brown fox jumps over the lazy dog. Ünïcödé ✓ included.";
        for size in 1..12 {
            for overlap in 0..size {
                let chunker = TextChunker::new(size, overlap).unwrap();
                let chunks = chunker.split(text);
                assert_eq!(
                    reconstruct(&chunker, &chunks),
                    text,
                    "size={} overlap={}",
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn test_split_matches_char_windows() {
        let text = "héllo wörld, ünïcode 文字列 and emoji 🦀🦀 at the end";
        let chars: Vec<char> = text.chars().collect();

        for size in 1..10 {
            for overlap in 0..size {
                let chunker = TextChunker::new(size, overlap).unwrap();
                let expected: Vec<String> = (0..chars.len())
                    .step_by(size - overlap)
                    .map(|start| chars[start..(start + size).min(chars.len())].iter().collect())
                    .collect();
                assert_eq!(chunker.split(text), expected, "size {} overlap {}", size, overlap);
            }
        }
    }

    #[test]
    fn test_split_texts_flattens_in_order() {
        let chunker = TextChunker::new(4, 0).unwrap();
        let chunks = chunker.split_texts(&["abcdef", "", "xyz"]);
        assert_eq!(chunks, vec!["abcd", "ef", "xyz"]);
    }
}
