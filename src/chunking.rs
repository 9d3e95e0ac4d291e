//! Chunking utilities for splitting documents into overlapping segments.
//!
//! Each document is cut into fixed-size character windows that slide
//! forward by `chunk_size - overlap`, so adjacent chunks share `overlap`
//! characters of context. Every chunk is embedded and stored separately.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Chunking parameters for the ingestion pipeline.
///
/// `overlap` must be strictly smaller than `chunk_size`; [`ChunkingConfig::validate`]
/// rejects anything else so the window loop is guaranteed to advance.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`]. `index` is the position in the emitted
/// sequence: windows whose trimmed content is empty are dropped without
/// leaving gaps in the numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based index within the emitted sequence.
    pub index: usize,
    /// Byte offset where this chunk starts in the original document.
    pub start_offset: usize,
}

/// Split text into overlapping character windows.
///
/// Windows cover `[start, start + chunk_size)` in characters and the start
/// advances by `chunk_size - overlap` until the end of the text, so the
/// emitted chunks cover the whole input. Fully-whitespace windows are
/// dropped. The output is deterministic for a given input and parameters.
///
/// Handles UTF-8 multi-byte characters correctly; windows are measured in
/// characters and sliced on character boundaries.
///
/// # Examples
///
/// ```
/// use carpet::chunking::chunk_text;
///
/// let chunks = chunk_text("Hello, world!", 500, 50);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Hello, world!");
///
/// let text = "word ".repeat(300);
/// let chunks = chunk_text(&text, 500, 50);
/// assert!(chunks.len() >= 2);
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let char_count = text.chars().count();
    if char_count == 0 {
        return Vec::new();
    }

    if char_count <= chunk_size {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Chunk {
            text: text.to_string(),
            index: 0,
            start_offset: 0,
        }];
    }

    // Map of char index -> byte index for O(1) boundary lookups.
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    // The step is clamped to >= 1 so no parameter combination can stall the
    // loop, even if a caller bypasses ChunkingConfig::validate.
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start_char = 0;
    let mut index = 0;

    while start_char < char_count {
        let end_char = (start_char + chunk_size).min(char_count);
        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[end_char];

        let window = &text[start_byte..end_byte];
        if !window.trim().is_empty() {
            chunks.push(Chunk {
                text: window.to_string(),
                index,
                start_offset: start_byte,
            });
            index += 1;
        }

        start_char += step;
    }

    chunks
}
