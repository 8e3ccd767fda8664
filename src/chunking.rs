//! Chunking utilities for splitting documents into fixed-size windows.
//!
//! Every document is cut into consecutive, non-overlapping windows of at
//! most `chunk_size` characters. The final window may be shorter. No window
//! ever spans two documents, and the order of windows follows the order of
//! the text, so concatenating a document's chunks reproduces it exactly.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Validated chunking configuration.
///
/// # Examples
///
/// ```
/// use docvec::chunking::{ChunkingConfig, DEFAULT_CHUNK_SIZE};
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.chunk_size(), DEFAULT_CHUNK_SIZE);
/// assert!(ChunkingConfig::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config(
                "chunk size must be a positive integer".to_string(),
            ));
        }
        Ok(Self { chunk_size })
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A source document read from the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Identifier of the document, its path relative to the corpus root.
    pub source_id: String,
    pub text: String,
}

/// A contiguous substring of one source document.
///
/// Chunks are immutable once produced; `position` is the chunk's index in
/// the corpus-wide ordered sequence and doubles as the row of its vector
/// in the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub position: usize,
}

/// Split text into consecutive windows of at most `chunk_size` characters.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
/// An empty text yields no windows. Whitespace-only windows are kept; it is
/// up to the caller to decide what to do with them.
///
/// # Examples
///
/// ```
/// use docvec::chunking::{chunk_text, ChunkingConfig};
///
/// let config = ChunkingConfig::new(4).unwrap();
/// assert_eq!(chunk_text("abcdefghij", &config), vec!["abcd", "efgh", "ij"]);
/// assert!(chunk_text("", &config).is_empty());
/// ```
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Vec<&'a str> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every window boundary, plus the end of the text.
    let mut boundaries: Vec<usize> = text
        .char_indices()
        .step_by(config.chunk_size)
        .map(|(byte_idx, _)| byte_idx)
        .collect();
    boundaries.push(text.len());

    boundaries
        .windows(2)
        .map(|pair| &text[pair[0]..pair[1]])
        .collect()
}

/// Chunk a sequence of documents into one corpus-wide ordered sequence.
///
/// Documents are processed in the given order and their chunks
/// concatenated, with positions assigned from zero.
pub fn chunk_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        for window in chunk_text(&doc.text, config) {
            chunks.push(Chunk {
                text: window.to_string(),
                source_id: doc.source_id.clone(),
                position: chunks.len(),
            });
        }
    }
    chunks
}
