#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::extractor::SourceDocument;

/// A bounded, possibly overlapping segment of a source document's text —
/// the unit indexed and retrieved.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Originating file name; a non-owning association used for citations.
    pub source: String,
    /// Position of this chunk within its source document.
    pub chunk_index: usize,
}

/// Configuration for text chunking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Split a document into chunks that keep a back-reference to its source.
#[inline]
pub fn split_document(document: &SourceDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    let source = document.source_name();
    let chunks: Vec<Chunk> = split_text(&document.text, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            source: source.clone(),
            chunk_index,
        })
        .collect();

    debug!("Split {} into {} chunks", source, chunks.len());
    chunks
}

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Boundaries prefer natural breaks: paragraph breaks first, then single
/// line breaks, then sentence ends, then raw character windows as a last
/// resort. A document shorter than `chunk_size` yields exactly one chunk
/// equal to the whole (trimmed) text.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= config.chunk_size {
        return vec![text.to_string()];
    }

    let pieces = decompose(text, config.chunk_size);
    merge_pieces(pieces, config.chunk_size, config.chunk_overlap)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Break text into pieces each at most `max` characters, trying
/// progressively finer separators.
fn decompose(text: &str, max: usize) -> Vec<String> {
    if char_len(text) <= max {
        return vec![text.to_string()];
    }

    for split in [split_paragraphs, split_lines, split_sentences] {
        let parts = split(text);
        if parts.len() > 1 {
            return parts
                .into_iter()
                .flat_map(|part| decompose(&part, max))
                .collect();
        }
    }

    char_windows(text, max)
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last-resort split into fixed-size character windows.
fn char_windows(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max)
        .map(|window| window.iter().collect())
        .collect()
}

/// Greedily pack pieces into chunks of at most `size` characters. When a
/// chunk is emitted, trailing pieces totalling at most `overlap` characters
/// are retained so the next chunk overlaps the previous one.
fn merge_pieces(pieces: Vec<String>, size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(String, usize)> = VecDeque::new();
    // Characters in the window, counting one joining newline per boundary.
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(&piece);
        let sep = usize::from(!window.is_empty());

        if !window.is_empty() && total + sep + len > size {
            chunks.push(join_window(&window));
            while !window.is_empty() && (total > overlap || total + 1 + len > size) {
                if let Some((_, removed)) = window.pop_front() {
                    total -= removed;
                    if !window.is_empty() {
                        total -= 1;
                    }
                }
            }
        }

        let sep = usize::from(!window.is_empty());
        window.push_back((piece, len));
        total += sep + len;
    }

    if !window.is_empty() {
        chunks.push(join_window(&window));
    }

    chunks
}

fn join_window(window: &VecDeque<(String, usize)>) -> String {
    window
        .iter()
        .map(|(piece, _)| piece.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
