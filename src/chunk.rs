//! Recursive character text splitter.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! The splitter first tries paragraph breaks (`\n\n`), then line breaks, then
//! spaces, and finally individual characters, recursing into any piece that
//! is still too long. Adjacent pieces are merged back together up to the size
//! limit, and each new chunk starts with up to `chunk_overlap` characters of
//! trailing pieces from the previous one so context is not cut mid-thought.
//!
//! Lengths are counted in `char`s, not bytes. Separators are dropped at split
//! points and re-inserted when pieces are merged.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::models::Chunk;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split `text` into chunks with contiguous indices starting at 0.
///
/// Whitespace-only text yields no chunks. `chunk_overlap` must be smaller
/// than `chunk_size` (enforced by config validation).
pub fn chunk_text(source: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let splitter = Splitter {
        chunk_size: chunk_size.max(1),
        chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
    };

    splitter
        .split(text, &SEPARATORS)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(source, i as i64, &piece))
        .collect()
}

struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator present in the text; "" always matches.
        let (idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = &separators[(idx + 1).min(separators.len())..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in pieces {
            if piece.trim().is_empty() && !separator.is_empty() {
                continue;
            }
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }

        out.retain(|c| !c.is_empty());
        out
    }

    /// Greedily joins pieces into chunks, carrying an overlap window forward.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                // Shrink the window until it fits inside the overlap budget
                // and leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + sep_len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let removed_sep = if window.is_empty() { 0 } else { sep_len };
                    total -= char_len(front) + removed_sep;
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn make_chunk(source: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
