//! Recursive character text splitter
//!
//! Splits on the coarsest separator present in the text, recurses into
//! pieces that are still too long with the finer separators, then merges
//! neighbouring pieces back up to `chunk_size` characters with up to
//! `chunk_overlap` characters repeated between consecutive chunks.

use std::collections::VecDeque;

use tracing::warn;

/// Paragraph, line, sentence, word, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits `text` before every occurrence of `separator`, keeping the
/// separator at the start of the following piece. An empty separator
/// yields single characters. Empty pieces are dropped.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

impl RecursiveSplitter {
    /// Splitter with [`DEFAULT_SEPARATORS`]. Lengths are counted in chars.
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split `text` into trimmed, non-empty chunks.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Coarsest separator present in the text; "" always matches
        let mut separator = separators.last().map_or("", String::as_str);
        let mut finer: &[String] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = "";
                break;
            }
            if text.contains(s.as_str()) {
                separator = s.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }

            if !short.is_empty() {
                chunks.extend(self.merge(&short));
                short.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge(&short));
        }

        chunks
    }

    /// Greedily concatenates pieces into chunks of at most `chunk_size`
    /// characters, starting each new chunk with the trailing pieces of the
    /// previous one that fit in `chunk_overlap`.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {total}, which is longer than the specified {}",
                        self.chunk_size
                    );
                }
                if let Some(chunk) = join(&window) {
                    chunks.push(chunk);
                }

                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
