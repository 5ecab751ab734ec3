//! Recursive character chunker
//!
//! Splits document text into overlapping segments, preferring the ordered
//! separator list (paragraph, then space, then punctuation) before falling
//! back to hard cuts at the size limit. Identical input and parameters
//! always yield an identical chunk sequence; re-ingestion depends on it.

use crate::config::ChunkingConfig;

pub struct Chunker {
    max_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Panics if `max_size` is zero; config validation rejects it before
    /// this point on the CLI path
    pub fn new(max_size: usize, overlap: usize, separators: Vec<String>) -> Self {
        assert!(max_size > 0, "chunk max_size must be greater than zero");
        Self {
            max_size,
            overlap,
            separators,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_size, config.overlap, config.separators.clone())
    }

    /// Split `text` into chunks of at most `max_size` characters, each
    /// overlapping the previous by up to `overlap` characters.
    ///
    /// Empty text yields zero chunks; text within the size limit yields
    /// exactly one.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.max_size {
            return vec![text.to_string()];
        }

        let pieces = self.split_pieces(text, &self.separators);
        self.merge(pieces)
    }

    /// Break text into fragments no longer than `max_size`, trying each
    /// separator in preference order and hard-cutting as a last resort
    fn split_pieces(&self, text: &str, separators: &[String]) -> Vec<String> {
        let sep_pos = separators
            .iter()
            .position(|sep| !sep.is_empty() && text.contains(sep.as_str()));

        let Some(pos) = sep_pos else {
            return hard_cut(text, self.max_size);
        };

        let sep = &separators[pos];
        let remaining = &separators[pos + 1..];

        let mut pieces = Vec::new();
        for fragment in text.split_inclusive(sep.as_str()) {
            if char_len(fragment) > self.max_size {
                pieces.extend(self.split_pieces(fragment, remaining));
            } else {
                pieces.push(fragment.to_string());
            }
        }
        pieces
    }

    /// Greedily merge fragments into chunks, seeding each new chunk with
    /// the overlap tail of the previous one. The seed is dropped when it
    /// would push the chunk past the size limit.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let piece_len = char_len(&piece);

            if current_len > 0 && current_len + piece_len > self.max_size {
                let tail = tail_chars(&current, self.overlap);
                chunks.push(std::mem::take(&mut current));

                let tail_len = char_len(&tail);
                if tail_len + piece_len <= self.max_size {
                    current = tail;
                    current_len = tail_len;
                } else {
                    current_len = 0;
                }
            }

            current.push_str(&piece);
            current_len += piece_len;
        }

        if current_len > 0 {
            chunks.push(current);
        }

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (char-boundary safe)
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    if len <= n {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

/// Fixed-size cuts at char boundaries
fn hard_cut(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_size)
        .map(|c| c.iter().collect())
        .collect()
}
