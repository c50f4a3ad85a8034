use super::{Chunk, RawTextUnit};
use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};

/// Paragraph breaks, then line breaks, then spaces, then character boundaries.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter with a fixed character overlap between neighbouring chunks.
///
/// Every chunk is a contiguous slice of its unit. Chunk `i > 0` starts with the last
/// `chunk_overlap` characters of chunk `i - 1`, so dropping that prefix from every chunk
/// but the first and concatenating gives back the unit text exactly.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextChunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be at least 1".to_string()));
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
            ..Self::default()
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replaces the separator priority list. Leaving out `""` makes words indivisible.
    pub fn with_separators<S: Into<String>>(mut self, separators: impl IntoIterator<Item = S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Chunks each unit independently; no chunk spans two units.
    pub fn split(&self, units: &[RawTextUnit]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for unit in units {
            let pieces = self.split_text(&unit.content);
            log::debug!(
                "Split unit {:?} ({} chars) into {} chunks",
                unit.source_metadata.get("page"),
                char_len(&unit.content),
                pieces.len()
            );
            chunks.extend(pieces.into_iter().enumerate().map(|(chunk_index, content)| Chunk {
                content,
                source_metadata: unit.source_metadata.clone(),
                chunk_index,
            }));
        }
        log::info!("Produced {} chunks from {} text units", chunks.len(), units.len());
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Pieces must still fit once the previous chunk's overlap is prepended.
        let budget = self.chunk_size - self.chunk_overlap;
        let mut pieces = Vec::new();
        split_recursive(text, &self.separators, budget, &mut pieces);
        self.merge(pieces)
    }

    fn merge(&self, pieces: Vec<&str>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;
        let mut has_new_content = false;

        for piece in pieces {
            let piece_len = char_len(piece);
            if has_new_content && current_len + piece_len > self.chunk_size {
                let overlap = tail_chars(&current, self.chunk_overlap).to_string();
                current_len = char_len(&overlap);
                chunks.push(std::mem::replace(&mut current, overlap));
                has_new_content = false;
            }
            current.push_str(piece);
            current_len += piece_len;
            has_new_content = true;
        }

        if has_new_content {
            chunks.push(current);
        }
        chunks
    }
}

fn split_recursive<'a>(text: &'a str, separators: &[String], budget: usize, out: &mut Vec<&'a str>) {
    if char_len(text) <= budget {
        out.push(text);
        return;
    }

    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            split_by_chars(text, budget, out);
            return;
        }
        if text.contains(separator.as_str()) {
            for piece in text.split_inclusive(separator.as_str()) {
                if char_len(piece) <= budget {
                    out.push(piece);
                } else {
                    split_recursive(piece, &separators[i + 1..], budget, out);
                }
            }
            return;
        }
    }

    // No separator left to try: the token is emitted whole.
    out.push(text);
}

fn split_by_chars<'a>(text: &'a str, budget: usize, out: &mut Vec<&'a str>) {
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == budget {
            out.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
