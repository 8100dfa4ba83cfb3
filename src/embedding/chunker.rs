//! Sliding-window text chunking

use crate::config::RetrievalConfig;
use regex::Regex;
use std::sync::OnceLock;

fn whitespace_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

/// Collapse every whitespace run (PDF line breaks, tabs) into a single space
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_runs().replace_all(text.trim(), " ").into_owned()
}

/// Splits document text into overlapping windows.
///
/// Every emitted chunk is at least `min_chunk_size` chars long. Windows end on
/// a word boundary when one is available past the minimum size, and a short
/// trailing window is folded into its predecessor.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    min_chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize, min_chunk_size: usize) -> Self {
        let min_chunk_size = min_chunk_size.max(1);
        let chunk_size = chunk_size.max(min_chunk_size);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            min_chunk_size,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_size)
    }

    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    /// Split `text` into chunks, in document order
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let chars: Vec<char> = normalized.chars().collect();
        let total = chars.len();

        if total < self.min_chunk_size {
            return Vec::new();
        }

        let mut windows: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                // One spare char so a leading space can be trimmed off
                let earliest = start + self.min_chunk_size + 1;
                if let Some(space) = (earliest..end).rev().find(|&i| chars[i] == ' ') {
                    end = space;
                }
            }

            windows.push((start, end));

            if end >= total {
                break;
            }

            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        if windows.len() > 1 {
            let (last_start, last_end) = windows[windows.len() - 1];
            if last_end - last_start < self.min_chunk_size + 1 {
                windows.pop();
                if let Some(previous) = windows.last_mut() {
                    previous.1 = last_end;
                }
            }
        }

        windows
            .into_iter()
            .map(|(s, e)| chars[s..e].iter().collect::<String>().trim().to_string())
            .filter(|chunk| chunk.chars().count() >= self.min_chunk_size)
            .collect()
    }
}
