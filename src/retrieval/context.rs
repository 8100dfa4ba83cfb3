//! Prompt context assembly from scored chunks

use crate::storage::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Chunks at or below this cosine similarity are never returned
pub const SIMILARITY_FLOOR: f32 = 0.15;

/// Opening line of every non-empty context prompt
pub const COURSE_MATERIAL_MARKER: &str = "Relevant excerpts from the student's course materials";

/// Rough chars-per-token ratio used for budgeting
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text` (chars / 4, rounded up)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// One chunk that made it into the prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSource {
    pub chunk_id: String,
    pub similarity: f32,
}

/// Course material selected for a query, ready to splice into a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub has_context: bool,
    pub sources: Vec<ContextSource>,
    pub chunk_count: usize,
    pub formatted_prompt: String,
}

impl RetrievedContext {
    pub fn empty() -> Self {
        Self {
            has_context: false,
            sources: Vec::new(),
            chunk_count: 0,
            formatted_prompt: String::new(),
        }
    }

    /// Greedily pack the best hits into a prompt of at most `max_tokens`.
    ///
    /// Hits at or below [`SIMILARITY_FLOOR`] are dropped. Packing walks the
    /// rest in descending similarity and stops at the first chunk that would
    /// overflow the budget; the header counts against the budget too.
    pub fn assemble(mut hits: Vec<ScoredChunk>, max_tokens: usize) -> Self {
        hits.retain(|hit| hit.similarity > SIMILARITY_FLOOR);
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let budget_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
        let header = format!("{}:\n\n", COURSE_MATERIAL_MARKER);
        let mut used_chars = header.chars().count();

        let mut prompt = header;
        let mut sources = Vec::new();

        for hit in hits {
            let entry = format!(
                "[{}] ({}, relevance {:.2})\n{}\n\n",
                sources.len() + 1,
                hit.chunk.document_type,
                hit.similarity,
                hit.chunk.text
            );
            let entry_chars = entry.chars().count();
            if used_chars + entry_chars > budget_chars {
                break;
            }

            used_chars += entry_chars;
            prompt.push_str(&entry);
            sources.push(ContextSource {
                chunk_id: hit.chunk.id,
                similarity: hit.similarity,
            });
        }

        if sources.is_empty() {
            return Self::empty();
        }

        let prompt_len = prompt.trim_end().len();
        prompt.truncate(prompt_len);

        Self {
            has_context: true,
            chunk_count: sources.len(),
            sources,
            formatted_prompt: prompt,
        }
    }
}
