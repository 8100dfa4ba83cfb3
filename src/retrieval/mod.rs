//! Course-material retrieval
//!
//! Documents are chunked, embedded and stored per course. A query is embedded,
//! matched against the course's chunks by cosine similarity, and the best
//! matches are packed into a prompt section under a token budget.

mod context;
mod service;

pub use context::{
    estimate_tokens, ContextSource, RetrievedContext, CHARS_PER_TOKEN, COURSE_MATERIAL_MARKER,
    SIMILARITY_FLOOR,
};
pub use service::{IndexReport, RetrievalService};
