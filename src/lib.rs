//! inkpause - real-time tutoring feedback pipeline
//!
//! Decides when a pause in a student's handwriting deserves a response, works
//! out which problem the student is stuck on, retrieves matching course
//! material to ground the response, and plays spoken feedback back one clip
//! at a time.

pub mod audio;
pub mod cli;
pub mod config;
pub mod detection;
pub mod embedding;
pub mod error;
pub mod region;
pub mod retrieval;
pub mod storage;
pub mod trigger;

pub use error::{InkpauseError, Result};
