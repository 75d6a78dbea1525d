//! AI analysis of collected forensic data.
//!
//! Prompt construction, multi-task aggregation, reply extraction and the
//! analyzer that ties them to a text-generation backend.

pub mod aggregator;
pub mod analyzer;
pub mod extractor;
pub mod prompt;

pub use analyzer::ForensicAnalyzer;
pub use prompt::{Limits, SystemPrompt};
