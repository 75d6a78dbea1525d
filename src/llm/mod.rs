//! Text-generation backends.
//!
//! The analysis layer only sees the [`TextGenerator`] trait; the
//! production backend is Google's Gemini REST API.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a text-generation backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GOOGLE_API_KEY is required. Set it as an environment variable or pass --api-key.")]
    MissingApiKey,

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to the model API at {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Model API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse model response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Model returned no text{}", finish_suffix(.0))]
    EmptyResponse(Option<String>),
}

fn finish_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" (finish reason: {})", r))
        .unwrap_or_default()
}

/// Sends a prompt and returns the model's free-form reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Name of the model, for logs and report headers.
    fn model_name(&self) -> &str;
}
