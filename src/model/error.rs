//! Error taxonomy for the model client.

use thiserror::Error;

use crate::attachment::ImageError;

/// Gemini status string for quota and rate-limit rejections.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(
        "No models found that support generateContent. Available models: {}",
        .sample.join(", ")
    )]
    NoCapableModel {
        /// Up to five names from the unfiltered catalog.
        sample: Vec<String>,
    },
    #[error("API error {status}{}: {message}", status_suffix(.status_text))]
    Api {
        status: u16,
        status_text: Option<String>,
        message: String,
    },
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("No API key configured; set API_KEY in the environment or a .env file")]
    MissingApiKey,
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Remote generation failed: {0}")]
    Remote(String),
    #[error("Failed to prepare image: {0}")]
    Image(#[from] ImageError),
    #[error("Failed to get response after retries")]
    RetriesExhausted,
}

fn status_suffix(status_text: &Option<String>) -> String {
    status_text
        .as_ref()
        .map(|s| format!(" {}", s))
        .unwrap_or_default()
}

impl ModelError {
    /// Whether the error signals a rate-limit or quota rejection.
    ///
    /// Structured status codes are checked first. Errors without one fall
    /// back to matching "429" or "quota" in the message.
    pub fn is_throttled(&self) -> bool {
        match self {
            ModelError::Api {
                status,
                status_text,
                ..
            } if *status == 429 || status_text.as_deref() == Some(RESOURCE_EXHAUSTED) => true,
            ModelError::NoCapableModel { .. }
            | ModelError::MissingApiKey
            | ModelError::Image(_)
            | ModelError::RetriesExhausted => false,
            other => {
                let text = other.to_string();
                text.contains("429") || text.to_lowercase().contains("quota")
            }
        }
    }

    /// Whether a non-throttling rejection names the system instruction field.
    pub fn rejects_system_instruction(&self) -> bool {
        if self.is_throttled() || !matches!(self, ModelError::Api { .. } | ModelError::Remote(_)) {
            return false;
        }
        let text = self.to_string().to_lowercase();
        text.contains("system_instruction")
            || text.contains("systeminstruction")
            || text.contains("system instruction")
    }
}
