//! Model client module for multimodal inference.

mod backend;
mod client;
mod error;
mod gemini;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use backend::GenerativeBackend;
pub use client::{
    choose_model, ModelClient, ModelConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS,
};
pub use error::ModelError;
pub use gemini::{GeminiBackend, DEFAULT_BASE_URL};
pub use types::{inline_system_instruction, GenerateRequest, ModelDescriptor, Part, GENERATE_CONTENT};
