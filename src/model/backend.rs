//! The seam between the model client and a remote capability provider.

use std::future::Future;

use super::error::ModelError;
use super::types::{GenerateRequest, ModelDescriptor};

/// A remote provider that can list its models and generate content.
///
/// [`GeminiBackend`](super::GeminiBackend) talks to the Gemini REST API;
/// tests substitute in-memory implementations.
pub trait GenerativeBackend: Send + Sync {
    /// List every model in the catalog, in catalog order.
    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelDescriptor>, ModelError>> + Send;

    /// Run one generation call and return the response text.
    fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, ModelError>> + Send;

    /// Whether `model` accepts a dedicated system instruction field.
    fn supports_system_instruction(&self, model: &ModelDescriptor) -> bool {
        model.supports_system_instruction()
    }
}
