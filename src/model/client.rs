//! Model client: picks a capable model and asks it for replies.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::backend::GenerativeBackend;
use super::error::ModelError;
use super::gemini::{GeminiBackend, DEFAULT_BASE_URL};
use super::types::{GenerateRequest, ModelDescriptor};
use crate::attachment::{EncodedImage, DEFAULT_MAX_DIMENSION};
use crate::chat::ChatMessage;

/// Default number of generation attempts per reply, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay after a throttled attempt, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 45;

/// Number of catalog names reported when no model is usable.
const CATALOG_SAMPLE_SIZE: usize = 5;

/// Configuration for the model client.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    /// API credential. `None` makes every remote call fail with [`ModelError::MissingApiKey`].
    pub api_key: Option<String>,
    /// Model to use when the catalog offers it, bypassing the flash/pro preference.
    pub preferred_model: Option<String>,
    /// Generation attempts per reply, including the first.
    pub max_attempts: u32,
    /// Delay after a throttled attempt in seconds.
    pub retry_delay_secs: u64,
    /// Longest side of an image sent to the model, in pixels.
    pub max_image_dim: u32,
    /// Send earlier turns along with the current prompt.
    pub include_history: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            preferred_model: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_image_dim: DEFAULT_MAX_DIMENSION,
            include_history: false,
        }
    }
}

impl ModelConfig {
    /// Create a new ModelConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new ModelConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Prefer a specific model when the catalog offers it.
    pub fn with_preferred_model(mut self, model: impl Into<String>) -> Self {
        self.preferred_model = Some(model.into());
        self
    }

    /// Set the number of generation attempts per reply.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay after a throttled attempt in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    pub fn with_max_image_dim(mut self, max_image_dim: u32) -> Self {
        self.max_image_dim = max_image_dim;
        self
    }

    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }
}

/// Pick the model to chat with from a catalog.
///
/// Only models declaring `generateContent` qualify. Among those, a configured
/// preference wins if present; otherwise the first "flash" model, then the
/// first "pro" model, then the first capable model in catalog order.
pub fn choose_model<'a>(
    catalog: &'a [ModelDescriptor],
    preferred: Option<&str>,
) -> Result<&'a ModelDescriptor, ModelError> {
    let capable: Vec<&ModelDescriptor> = catalog.iter().filter(|m| m.is_capable()).collect();

    let Some(&first) = capable.first() else {
        return Err(ModelError::NoCapableModel {
            sample: catalog
                .iter()
                .take(CATALOG_SAMPLE_SIZE)
                .map(|m| m.name.clone())
                .collect(),
        });
    };

    if let Some(preferred) = preferred.filter(|p| !p.is_empty()) {
        if let Some(&model) = capable
            .iter()
            .find(|m| m.name == preferred || m.short_name() == preferred)
        {
            return Ok(model);
        }
        warn!(preferred, "Preferred model is not available, falling back");
    }

    let by_keyword = |keyword: &str| {
        capable
            .iter()
            .copied()
            .find(|m| m.name.to_lowercase().contains(keyword))
    };

    Ok(by_keyword("flash").or_else(|| by_keyword("pro")).unwrap_or(first))
}

/// Client for asking a hosted multimodal model about an image.
pub struct ModelClient<B = GeminiBackend> {
    config: ModelConfig,
    backend: B,
}

impl ModelClient<GeminiBackend> {
    /// Create a new ModelClient talking to the Gemini API.
    pub fn new(config: ModelConfig) -> Self {
        let backend = GeminiBackend::new(config.base_url.clone(), config.api_key.clone());
        Self { config, backend }
    }

    /// Create a new ModelClient with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl<B: GenerativeBackend> ModelClient<B> {
    /// Create a client over any backend.
    pub fn with_backend(config: ModelConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return the session's model, listing the catalog only if none is cached yet.
    pub async fn select_model<'a>(
        &self,
        cache: &'a mut Option<ModelDescriptor>,
    ) -> Result<&'a ModelDescriptor, ModelError> {
        let model = match cache.take() {
            Some(model) => model,
            None => {
                let catalog = self.backend.list_models().await?;
                let chosen = choose_model(&catalog, self.config.preferred_model.as_deref())?;
                info!(model = %chosen.short_name(), "Selected model");
                chosen.clone()
            }
        };

        Ok(&*cache.insert(model))
    }

    /// Build the request for one turn.
    ///
    /// The instruction goes into its own field when the backend reports the
    /// model supports it, and is inlined into the prompt otherwise.
    pub fn build_request(
        &self,
        model: &ModelDescriptor,
        history: &[ChatMessage],
        prompt: &str,
        image: Option<&EncodedImage>,
        system_instruction: Option<&str>,
    ) -> GenerateRequest {
        let mut request = GenerateRequest::new(prompt, image);
        if self.config.include_history {
            request = request.with_history(history.to_vec());
        }

        match system_instruction.filter(|s| !s.trim().is_empty()) {
            Some(instruction) => {
                let request = request.with_system_instruction(instruction);
                if self.backend.supports_system_instruction(model) {
                    request
                } else {
                    request.into_inline_instruction()
                }
            }
            None => request,
        }
    }

    /// Produce the assistant reply for `prompt`.
    ///
    /// Every throttled attempt is followed by a fixed delay, up to
    /// `max_attempts` in total; any other failure is returned at once. A
    /// rejected system instruction field is inlined into the prompt and
    /// resent within the same attempt budget. The conversation is not
    /// modified.
    pub async fn respond(
        &self,
        model: &ModelDescriptor,
        history: &[ChatMessage],
        prompt: &str,
        image: Option<&EncodedImage>,
        system_instruction: Option<&str>,
    ) -> Result<String, ModelError> {
        let mut request = self.build_request(model, history, prompt, image, system_instruction);

        let max_attempts = self.config.max_attempts;
        let delay = Duration::from_secs(self.config.retry_delay_secs);
        let mut last_error: Option<ModelError> = None;

        for attempt in 1..=max_attempts {
            match self.backend.generate(model, &request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_throttled() => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay_secs = delay.as_secs(),
                        "Throttled by the model API, waiting: {}",
                        e
                    );
                    sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) if request.system_instruction.is_some() && e.rejects_system_instruction() => {
                    warn!(
                        model = %model.short_name(),
                        attempt,
                        "Model rejected the system instruction field, inlining it: {}", e
                    );
                    request = request.into_inline_instruction();
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ModelError::RetriesExhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::FakeBackend;
    use crate::model::types::{Part, GENERATE_CONTENT};
    use tokio::time::Instant;

    fn capable(name: &str) -> ModelDescriptor {
        ModelDescriptor::new(name, [GENERATE_CONTENT])
    }

    fn quota_error() -> ModelError {
        ModelError::Remote("429 Quota exceeded for GenerateContent requests".into())
    }

    fn client(backend: FakeBackend) -> ModelClient<FakeBackend> {
        ModelClient::with_backend(ModelConfig::default(), backend)
    }

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "https://generativelanguage.googleapis.com/v1beta");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay_secs, 45);
        assert_eq!(config.max_image_dim, 512);
        assert!(config.api_key.is_none());
        assert!(!config.include_history);
    }

    #[test]
    fn test_choose_prefers_flash_over_pro() {
        let catalog = vec![
            capable("models/gemini-1.0-pro"),
            capable("models/gemini-1.5-flash"),
        ];
        let chosen = choose_model(&catalog, None).unwrap();
        assert_eq!(chosen.name, "models/gemini-1.5-flash");
    }

    #[test]
    fn test_choose_pro_then_first() {
        let catalog = vec![
            capable("models/chat-bison"),
            capable("models/gemini-1.0-PRO"),
        ];
        assert_eq!(
            choose_model(&catalog, None).unwrap().name,
            "models/gemini-1.0-PRO"
        );

        let catalog = vec![capable("models/alpha"), capable("models/beta")];
        assert_eq!(choose_model(&catalog, None).unwrap().name, "models/alpha");
    }

    #[test]
    fn test_choose_ignores_incapable_flash() {
        let catalog = vec![
            ModelDescriptor::new("models/text-embedding-flash", ["embedContent"]),
            capable("models/gemini-1.5-pro"),
        ];
        assert_eq!(
            choose_model(&catalog, None).unwrap().name,
            "models/gemini-1.5-pro"
        );
    }

    #[test]
    fn test_choose_no_capable_model_samples_five() {
        let catalog: Vec<ModelDescriptor> = (0..7)
            .map(|i| ModelDescriptor::new(format!("models/embed-{i}"), ["embedContent"]))
            .collect();

        match choose_model(&catalog, None) {
            Err(ModelError::NoCapableModel { sample }) => {
                assert_eq!(
                    sample,
                    [
                        "models/embed-0",
                        "models/embed-1",
                        "models/embed-2",
                        "models/embed-3",
                        "models/embed-4"
                    ]
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_choose_preferred_model() {
        let catalog = vec![
            capable("models/gemini-1.5-flash"),
            capable("models/gemini-1.5-pro"),
        ];
        assert_eq!(
            choose_model(&catalog, Some("gemini-1.5-pro")).unwrap().name,
            "models/gemini-1.5-pro"
        );
        assert_eq!(
            choose_model(&catalog, Some("models/missing")).unwrap().name,
            "models/gemini-1.5-flash"
        );
    }

    #[tokio::test]
    async fn test_select_model_lists_catalog_once() {
        let backend = FakeBackend::new(vec![
            capable("models/gemini-1.0-pro"),
            capable("models/gemini-1.5-flash"),
        ]);
        let client = client(backend);
        let mut cache = None;

        for _ in 0..4 {
            let model = client.select_model(&mut cache).await.unwrap();
            assert_eq!(model.name, "models/gemini-1.5-flash");
        }
        assert_eq!(client.backend().catalog_calls(), 1);
    }

    #[tokio::test]
    async fn test_select_model_failure_is_not_cached() {
        let client = client(FakeBackend::new(vec![ModelDescriptor::new(
            "models/aqa",
            ["generateAnswer"],
        )]));
        let mut cache = None;

        assert!(matches!(
            client.select_model(&mut cache).await,
            Err(ModelError::NoCapableModel { .. })
        ));
        assert!(cache.is_none());
    }

    #[tokio::test]
    async fn test_prompt_only_parts() {
        let client = client(FakeBackend::new(vec![]).with_replies([Ok("A dog.".into())]));
        let model = capable("models/gemini-1.5-flash");

        let reply = client
            .respond(&model, &[], "What is in this image?", None, None)
            .await
            .unwrap();

        assert_eq!(reply, "A dog.");
        let requests = client.backend().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parts, vec![Part::text("What is in this image?")]);
        assert_eq!(requests[0].system_instruction, None);
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_reply_is_returned_verbatim() {
        let raw = "  **Bold**\n\n- item\n";
        let client = client(FakeBackend::new(vec![]).with_replies([Ok(raw.into())]));
        let model = capable("models/gemini-1.5-flash");

        let reply = client.respond(&model, &[], "hi", None, None).await.unwrap();
        assert_eq!(reply, raw);
    }

    #[tokio::test]
    async fn test_image_part_follows_prompt() {
        let client = client(FakeBackend::new(vec![]).with_replies([Ok("ok".into())]));
        let model = capable("models/gemini-1.5-flash");
        let image = EncodedImage::png(vec![9, 9], 1, 1);

        client
            .respond(&model, &[], "Describe", Some(&image), None)
            .await
            .unwrap();

        let requests = client.backend().requests();
        assert_eq!(requests[0].parts[0], Part::text("Describe"));
        assert_eq!(requests[0].parts[1], Part::image(&image));
    }

    #[tokio::test]
    async fn test_instruction_sent_as_field_when_supported() {
        let client = client(FakeBackend::new(vec![]).with_replies([Ok("ok".into())]));
        let model = capable("models/gemini-1.5-flash");

        client
            .respond(&model, &[], "Hello", None, Some("Answer in French."))
            .await
            .unwrap();

        let requests = client.backend().requests();
        let request = &requests[0];
        assert_eq!(request.system_instruction.as_deref(), Some("Answer in French."));
        assert_eq!(request.prompt_text(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_instruction_inlined_when_unsupported() {
        let backend = FakeBackend::new(vec![])
            .with_replies([Ok("ok".into())])
            .without_system_instruction();
        let client = client(backend);
        let model = capable("models/gemini-1.5-flash");

        client
            .respond(&model, &[], "Hello", None, Some("Answer in French."))
            .await
            .unwrap();

        let requests = client.backend().requests();
        let request = &requests[0];
        assert_eq!(request.system_instruction, None);
        assert_eq!(
            request.prompt_text(),
            Some("[System Instruction: Answer in French.]\n\nUser: Hello")
        );
    }

    #[tokio::test]
    async fn test_blank_instruction_is_ignored() {
        let client = client(FakeBackend::new(vec![]).with_replies([Ok("ok".into())]));
        let model = capable("models/gemini-1.0-pro");

        client
            .respond(&model, &[], "Hello", None, Some("   "))
            .await
            .unwrap();

        let requests = client.backend().requests();
        let request = &requests[0];
        assert_eq!(request.system_instruction, None);
        assert_eq!(request.prompt_text(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_rejected_instruction_field_is_inlined() {
        let rejection = ModelError::Api {
            status: 400,
            status_text: Some("INVALID_ARGUMENT".into()),
            message: "Invalid JSON payload: unknown field system_instruction".into(),
        };
        let client = client(
            FakeBackend::new(vec![]).with_replies([Err(rejection), Ok("bonjour".into())]),
        );
        let model = capable("models/gemini-1.5-flash");

        let reply = client
            .respond(&model, &[], "Hello", None, Some("Answer in French."))
            .await
            .unwrap();

        assert_eq!(reply, "bonjour");
        let requests = client.backend().requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].system_instruction.is_some());
        assert_eq!(requests[1].system_instruction, None);
        assert_eq!(
            requests[1].prompt_text(),
            Some("[System Instruction: Answer in French.]\n\nUser: Hello")
        );
    }

    #[tokio::test]
    async fn test_history_sent_when_enabled() {
        let backend = FakeBackend::new(vec![]).with_replies([Ok("ok".into())]);
        let client =
            ModelClient::with_backend(ModelConfig::default().with_history(true), backend);
        let model = capable("models/gemini-1.5-flash");
        let history = vec![ChatMessage::user("one"), ChatMessage::assistant("two")];

        client
            .respond(&model, &history, "three", None, None)
            .await
            .unwrap();

        assert_eq!(client.backend().requests()[0].history, history);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_throttling_then_succeeds() {
        let backend = FakeBackend::new(vec![]).with_replies([
            Err(quota_error()),
            Err(quota_error()),
            Ok("Third time lucky".into()),
        ]);
        let client = client(backend);
        let model = capable("models/gemini-1.5-flash");
        let start = Instant::now();

        let reply = client.respond(&model, &[], "hi", None, None).await.unwrap();

        assert_eq!(reply, "Third time lucky");
        assert_eq!(client.backend().generate_calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_exhausts_attempts() {
        let backend = FakeBackend::new(vec![]).with_replies([
            Err(quota_error()),
            Err(quota_error()),
            Err(ModelError::Remote("429 final".into())),
            Ok("never reached".into()),
        ]);
        let client = client(backend);
        let model = capable("models/gemini-1.5-flash");
        let start = Instant::now();

        let err = client
            .respond(&model, &[], "hi", None, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Remote generation failed: 429 final");
        assert_eq!(client.backend().generate_calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(135));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inlined_resend_shares_attempt_budget() {
        let rejection = ModelError::Api {
            status: 400,
            status_text: Some("INVALID_ARGUMENT".into()),
            message: "Developer instruction is not enabled (system_instruction)".into(),
        };
        let backend = FakeBackend::new(vec![]).with_replies([
            Err(rejection),
            Err(quota_error()),
            Err(quota_error()),
            Err(quota_error()),
            Ok("never reached".into()),
        ]);
        let client = client(backend);
        let model = capable("models/gemini-1.5-flash");

        let err = client
            .respond(&model, &[], "Hello", None, Some("Answer in French."))
            .await
            .unwrap_err();

        assert!(err.is_throttled());
        let requests = client.backend().requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].system_instruction.is_some());
        assert!(requests[1..].iter().all(|r| r.system_instruction.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let backend = FakeBackend::new(vec![]).with_replies([
            Err(ModelError::Remote("invalid image".into())),
            Ok("never reached".into()),
        ]);
        let client = client(backend);
        let model = capable("models/gemini-1.5-flash");
        let start = Instant::now();

        let err = client
            .respond(&model, &[], "hi", None, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Remote generation failed: invalid image");
        assert_eq!(client.backend().generate_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_is_configurable() {
        let backend = FakeBackend::new(vec![])
            .with_replies([Err(quota_error()), Ok("ok".into())]);
        let client =
            ModelClient::with_backend(ModelConfig::default().with_retry_delay(2), backend);
        let model = capable("models/gemini-1.5-flash");
        let start = Instant::now();

        client.respond(&model, &[], "hi", None, None).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_zero_attempts_reports_exhaustion() {
        let backend = FakeBackend::new(vec![]).with_replies([Ok("unused".into())]);
        let client =
            ModelClient::with_backend(ModelConfig::default().with_max_attempts(0), backend);
        let model = capable("models/gemini-1.5-flash");

        let err = client
            .respond(&model, &[], "hi", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::RetriesExhausted));
        assert_eq!(client.backend().generate_calls(), 0);
    }
}
