//! Gemini REST backend (`generativelanguage.googleapis.com`).

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::GenerativeBackend;
use super::error::ModelError;
use super::types::{GenerateRequest, ModelDescriptor, Part};
use crate::chat::Role;

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
const CATALOG_PAGE_SIZE: &str = "1000";

/// Backend that calls the Gemini REST API with an API key.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiBackend {
    /// Create a backend. A missing key is only reported when a call is made.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, ModelError> {
        self.api_key.as_deref().ok_or(ModelError::MissingApiKey)
    }

    fn model_path(name: &str) -> String {
        if name.starts_with("models/") || name.starts_with("tunedModels/") {
            name.to_string()
        } else {
            format!("models/{}", name)
        }
    }

    /// Decode a successful response body or map the error payload.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ModelError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ModelError::ParseError(e.to_string()))
    }
}

impl GenerativeBackend for GeminiBackend {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ModelError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models", self.base_url);

        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, api_key)
                .query(&[("pageSize", CATALOG_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListModelsResponse = Self::read_json(request.send().await?).await?;
            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(token = %token, "Model catalog repeated its page token, stopping");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = models.len(), "Fetched model catalog");
        Ok(models)
    }

    async fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> Result<String, ModelError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/{}:generateContent",
            self.base_url,
            Self::model_path(&model.name)
        );

        let body = GenerateContentBody::from_request(request);
        debug!(
            model = %model.name,
            turns = body.contents.len(),
            has_image = request.has_image(),
            has_instruction = body.system_instruction.is_some(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateContentResponse = Self::read_json(response).await?;
        extract_text(parsed)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
}

impl GenerateContentBody {
    fn from_request(request: &GenerateRequest) -> Self {
        let mut contents: Vec<WireContent> = request
            .history
            .iter()
            .map(|message| WireContent {
                role: Some(wire_role(message.role)),
                parts: vec![WirePart::Text {
                    text: message.content.clone(),
                }],
            })
            .collect();

        contents.push(WireContent {
            role: Some("user"),
            parts: request.parts.iter().map(WirePart::from_part).collect(),
        });

        let system_instruction = request
            .system_instruction
            .as_ref()
            .map(|text| WireContent {
                role: None,
                parts: vec![WirePart::Text { text: text.clone() }],
            });

        Self {
            contents,
            system_instruction,
        }
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl WirePart {
    fn from_part(part: &Part) -> Self {
        match part {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::Image { mime_type, data } => WirePart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(ModelError::ParseError(format!("Response blocked: {}", reason)));
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if texts.is_empty() {
        return Err(ModelError::ParseError(format!(
            "Response contained no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(texts.concat())
}

fn map_http_error(status: u16, body: String) -> ModelError {
    match serde_json::from_str::<ErrorWrapper>(&body) {
        Ok(wrapper) => ModelError::Api {
            status,
            status_text: wrapper.error.status,
            message: wrapper.error.message.unwrap_or(body),
        },
        Err(_) => ModelError::Api {
            status,
            status_text: None,
            message: body,
        },
    }
}
