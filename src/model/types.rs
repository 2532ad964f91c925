//! Catalog and request types shared by the model client and its backends.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::attachment::EncodedImage;
use crate::chat::ChatMessage;

/// Generation method a model must declare to be usable for chat.
pub const GENERATE_CONTENT: &str = "generateContent";

/// Prefix the catalog puts in front of every model name.
const MODEL_NAME_PREFIX: &str = "models/";

/// A model entry from the remote catalog.
///
/// Field names follow the Gemini `models.list` response so that catalog pages
/// deserialize straight into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Full resource name, e.g. `models/gemini-1.5-flash`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Capability tags such as `generateContent` or `embedContent`.
    #[serde(default)]
    pub supported_generation_methods: BTreeSet<String>,
    #[serde(default)]
    pub input_token_limit: Option<u32>,
    #[serde(default)]
    pub output_token_limit: Option<u32>,
}

impl ModelDescriptor {
    /// Create a descriptor with the given name and capability tags.
    pub fn new<I, S>(name: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            display_name: None,
            supported_generation_methods: methods.into_iter().map(Into::into).collect(),
            input_token_limit: None,
            output_token_limit: None,
        }
    }

    /// Whether the model declares the given generation method.
    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.contains(method)
    }

    /// Whether the model can generate content from multimodal input.
    pub fn is_capable(&self) -> bool {
        self.supports(GENERATE_CONTENT)
    }

    /// Model name without the `models/` prefix, for display.
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(MODEL_NAME_PREFIX)
            .unwrap_or(&self.name)
    }

    /// Whether the model accepts a dedicated system instruction field.
    ///
    /// The catalog does not advertise this, so it is derived from the model
    /// family: the 1.0 generation (`gemini-pro`, `gemini-pro-vision`,
    /// `gemini-1.0-*`) predates the field.
    pub fn supports_system_instruction(&self) -> bool {
        let id = self.short_name().to_lowercase();
        !(id.starts_with("gemini-1.0")
            || id == "gemini-pro"
            || id.starts_with("gemini-pro-vision"))
    }
}

/// One piece of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(image: &EncodedImage) -> Self {
        Part::Image {
            mime_type: image.mime_type.to_string(),
            data: image.data.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::Image { .. } => None,
        }
    }
}

/// A fully built request for a single `generateContent` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateRequest {
    /// Earlier turns sent ahead of the current one. Empty unless history is enabled.
    pub history: Vec<ChatMessage>,
    /// Parts of the current user turn: the prompt text, then an optional image.
    pub parts: Vec<Part>,
    /// Instruction sent as a first-class field.
    pub system_instruction: Option<String>,
}

impl GenerateRequest {
    /// Build the parts for a prompt and an optional image.
    pub fn new(prompt: impl Into<String>, image: Option<&EncodedImage>) -> Self {
        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = image {
            parts.push(Part::image(image));
        }

        Self {
            history: Vec::new(),
            parts,
            system_instruction: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Text of the prompt part.
    pub fn prompt_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }

    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Image { .. }))
    }

    /// Move the system instruction out of its field and into the prompt text.
    ///
    /// Used for models that do not accept the dedicated field. A request
    /// without an instruction is returned unchanged.
    pub fn into_inline_instruction(mut self) -> Self {
        let Some(instruction) = self.system_instruction.take() else {
            return self;
        };

        match self.parts.iter_mut().find(|p| matches!(p, Part::Text(_))) {
            Some(Part::Text(prompt)) => *prompt = inline_system_instruction(&instruction, prompt),
            _ => self
                .parts
                .insert(0, Part::text(inline_system_instruction(&instruction, ""))),
        }
        self
    }
}

/// Prompt text used when the instruction cannot be sent as its own field.
pub fn inline_system_instruction(instruction: &str, prompt: &str) -> String {
    format!("[System Instruction: {}]\n\nUser: {}", instruction, prompt)
}
