//! Per-session conversation state and turn handling.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{info, warn};
use uuid::Uuid;

use super::export::{self, ExportError};
use super::message::ChatMessage;
use super::presets::InstructionPreset;
use crate::attachment::{prepare_for_upload, ImageError, SelectedImage};
use crate::model::{GenerativeBackend, ModelClient, ModelDescriptor, ModelError};

/// Shown when the instruction changes mid-conversation.
pub const INSTRUCTION_CHANGED_NOTICE: &str = "💡 Clear chat to apply new instructions";

/// State of one interactive chat session.
///
/// Owned by the front end. Model selection is cached here, so every session
/// lists the remote catalog at most once.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    messages: Vec<ChatMessage>,
    image: Option<SelectedImage>,
    system_instruction: String,
    model: Option<ModelDescriptor>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            image: None,
            system_instruction: String::new(),
            model: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Messages in chronological order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop the conversation. The image, instruction and model stay selected.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: SelectedImage) {
        let _ = self.attach_image(Ok(image));
    }

    /// Apply the result of an image load.
    ///
    /// On failure the previously selected image stays in place and the error
    /// is handed back for the front end to show as a warning.
    pub fn attach_image(
        &mut self,
        loaded: Result<SelectedImage, ImageError>,
    ) -> Result<&SelectedImage, ImageError> {
        match loaded {
            Ok(image) => {
                info!(session = %self.id, source = %image.source, "Image selected");
                Ok(&*self.image.insert(image))
            }
            Err(e) => {
                warn!(session = %self.id, "Image load failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Replace the system instruction.
    ///
    /// Returns a notice when the conversation already has messages, since
    /// earlier replies were written under the old instruction.
    pub fn set_system_instruction(&mut self, instruction: impl Into<String>) -> Option<&'static str> {
        let instruction = instruction.into();
        if instruction == self.system_instruction {
            return None;
        }
        self.system_instruction = instruction;
        (!self.messages.is_empty()).then_some(INSTRUCTION_CHANGED_NOTICE)
    }

    pub fn apply_preset(&mut self, preset: InstructionPreset) -> Option<&'static str> {
        self.set_system_instruction(preset.instruction())
    }

    pub fn reset_system_instruction(&mut self) {
        self.system_instruction.clear();
    }

    /// The model picked for this session, once a turn has selected one.
    pub fn selected_model(&self) -> Option<&ModelDescriptor> {
        self.model.as_ref()
    }

    /// Record the user's prompt and snapshot what the model call needs.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) -> PendingTurn {
        let prompt = prompt.into();
        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(prompt.clone()));

        PendingTurn {
            history,
            prompt,
            image: self.image.as_ref().map(|i| i.image.clone()),
            system_instruction: Some(self.system_instruction.clone()).filter(|s| !s.is_empty()),
            model: self.model.clone(),
        }
    }

    /// Store the outcome of a turn.
    ///
    /// A newly selected model is cached even when the reply failed. On
    /// success the reply is appended; on failure the conversation is left as
    /// it was, keeping the user's message.
    pub fn finish_turn<E>(&mut self, outcome: TurnOutcome<E>) -> Result<&ChatMessage, E> {
        if self.model.is_none() {
            self.model = outcome.model;
        }

        let reply = outcome.reply?;
        let index = self.messages.len();
        self.messages.push(ChatMessage::assistant(reply));
        Ok(&self.messages[index])
    }

    /// Run a full turn: record the prompt, ask the model, record the reply.
    pub async fn submit<B: GenerativeBackend>(
        &mut self,
        client: &ModelClient<B>,
        prompt: impl Into<String>,
    ) -> Result<&ChatMessage, ModelError> {
        let turn = self.begin_turn(prompt);
        let outcome = turn.run(client).await;
        self.finish_turn(outcome)
    }

    /// Conversation as an indented JSON array.
    pub fn export_json(&self) -> Result<String, ExportError> {
        Ok(export::to_json(&self.messages)?)
    }

    /// Write the conversation to `path`.
    pub fn export_to_file(&self, path: &Path) -> Result<PathBuf, ExportError> {
        export::write_transcript(&self.messages, path)
    }
}

/// Everything a model call needs, detached from the session so it can run
/// on another task.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    pub image: Option<DynamicImage>,
    pub system_instruction: Option<String>,
    pub model: Option<ModelDescriptor>,
}

/// Result of a [`PendingTurn`], to be handed back to the session.
#[derive(Debug, Clone)]
pub struct TurnOutcome<E = ModelError> {
    /// The session's model after the turn, if one was selected.
    pub model: Option<ModelDescriptor>,
    /// Whether this turn listed the catalog and picked the model.
    pub newly_selected: bool,
    pub reply: Result<String, E>,
}

impl<E> TurnOutcome<E> {
    pub fn map_err<F>(self, op: impl FnOnce(E) -> F) -> TurnOutcome<F> {
        TurnOutcome {
            model: self.model,
            newly_selected: self.newly_selected,
            reply: self.reply.map_err(op),
        }
    }
}

impl PendingTurn {
    /// Select the model if needed, encode the image and ask for a reply.
    pub async fn run<B: GenerativeBackend>(mut self, client: &ModelClient<B>) -> TurnOutcome {
        let had_model = self.model.is_some();
        let reply = self.execute(client).await;

        TurnOutcome {
            newly_selected: !had_model && self.model.is_some(),
            model: self.model,
            reply,
        }
    }

    async fn execute<B: GenerativeBackend>(
        &mut self,
        client: &ModelClient<B>,
    ) -> Result<String, ModelError> {
        let model = client.select_model(&mut self.model).await?.clone();

        let image = self
            .image
            .as_ref()
            .map(|image| prepare_for_upload(image, client.config().max_image_dim))
            .transpose()?;

        client
            .respond(
                &model,
                &self.history,
                &self.prompt,
                image.as_ref(),
                self.system_instruction.as_deref(),
            )
            .await
    }
}
