//! Main Iced application for the Image Chat GUI.

use std::path::PathBuf;
use std::sync::Arc;

use iced::widget::image as picture;
use iced::widget::{
    button, column, container, horizontal_rule, horizontal_space, row, scrollable, text,
    text_editor, text_input, toggler, vertical_space, Column,
};
use iced::{Element, Length, Task, Theme};

use crate::attachment::{fetch_url, load_path, ImageError, SelectedImage};
use crate::chat::{ChatMessage, ChatSession, InstructionPreset, TurnOutcome};
use crate::model::ModelClient;
use crate::settings::{api_key_from_env, AppSettings};

use super::logger::Logger;

/// Current view/tab of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Chat,
    Settings,
    Logs,
}

/// Application state shown in the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Idle,
    /// A reply is pending; sending and clearing are disabled.
    Waiting,
    LoadingImage,
}

/// Messages for the Iced application.
#[derive(Debug, Clone)]
pub enum Message {
    // Navigation
    SwitchView(View),

    // Chat
    PromptChanged(String),
    SendPrompt,
    ReplyReceived(TurnOutcome<String>),
    ClearChat,
    ExportChat,
    DismissError,

    // Image
    ImagePathChanged(String),
    LoadImagePath,
    ImageUrlChanged(String),
    FetchImageUrl,
    ImageLoaded(Result<SelectedImage, ImageError>),
    RemoveImage,

    // System instruction
    InstructionEdited(text_editor::Action),
    ApplyInstruction,
    PresetSelected(InstructionPreset),
    ResetInstruction,

    // Settings
    BaseUrlChanged(String),
    PreferredModelChanged(String),
    MaxAttemptsChanged(String),
    RetryDelayChanged(String),
    MaxImageDimChanged(String),
    IncludeHistoryToggled(bool),
    ExportPathChanged(String),
    SaveSettings,
    ResetSettings,
    SettingsSaved(Result<(), String>),

    // Logs
    ClearLogs,
    RefreshLogFiles,
    OpenLogFile(PathBuf),
    CloseLogFile,
}

/// Main application struct.
pub struct ImageChatApp {
    view: View,
    /// Set from `SendPrompt` until `ReplyReceived`. Image loads never touch it.
    waiting_reply: bool,
    loading_image: bool,

    // Settings and the client built from them
    settings: AppSettings,
    has_api_key: bool,
    client: Arc<ModelClient>,
    http: reqwest::Client,

    // Settings inputs as strings
    max_attempts_input: String,
    retry_delay_input: String,
    max_image_dim_input: String,
    export_path_input: String,

    // Conversation
    session: ChatSession,
    prompt_input: String,
    instruction: text_editor::Content,

    // Image inputs
    image_path_input: String,
    image_url_input: String,
    preview: Option<picture::Handle>,

    logger: Logger,
    past_logs: Vec<PathBuf>,
    opened_log: Option<(PathBuf, String)>,
    error: Option<String>,
    notice: Option<String>,
    status: String,
}

impl Default for ImageChatApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageChatApp {
    /// Create a new application instance.
    pub fn new() -> Self {
        let settings = AppSettings::load_with_env();
        let api_key = api_key_from_env();
        let has_api_key = api_key.is_some();
        let client = ModelClient::new(settings.model_config(api_key));

        let mut logger = Logger::new();
        logger.info("Image Chat started");
        if !has_api_key {
            logger.warning("API_KEY is not set; replies will fail until it is configured");
        }

        Self::with_parts(settings, has_api_key, client, logger)
    }

    fn with_parts(
        settings: AppSettings,
        has_api_key: bool,
        client: ModelClient,
        logger: Logger,
    ) -> Self {
        Self {
            view: View::Chat,
            waiting_reply: false,
            loading_image: false,
            max_attempts_input: settings.max_attempts.to_string(),
            retry_delay_input: settings.retry_delay.to_string(),
            max_image_dim_input: settings.max_image_dim.to_string(),
            export_path_input: AppSettings::default_export_path().display().to_string(),
            settings,
            has_api_key,
            client: Arc::new(client),
            http: reqwest::Client::new(),
            session: ChatSession::new(),
            prompt_input: String::new(),
            instruction: text_editor::Content::new(),
            image_path_input: String::new(),
            image_url_input: String::new(),
            preview: None,
            logger,
            past_logs: Vec::new(),
            opened_log: None,
            error: None,
            notice: None,
            status: "Ready".to_string(),
        }
    }

    pub fn title(&self) -> String {
        "Image Chat".to_string()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    pub fn state(&self) -> AppState {
        if self.waiting_reply {
            AppState::Waiting
        } else if self.loading_image {
            AppState::LoadingImage
        } else {
            AppState::Idle
        }
    }

    /// Update the application state based on messages.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SwitchView(view) => {
                self.view = view;
                if view == View::Logs {
                    self.past_logs = self.logger.list_log_files();
                }
                Task::none()
            }

            // Chat
            Message::PromptChanged(value) => {
                self.prompt_input = value;
                Task::none()
            }
            Message::SendPrompt => self.send_prompt(),
            Message::ReplyReceived(outcome) => {
                self.waiting_reply = false;
                if outcome.newly_selected {
                    if let Some(model) = &outcome.model {
                        self.logger.info(format!("Using model: {}", model.short_name()));
                    }
                }

                match self.session.finish_turn(outcome) {
                    Ok(reply) => {
                        self.logger.reply(reply.content.clone());
                        self.status = "Reply received".to_string();
                    }
                    Err(e) => {
                        self.logger.error(format!("Generation failed: {}", e));
                        self.error = Some(e);
                        self.status = "Generation failed".to_string();
                    }
                }
                Task::none()
            }
            Message::ClearChat => {
                if self.waiting_reply {
                    return Task::none();
                }
                self.session.clear();
                self.error = None;
                self.notice = Some("Chat cleared".to_string());
                self.logger.info("Chat cleared");
                Task::none()
            }
            Message::ExportChat => {
                let path = PathBuf::from(self.export_path_input.trim());
                match self.session.export_to_file(&path) {
                    Ok(path) => {
                        self.logger.success(format!("Chat exported to {}", path.display()));
                        self.notice = Some(format!("Saved {}", path.display()));
                    }
                    Err(e) => {
                        self.logger.warning(e.to_string());
                        self.notice = Some(e.to_string());
                    }
                }
                Task::none()
            }
            Message::DismissError => {
                self.error = None;
                self.notice = None;
                Task::none()
            }

            // Image
            Message::ImagePathChanged(value) => {
                self.image_path_input = value;
                Task::none()
            }
            Message::LoadImagePath => {
                let path = self.image_path_input.trim().to_string();
                if path.is_empty() {
                    return Task::none();
                }
                self.loading_image = true;
                self.logger.info(format!("Loading image {}", path));
                Task::perform(async move { load_path(path).await }, Message::ImageLoaded)
            }
            Message::ImageUrlChanged(value) => {
                self.image_url_input = value;
                Task::none()
            }
            Message::FetchImageUrl => {
                let url = self.image_url_input.trim().to_string();
                if url.is_empty() {
                    return Task::none();
                }
                self.loading_image = true;
                self.logger.info(format!("Fetching image {}", url));
                let http = self.http.clone();
                Task::perform(
                    async move { fetch_url(&http, &url).await },
                    Message::ImageLoaded,
                )
            }
            Message::ImageLoaded(result) => {
                self.loading_image = false;
                match self.session.attach_image(result) {
                    Ok(image) => {
                        let (width, height, pixels) = image.preview_rgba();
                        self.preview = Some(picture::Handle::from_rgba(width, height, pixels));
                        self.logger.success(format!(
                            "Image loaded: {} ({}x{})",
                            image.source, width, height
                        ));
                    }
                    Err(e) => {
                        self.logger.warning(e.to_string());
                        self.notice = Some(format!("⚠️ {}", e));
                    }
                }
                Task::none()
            }
            Message::RemoveImage => {
                self.session.clear_image();
                self.preview = None;
                self.logger.info("Image removed");
                Task::none()
            }

            // System instruction
            Message::InstructionEdited(action) => {
                self.instruction.perform(action);
                Task::none()
            }
            Message::ApplyInstruction => {
                let text = self.instruction.text();
                self.set_instruction(text.trim_end().to_string());
                Task::none()
            }
            Message::PresetSelected(preset) => {
                self.instruction = text_editor::Content::with_text(preset.instruction());
                self.set_instruction(preset.instruction().to_string());
                self.logger.info(format!("Applied {} preset", preset.name()));
                Task::none()
            }
            Message::ResetInstruction => {
                self.session.reset_system_instruction();
                self.instruction = text_editor::Content::new();
                self.logger.info("System instruction reset");
                Task::none()
            }

            // Settings
            Message::BaseUrlChanged(value) => {
                self.settings.base_url = value;
                Task::none()
            }
            Message::PreferredModelChanged(value) => {
                self.settings.preferred_model = value;
                Task::none()
            }
            Message::MaxAttemptsChanged(value) => {
                self.max_attempts_input = value.clone();
                if let Ok(v) = value.parse() {
                    self.settings.max_attempts = v;
                }
                Task::none()
            }
            Message::RetryDelayChanged(value) => {
                self.retry_delay_input = value.clone();
                if let Ok(v) = value.parse() {
                    self.settings.retry_delay = v;
                }
                Task::none()
            }
            Message::MaxImageDimChanged(value) => {
                self.max_image_dim_input = value.clone();
                if let Ok(v) = value.parse::<u32>() {
                    if v > 0 {
                        self.settings.max_image_dim = v;
                    }
                }
                Task::none()
            }
            Message::IncludeHistoryToggled(enabled) => {
                self.settings.include_history = enabled;
                Task::none()
            }
            Message::ExportPathChanged(value) => {
                self.export_path_input = value;
                Task::none()
            }
            Message::SaveSettings => {
                self.rebuild_client();
                let settings = self.settings.clone();
                Task::perform(async move { settings.save() }, Message::SettingsSaved)
            }
            Message::ResetSettings => {
                self.settings = AppSettings::default();
                self.max_attempts_input = self.settings.max_attempts.to_string();
                self.retry_delay_input = self.settings.retry_delay.to_string();
                self.max_image_dim_input = self.settings.max_image_dim.to_string();
                self.export_path_input = AppSettings::default_export_path().display().to_string();
                self.logger.info("Settings reset to defaults");
                Task::none()
            }
            Message::SettingsSaved(result) => {
                match result {
                    Ok(()) => {
                        self.logger.success("Settings saved");
                        self.status = "Settings saved".to_string();
                    }
                    Err(e) => {
                        self.logger.error(format!("Failed to save settings: {}", e));
                        self.status = format!("Save failed: {}", e);
                    }
                }
                Task::none()
            }

            Message::ClearLogs => {
                self.logger.clear();
                self.logger.info("Logs cleared");
                Task::none()
            }
            Message::RefreshLogFiles => {
                self.past_logs = self.logger.list_log_files();
                Task::none()
            }
            Message::OpenLogFile(path) => {
                match Logger::read_log_file(&path) {
                    Ok(lines) => self.opened_log = Some((path, lines.join("\n"))),
                    Err(e) => {
                        self.logger.warning(e.clone());
                        self.status = e;
                    }
                }
                Task::none()
            }
            Message::CloseLogFile => {
                self.opened_log = None;
                Task::none()
            }
        }
    }

    fn send_prompt(&mut self) -> Task<Message> {
        if self.waiting_reply {
            return Task::none();
        }
        let prompt = self.prompt_input.trim().to_string();
        if prompt.is_empty() {
            return Task::none();
        }

        self.prompt_input.clear();
        self.error = None;
        self.notice = None;
        self.waiting_reply = true;
        self.status = "Waiting for reply...".to_string();
        self.logger.prompt(prompt.clone());

        let turn = self.session.begin_turn(prompt);
        let client = Arc::clone(&self.client);

        Task::perform(
            async move { turn.run(client.as_ref()).await.map_err(|e| e.to_string()) },
            Message::ReplyReceived,
        )
    }

    fn set_instruction(&mut self, instruction: String) {
        if let Some(notice) = self.session.set_system_instruction(instruction) {
            self.notice = Some(notice.to_string());
        }
    }

    /// Rebuild the client from the current settings. The session keeps its
    /// selected model.
    fn rebuild_client(&mut self) {
        let api_key = api_key_from_env();
        self.has_api_key = api_key.is_some();
        self.client = Arc::new(ModelClient::new(self.settings.model_config(api_key)));
    }

    /// Build the view.
    pub fn view(&self) -> Element<'_, Message> {
        let content = match self.view {
            View::Chat => self.view_chat(),
            View::Settings => self.view_settings(),
            View::Logs => self.view_logs(),
        };

        column![self.view_nav_bar(), content, self.view_status_bar()]
            .spacing(10)
            .padding(20)
            .into()
    }

    /// Navigation bar.
    fn view_nav_bar(&self) -> Element<'_, Message> {
        let tab = |label: &'static str, view: View| {
            button(text(label))
                .on_press(Message::SwitchView(view))
                .style(if self.view == view {
                    button::primary
                } else {
                    button::secondary
                })
        };

        row![
            tab("💬 Chat", View::Chat),
            tab("⚙️ Settings", View::Settings),
            tab("📋 Logs", View::Logs),
        ]
        .spacing(10)
        .into()
    }

    /// Status bar.
    fn view_status_bar(&self) -> Element<'_, Message> {
        let state_text = match self.state() {
            AppState::Idle => "🟢 Ready",
            AppState::Waiting => "🔵 Thinking",
            AppState::LoadingImage => "🟡 Loading image",
        };

        let model_text = self
            .session
            .selected_model()
            .map(|m| format!("Model: {}", m.short_name()))
            .unwrap_or_default();

        row![
            text(state_text).size(14),
            horizontal_space(),
            text(model_text).size(14),
            text(&self.status).size(14),
        ]
        .spacing(20)
        .padding(10)
        .into()
    }

    /// Chat view with the image and instruction panels on the left.
    fn view_chat(&self) -> Element<'_, Message> {
        let sidebar = column![
            self.view_image_panel(),
            horizontal_rule(1),
            self.view_instruction_panel(),
        ]
        .spacing(15)
        .width(340);

        row![scrollable(sidebar).height(Length::Fill), self.view_conversation()]
            .spacing(20)
            .height(Length::Fill)
            .into()
    }

    fn view_image_panel(&self) -> Element<'_, Message> {
        let loading = self.loading_image;

        let path_row = row![
            text_input("Image file (PNG or JPEG)", &self.image_path_input)
                .on_input(Message::ImagePathChanged)
                .on_submit(Message::LoadImagePath),
            button(text("📂 Load")).on_press_maybe((!loading).then_some(Message::LoadImagePath)),
        ]
        .spacing(5);

        let url_row = row![
            text_input("https://example.com/image.jpg", &self.image_url_input)
                .on_input(Message::ImageUrlChanged)
                .on_submit(Message::FetchImageUrl),
            button(text("🌐 Fetch")).on_press_maybe((!loading).then_some(Message::FetchImageUrl)),
        ]
        .spacing(5);

        let preview: Element<'_, Message> = match (&self.preview, self.session.image()) {
            (Some(handle), Some(image)) => column![
                container(picture(handle.clone()).height(200))
                    .width(Length::Fill)
                    .center_x(Length::Fill)
                    .padding(5)
                    .style(container::bordered_box),
                text(format!("{} ({}x{})", image.source, image.width(), image.height())).size(12),
                button(text("✖ Remove image"))
                    .on_press(Message::RemoveImage)
                    .style(button::secondary),
            ]
            .spacing(5)
            .into(),
            _ => text("No image selected").size(13).into(),
        };

        column![text("🖼️ Image").size(18), path_row, url_row, preview]
            .spacing(10)
            .into()
    }

    fn view_instruction_panel(&self) -> Element<'_, Message> {
        let editor = text_editor(&self.instruction)
            .placeholder("Tell the assistant how to behave...")
            .on_action(Message::InstructionEdited)
            .height(120);

        let presets = InstructionPreset::ALL.into_iter().fold(
            Column::new().spacing(5),
            |col, preset| {
                col.push(
                    button(text(preset.to_string()).size(13))
                        .on_press(Message::PresetSelected(preset))
                        .style(button::secondary)
                        .width(Length::Fill),
                )
            },
        );

        let actions = row![
            button(text("✔ Apply")).on_press(Message::ApplyInstruction),
            button(text("🔄 Reset"))
                .on_press(Message::ResetInstruction)
                .style(button::secondary),
        ]
        .spacing(10);

        let active = if self.session.system_instruction().is_empty() {
            "Active: none".to_string()
        } else {
            format!("Active: {}", self.session.system_instruction())
        };

        column![
            text("🎭 System instruction").size(18),
            editor,
            actions,
            text(active).size(12),
            text("Presets").size(14),
            presets,
        ]
        .spacing(10)
        .into()
    }

    fn view_conversation(&self) -> Element<'_, Message> {
        let mut messages = Column::new().spacing(10).padding(10);
        if self.session.is_empty() {
            messages = messages.push(text("Select an image and ask a question about it.").size(14));
        }
        for message in self.session.messages() {
            messages = messages.push(chat_bubble(message));
        }
        if self.waiting_reply {
            messages = messages.push(text("🤔 Thinking...").size(14));
        }

        let history = container(scrollable(messages).height(Length::Fill))
            .width(Length::Fill)
            .height(Length::Fill)
            .style(container::bordered_box);

        let mut banners = Column::new().spacing(5);
        if let Some(error) = &self.error {
            banners = banners.push(
                row![
                    text(format!("❌ Error: {}", error)).style(text::danger),
                    horizontal_space(),
                    button(text("✖")).on_press(Message::DismissError).style(button::text),
                ]
                .spacing(10),
            );
        }
        if let Some(notice) = &self.notice {
            banners = banners.push(text(notice).size(13));
        }
        if !self.has_api_key {
            banners = banners.push(
                text("API_KEY is not set; replies will fail until it is configured")
                    .size(13)
                    .style(text::danger),
            );
        }

        let can_send = !self.waiting_reply && !self.prompt_input.trim().is_empty();
        let input_row = row![
            text_input("Ask about the image...", &self.prompt_input)
                .on_input(Message::PromptChanged)
                .on_submit(Message::SendPrompt)
                .padding(10),
            button(text("Send").size(16))
                .on_press_maybe(can_send.then_some(Message::SendPrompt))
                .style(button::success)
                .padding([10, 20]),
        ]
        .spacing(10);

        let actions = row![
            button(text("🗑️ Clear chat"))
                .on_press_maybe((!self.waiting_reply).then_some(Message::ClearChat))
                .style(button::secondary),
            button(text("💾 Export chat"))
                .on_press(Message::ExportChat)
                .style(button::secondary),
        ]
        .spacing(10);

        column![history, banners, input_row, actions]
            .spacing(10)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Settings view.
    fn view_settings(&self) -> Element<'_, Message> {
        let model_section = column![
            text("🤖 Model").size(18),
            labeled_input(
                "API base URL",
                &self.settings.base_url,
                crate::model::DEFAULT_BASE_URL,
                Message::BaseUrlChanged,
            ),
            labeled_input(
                "Preferred model",
                &self.settings.preferred_model,
                "automatic (flash, then pro)",
                Message::PreferredModelChanged,
            ),
            text(if self.has_api_key {
                "API key: loaded from the environment"
            } else {
                "API key: not set (export API_KEY or add it to .env)"
            })
            .size(13),
        ]
        .spacing(10);

        let retry_section = column![
            text("🔄 Retries").size(18),
            labeled_input(
                "Max attempts",
                &self.max_attempts_input,
                "3",
                Message::MaxAttemptsChanged,
            ),
            labeled_input(
                "Retry delay (s)",
                &self.retry_delay_input,
                "45",
                Message::RetryDelayChanged,
            ),
        ]
        .spacing(10);

        let chat_section = column![
            text("💬 Chat").size(18),
            labeled_input(
                "Max image side",
                &self.max_image_dim_input,
                "512",
                Message::MaxImageDimChanged,
            ),
            row![
                text("Send history").width(140),
                toggler(self.settings.include_history).on_toggle(Message::IncludeHistoryToggled),
            ]
            .spacing(10),
            labeled_input(
                "Export file",
                &self.export_path_input,
                crate::chat::DEFAULT_EXPORT_FILE,
                Message::ExportPathChanged,
            ),
        ]
        .spacing(10);

        let actions = row![
            button(text("💾 Save settings"))
                .on_press(Message::SaveSettings)
                .style(button::success)
                .padding([10, 20]),
            button(text("🔄 Reset defaults"))
                .on_press(Message::ResetSettings)
                .style(button::secondary)
                .padding([10, 20]),
        ]
        .spacing(10);

        let content = column![
            text("⚙️ Settings").size(28),
            vertical_space().height(10),
            model_section,
            horizontal_rule(1),
            retry_section,
            horizontal_rule(1),
            chat_section,
            vertical_space().height(20),
            actions,
        ]
        .spacing(15)
        .padding(10);

        scrollable(content).height(Length::Fill).into()
    }

    /// Logs view. Past session files are listed on the right.
    fn view_logs(&self) -> Element<'_, Message> {
        let clear_btn = button(text("🗑️ Clear logs"))
            .on_press(Message::ClearLogs)
            .style(button::secondary);
        let refresh_btn = button(text("🔄 Refresh"))
            .on_press(Message::RefreshLogFiles)
            .style(button::secondary);

        let header = row![
            text("📋 Logs").size(28),
            horizontal_space(),
            refresh_btn,
            clear_btn
        ]
        .spacing(10);

        let (title, body) = match &self.opened_log {
            Some((path, contents)) => (file_label(path), contents.clone()),
            None => ("This session".to_string(), self.logger.format_all()),
        };

        let mut title_row = row![text(title).size(16)].spacing(10);
        if self.opened_log.is_some() {
            title_row = title_row.push(
                button(text("✖ Back to this session").size(12))
                    .on_press(Message::CloseLogFile)
                    .style(button::text),
            );
        }

        let log_container = container(scrollable(text(body).size(13)).height(Length::Fill))
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(10)
            .style(container::bordered_box);

        let current = self.logger.log_file_path();
        let sessions = self.past_logs.iter().fold(
            Column::new().spacing(5).push(text("Sessions").size(14)),
            |col, path| {
                let label = if Some(path.as_path()) == current {
                    format!("{} (current)", file_label(path))
                } else {
                    file_label(path)
                };
                col.push(
                    button(text(label).size(12))
                        .on_press(Message::OpenLogFile(path.clone()))
                        .style(button::secondary)
                        .width(Length::Fill),
                )
            },
        );

        let log_path = current
            .map(|p| format!("Log file: {}", p.display()))
            .unwrap_or_else(|| "Log file: not created".to_string());

        column![
            header,
            vertical_space().height(10),
            row![
                column![title_row, log_container].spacing(5).width(Length::Fill),
                scrollable(sessions).width(260).height(Length::Fill),
            ]
            .spacing(15)
            .height(Length::Fill),
            text(log_path).size(12),
        ]
        .spacing(10)
        .height(Length::Fill)
        .into()
    }
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A message bubble, user messages on the right.
fn chat_bubble(message: &ChatMessage) -> Element<'_, Message> {
    let (label, style): (&str, fn(&Theme) -> container::Style) = if message.is_user() {
        ("🧑 You", container::rounded_box)
    } else {
        ("🤖 Assistant", container::bordered_box)
    };

    let bubble = container(column![text(label).size(12), text(&message.content).size(15)].spacing(4))
        .padding(10)
        .max_width(560.0)
        .style(style);

    if message.is_user() {
        row![horizontal_space(), bubble].into()
    } else {
        row![bubble, horizontal_space()].into()
    }
}

/// Helper function to create a labeled input row.
fn labeled_input<'a>(
    label: &'a str,
    value: &'a str,
    placeholder: &'a str,
    on_change: impl Fn(String) -> Message + 'a,
) -> Element<'a, Message> {
    row![
        text(label).width(140),
        text_input(placeholder, value)
            .on_input(on_change)
            .width(360),
    ]
    .spacing(10)
    .into()
}
