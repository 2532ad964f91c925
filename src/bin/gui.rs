//! GUI entry point for Image Chat.
//!
//! Run with: cargo run --bin image-chat-gui

use iced::Size;

use image_chat::gui::ImageChatApp;

fn main() -> iced::Result {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    iced::application(ImageChatApp::title, ImageChatApp::update, ImageChatApp::view)
        .theme(ImageChatApp::theme)
        .window_size(Size::new(1100.0, 760.0))
        .run_with(|| (ImageChatApp::new(), iced::Task::none()))
}
