//! GUI module for Image Chat.
//!
//! Provides a graphical user interface using Iced.

pub mod app;
pub mod logger;

pub use app::ImageChatApp;
pub use logger::{LogEntry, LogLevel, Logger};
