//! Exporting the conversation as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::message::ChatMessage;

/// File name used when the user does not pick one.
pub const DEFAULT_EXPORT_FILE: &str = "chat_history.json";

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No chat to download!")]
    Empty,
    #[error("Failed to serialize chat: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write chat file: {0}")]
    Io(#[from] std::io::Error),
}

/// Render messages as an indented JSON array of `{role, content}` objects.
pub fn to_json(messages: &[ChatMessage]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(messages)
}

/// Write the conversation to `path`, creating parent directories.
pub fn write_transcript(messages: &[ChatMessage], path: &Path) -> Result<PathBuf, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::Empty);
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, to_json(messages)?)?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_indented_array() {
        let json = to_json(&[ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]).unwrap();
        assert_eq!(
            json,
            "[\n  {\n    \"role\": \"user\",\n    \"content\": \"Hi\"\n  },\n  {\n    \"role\": \"assistant\",\n    \"content\": \"Hello!\"\n  }\n]"
        );
    }

    #[test]
    fn test_json_keeps_utf8() {
        let json = to_json(&[ChatMessage::user("Ça va? 🤖")]).unwrap();
        assert!(json.contains("Ça va? 🤖"));
    }

    #[test]
    fn test_empty_chat_is_not_written() {
        let path = std::env::temp_dir().join(format!("image-chat-{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(
            write_transcript(&[], &path),
            Err(ExportError::Empty)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_transcript() {
        let dir = std::env::temp_dir().join(format!("image-chat-{}", uuid::Uuid::new_v4()));
        let path = dir.join(DEFAULT_EXPORT_FILE);
        let messages = vec![ChatMessage::user("What is this?"), ChatMessage::assistant("A cat.")];

        let written = write_transcript(&messages, &path).unwrap();

        let parsed: Vec<ChatMessage> =
            serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(parsed, messages);
        fs::remove_dir_all(dir).unwrap();
    }
}
