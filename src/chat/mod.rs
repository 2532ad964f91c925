//! Conversation state, presets and export.

mod export;
mod message;
mod presets;
mod session;

pub use export::{to_json, write_transcript, ExportError, DEFAULT_EXPORT_FILE};
pub use message::{ChatMessage, Role};
pub use presets::InstructionPreset;
pub use session::{ChatSession, PendingTurn, TurnOutcome, INSTRUCTION_CHANGED_NOTICE};
