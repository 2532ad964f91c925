//! Ready-made system instructions.

use std::fmt;

/// A canned system instruction the user can apply with one click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionPreset {
    Professional,
    Friendly,
    Creative,
    Educational,
}

pub const PROFESSIONAL_INSTRUCTION: &str = "You are a professional, knowledgeable assistant. \
Provide clear, accurate, and well-structured responses. Use formal language and be concise.";

pub const FRIENDLY_INSTRUCTION: &str = "You are a friendly and approachable assistant. \
Be warm, conversational, and helpful. Use a casual but respectful tone.";

pub const CREATIVE_INSTRUCTION: &str = "You are a creative and imaginative assistant. \
Think outside the box, use vivid descriptions, and encourage creative thinking.";

pub const EDUCATIONAL_INSTRUCTION: &str = "You are an educational assistant. \
Explain concepts clearly, provide examples, and help users learn. \
Break down complex topics into understandable parts.";

impl InstructionPreset {
    pub const ALL: [InstructionPreset; 4] = [
        InstructionPreset::Professional,
        InstructionPreset::Friendly,
        InstructionPreset::Creative,
        InstructionPreset::Educational,
    ];

    /// The instruction text this preset applies.
    pub fn instruction(&self) -> &'static str {
        match self {
            InstructionPreset::Professional => PROFESSIONAL_INSTRUCTION,
            InstructionPreset::Friendly => FRIENDLY_INSTRUCTION,
            InstructionPreset::Creative => CREATIVE_INSTRUCTION,
            InstructionPreset::Educational => EDUCATIONAL_INSTRUCTION,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstructionPreset::Professional => "professional",
            InstructionPreset::Friendly => "friendly",
            InstructionPreset::Creative => "creative",
            InstructionPreset::Educational => "educational",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            InstructionPreset::Professional => "👨‍💼",
            InstructionPreset::Friendly => "😊",
            InstructionPreset::Creative => "🎨",
            InstructionPreset::Educational => "📚",
        }
    }

    /// Look a preset up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for InstructionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstructionPreset::Professional => "Professional",
            InstructionPreset::Friendly => "Friendly",
            InstructionPreset::Creative => "Creative",
            InstructionPreset::Educational => "Educational",
        };
        write!(f, "{} {}", self.emoji(), label)
    }
}
