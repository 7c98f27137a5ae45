//! Shared provider identifiers used across all byokay crates.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// The closed set of AI providers a user can store a key for.
///
/// The serialized form of each variant is its stable string id (`openai`,
/// `claude`, ...), used as the map key everywhere: in controller state, in
/// the persisted key store namespace, and at the host boundary. Adding a
/// variant extends the set; ids of existing variants never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Openai,
    Claude,
    Gemini,
    Grok,
    Deepseek,
    Llama,
}

/// A string that is not the id of any known provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl ProviderId {
    /// Every provider, in the order the UI lists them.
    pub const ALL: [Self; 6] = [
        Self::Openai,
        Self::Claude,
        Self::Gemini,
        Self::Grok,
        Self::Deepseek,
        Self::Llama,
    ];

    /// The stable string id.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Grok => "grok",
            Self::Deepseek => "deepseek",
            Self::Llama => "llama",
        }
    }

    /// Human-readable name for rendering provider rows.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Openai => "OpenAI",
            Self::Claude => "Anthropic Claude",
            Self::Gemini => "Google Gemini",
            Self::Grok => "xAI Grok",
            Self::Deepseek => "DeepSeek",
            Self::Llama => "Meta Llama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}
