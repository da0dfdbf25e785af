//! User-facing messages delivered to command sources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Colour hint for a message. Hosts map this onto whatever styling they have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// A line of text for a command source.
///
/// `detail` is auxiliary content the host may show on demand (a hover
/// tooltip, a click-to-copy payload) instead of inlining it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Message {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
            detail: None,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Info)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Success)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Error)
    }

    /// Attach auxiliary detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Decorate the text as `"<prefix> » <text>"`.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.text = format!("{prefix} \u{bb} {}", self.text);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::info(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::info(text)
    }
}
