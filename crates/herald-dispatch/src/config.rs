//! Dispatcher configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use std::path::Path;
use std::time::Duration;

use herald_types::{HeraldError, Message, Result, Tone};
use serde::Deserialize;

/// Tunables for a [`CommandManager`](crate::CommandManager).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker pool size. `None` uses the number of available CPUs.
    pub worker_threads: Option<usize>,
    /// How long a pending confirmation stays valid.
    pub confirmation_timeout_secs: u64,
    /// When set, expired confirmations are also evicted on this interval.
    pub confirmation_sweep_secs: Option<u64>,
    /// Name of the command that confirms a pending action.
    pub confirm_literal: String,
    /// Column width of operator reports.
    pub report_width: usize,
    /// Optional prefix decorating every user-facing message.
    pub prefix: Option<String>,
    pub messages: Messages,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            confirmation_timeout_secs: 30,
            confirmation_sweep_secs: None,
            confirm_literal: "confirm".to_string(),
            report_width: 80,
            prefix: None,
            messages: Messages::default(),
        }
    }
}

/// User-facing strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub confirm_prompt: String,
    pub no_pending: String,
    pub internal_error: String,
    pub no_permission: String,
    pub not_a_player: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            confirm_prompt: "Click to confirm action!".to_string(),
            no_pending: "No pending confirmations available...".to_string(),
            internal_error: "An internal error occurred while attempting to perform this command..."
                .to_string(),
            no_permission: "I'm sorry, but you do not have permission to perform this command."
                .to_string(),
            not_a_player: "This command can only be run by a player.".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| HeraldError::Config(format!("herald.toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| HeraldError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(HeraldError::Config("worker_threads must be at least 1".into()));
        }
        if self.confirm_literal.trim().is_empty() || self.confirm_literal.contains(char::is_whitespace)
        {
            return Err(HeraldError::Config(
                "confirm_literal must be a single word".into(),
            ));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(HeraldError::Config(
                "confirmation_timeout_secs must be at least 1".into(),
            ));
        }
        if self.confirmation_sweep_secs == Some(0) {
            return Err(HeraldError::Config(
                "confirmation_sweep_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolved worker pool size.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn confirmation_sweep(&self) -> Option<Duration> {
        self.confirmation_sweep_secs.map(Duration::from_secs)
    }

    /// A user-facing message, decorated with the configured prefix.
    pub fn message(&self, text: &str, tone: Tone) -> Message {
        let message = Message::new(text, tone);
        match &self.prefix {
            Some(prefix) => message.prefixed(prefix),
            None => message,
        }
    }
}
