//! Error types for herald.

use std::fmt;
use std::io;

/// Errors produced by the herald framework.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    /// Input did not match the command grammar.
    #[error("parse error at token {position}: {message}")]
    Parse { position: usize, message: String },

    /// The source lacks the permission required by the matched command.
    #[error("no permission to run '{command}'")]
    NoPermission { command: String },

    #[error("duplicate command: {0}")]
    DuplicateCommand(String),

    #[error("command registration is locked")]
    RegistrationLocked,

    #[error("command execution failed: {0}")]
    CommandExecution(Box<ExecutionFailure>),

    #[error("'{0}' is not a player")]
    NotAPlayer(String),

    /// A command path spec could not be read.
    #[error("invalid command syntax: {0}")]
    InvalidSyntax(String),

    #[error("unknown argument grammar: {0}")]
    UnknownGrammar(String),

    #[error("dispatcher has shut down")]
    Shutdown,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HeraldError {
    /// Shorthand for a parse error at the given token position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// The fieldless kind of this error, used to select an exception handler.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::NoPermission { .. } => ErrorKind::NoPermission,
            Self::DuplicateCommand(_) => ErrorKind::DuplicateCommand,
            Self::RegistrationLocked => ErrorKind::RegistrationLocked,
            Self::CommandExecution(_) => ErrorKind::CommandExecution,
            Self::NotAPlayer(_) => ErrorKind::NotAPlayer,
            Self::InvalidSyntax(_) => ErrorKind::InvalidSyntax,
            Self::UnknownGrammar(_) => ErrorKind::UnknownGrammar,
            Self::Shutdown => ErrorKind::Shutdown,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::TomlParse(_) => ErrorKind::TomlParse,
            Self::Json(_) => ErrorKind::Json,
        }
    }

    /// The wrapped execution failure, if this is one.
    pub fn execution_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::CommandExecution(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Discriminant of [`HeraldError`], one per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Parse,
    NoPermission,
    DuplicateCommand,
    RegistrationLocked,
    CommandExecution,
    NotAPlayer,
    InvalidSyntax,
    UnknownGrammar,
    Shutdown,
    Config,
    Io,
    TomlParse,
    Json,
}

/// A command handler failed (returned an error or panicked).
///
/// Carries everything the operator report needs: the raw input, whether the
/// failure happened during a suggestion pass, the resolved context at the
/// time of failure, and the underlying cause chain.
pub struct ExecutionFailure {
    /// Raw input that triggered the command.
    pub input: String,
    /// `true` when the failure happened while computing suggestions.
    pub suggestions: bool,
    /// Resolved context values, sorted by key.
    pub context: Vec<(String, String)>,
    /// The underlying cause.
    pub cause: anyhow::Error,
}

impl ExecutionFailure {
    /// Render the full cause chain, one cause per line.
    ///
    /// Includes a backtrace when one was captured (`RUST_BACKTRACE`).
    pub fn trace(&self) -> String {
        format!("{:?}", self.cause).replace('\t', "    ")
    }
}

impl fmt::Debug for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionFailure")
            .field("input", &self.input)
            .field("suggestions", &self.suggestions)
            .field("context", &self.context)
            .field("cause", &format_args!("{:#}", self.cause))
            .finish()
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause: &(dyn std::error::Error + 'static) = self.cause.as_ref();
        Some(cause)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(cause: anyhow::Error) -> ExecutionFailure {
        ExecutionFailure {
            input: "boom".into(),
            suggestions: false,
            context: vec![("target".into(), "Ada".into())],
            cause,
        }
    }

    #[test]
    fn parse_error_display() {
        let e = HeraldError::parse(2, "expected integer");
        assert_eq!(format!("{e}"), "parse error at token 2: expected integer");
    }

    #[test]
    fn no_permission_display() {
        let e = HeraldError::NoPermission {
            command: "ban".into(),
        };
        assert_eq!(format!("{e}"), "no permission to run 'ban'");
    }

    #[test]
    fn duplicate_command_display() {
        let e = HeraldError::DuplicateCommand("greet <name>".into());
        assert_eq!(format!("{e}"), "duplicate command: greet <name>");
    }

    #[test]
    fn not_a_player_display() {
        let e = HeraldError::NotAPlayer("Console".into());
        assert_eq!(format!("{e}"), "'Console' is not a player");
    }

    #[test]
    fn execution_failure_display_uses_cause() {
        let e = HeraldError::CommandExecution(Box::new(failure(anyhow::anyhow!("kaboom"))));
        assert_eq!(format!("{e}"), "command execution failed: kaboom");
    }

    #[test]
    fn execution_failure_keeps_cause_chain() {
        let cause = anyhow::anyhow!("disk full").context("saving player data");
        let f = failure(cause);
        let trace = f.trace();
        assert!(trace.contains("saving player data"));
        assert!(trace.contains("disk full"));
        let source = std::error::Error::source(&f).expect("cause attached");
        assert_eq!(source.to_string(), "saving player data");
    }

    #[test]
    fn kinds_match_variants() {
        assert_eq!(HeraldError::parse(0, "x").kind(), ErrorKind::Parse);
        assert_eq!(HeraldError::RegistrationLocked.kind(), ErrorKind::RegistrationLocked);
        assert_eq!(HeraldError::Shutdown.kind(), ErrorKind::Shutdown);
        assert_eq!(
            HeraldError::NotAPlayer("x".into()).kind(),
            ErrorKind::NotAPlayer
        );
        let exec = HeraldError::CommandExecution(Box::new(failure(anyhow::anyhow!("x"))));
        assert_eq!(exec.kind(), ErrorKind::CommandExecution);
        assert!(exec.execution_failure().is_some());
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: HeraldError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: HeraldError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: HeraldError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }

    #[test]
    fn result_alias_err() {
        let r: Result<i32> = Err(HeraldError::Config("oops".into()));
        assert!(r.is_err());
    }
}
