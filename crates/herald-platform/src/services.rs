//! Host service traits and the log-backed diagnostic sink.

use std::sync::Arc;

use herald_types::{Message, PlatformSource, SourceId};

// ---------------------------------------------------------------------------
// Entity service
// ---------------------------------------------------------------------------

/// Resolves host-native invoker handles to stable identities.
pub trait EntityService: Send + Sync {
    /// The host's native "who issued this" handle.
    type Native;

    /// Stable identity of the invoker, or `None` when the handle has no
    /// entity behind it (console, RCON, scheduled task).
    fn resolve_identity(&self, native: &Self::Native) -> Option<SourceId>;

    /// Whether the handle belongs to a player.
    fn is_player(&self, native: &Self::Native) -> bool;

    /// Human-readable name for the invoker.
    fn display_name(&self, native: &Self::Native) -> String;
}

// ---------------------------------------------------------------------------
// Permission service
// ---------------------------------------------------------------------------

/// The host's permission backend.
pub trait PermissionService: Send + Sync {
    /// Whether `detail` holds `permission`. Must not have side effects
    /// visible to the dispatcher.
    fn check_permission(&self, detail: &PlatformSource, permission: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Message service
// ---------------------------------------------------------------------------

/// Delivers messages to command sources.
pub trait MessageService: Send + Sync {
    fn send_message(&self, detail: &PlatformSource, message: &Message);
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Severity of an operator-facing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warn,
    Error,
}

impl From<ReportLevel> for log::Level {
    fn from(level: ReportLevel) -> Self {
        match level {
            ReportLevel::Info => log::Level::Info,
            ReportLevel::Warn => log::Level::Warn,
            ReportLevel::Error => log::Level::Error,
        }
    }
}

/// Destination for operator-facing diagnostics (never the invoking source).
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, level: ReportLevel, text: &str);
}

/// Sink that forwards every report to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub const TARGET: &'static str = "herald::report";
}

impl DiagnosticSink for LogSink {
    fn report(&self, level: ReportLevel, text: &str) {
        log::log!(target: Self::TARGET, level.into(), "{text}");
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// The capabilities every command source carries: permission checks and
/// message delivery. Cheap to clone.
#[derive(Clone)]
pub struct HostServices {
    permissions: Arc<dyn PermissionService>,
    messages: Arc<dyn MessageService>,
}

impl HostServices {
    pub fn new(permissions: Arc<dyn PermissionService>, messages: Arc<dyn MessageService>) -> Self {
        Self {
            permissions,
            messages,
        }
    }

    /// Bundle a single value implementing both services.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: PermissionService + MessageService + 'static,
    {
        Self {
            permissions: Arc::clone(&host) as Arc<dyn PermissionService>,
            messages: host,
        }
    }

    pub fn has_permission(&self, detail: &PlatformSource, permission: &str) -> bool {
        self.permissions.check_permission(detail, permission)
    }

    pub fn send_message(&self, detail: &PlatformSource, message: &Message) {
        self.messages.send_message(detail, message);
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock host: grants everything that starts with `allow.` and records messages.
    struct MockHost {
        sent: Mutex<Vec<String>>,
    }

    impl PermissionService for MockHost {
        fn check_permission(&self, _detail: &PlatformSource, permission: &str) -> bool {
            permission.starts_with("allow.")
        }
    }

    impl MessageService for MockHost {
        fn send_message(&self, _detail: &PlatformSource, message: &Message) {
            self.sent.lock().unwrap().push(message.text.clone());
        }
    }

    #[test]
    fn host_services_delegate() {
        let host = Arc::new(MockHost {
            sent: Mutex::new(Vec::new()),
        });
        let services = HostServices::from_host(Arc::clone(&host));
        assert!(services.has_permission(&PlatformSource::Console, "allow.x"));
        assert!(!services.has_permission(&PlatformSource::Console, "deny.x"));
        services.send_message(&PlatformSource::Console, &Message::info("hi"));
        assert_eq!(*host.sent.lock().unwrap(), vec!["hi".to_string()]);
    }

    #[test]
    fn report_level_maps_to_log_level() {
        assert_eq!(log::Level::from(ReportLevel::Error), log::Level::Error);
        assert_eq!(log::Level::from(ReportLevel::Warn), log::Level::Warn);
        assert_eq!(log::Level::from(ReportLevel::Info), log::Level::Info);
    }

    #[test]
    fn log_sink_does_not_panic_without_logger() {
        LogSink.report(ReportLevel::Error, "nobody is listening");
    }
}
