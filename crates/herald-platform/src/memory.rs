//! In-memory host implementation.
//!
//! Useful for unit tests and the console demo. Permission grants, delivered
//! messages, permission checks and diagnostic reports are all recorded so
//! tests can assert on them.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use herald_types::{Message, PlatformSource};

use crate::services::{DiagnosticSink, MessageService, PermissionService, ReportLevel};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fully in-memory host.
///
/// The console holds every permission; other sources hold only what was
/// explicitly granted.
#[derive(Debug, Default)]
pub struct MemoryHost {
    grants: Mutex<HashMap<PlatformSource, HashSet<String>>>,
    messages: Mutex<Vec<(PlatformSource, Message)>>,
    checks: Mutex<Vec<String>>,
    echo: bool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print every delivered message to stdout.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn grant(&self, detail: PlatformSource, permission: &str) {
        lock(&self.grants)
            .entry(detail)
            .or_default()
            .insert(permission.to_string());
    }

    pub fn revoke(&self, detail: PlatformSource, permission: &str) {
        if let Some(set) = lock(&self.grants).get_mut(&detail) {
            set.remove(permission);
        }
    }

    /// Every message delivered to `detail`, oldest first.
    pub fn messages_for(&self, detail: &PlatformSource) -> Vec<Message> {
        lock(&self.messages)
            .iter()
            .filter(|(to, _)| to == detail)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Total number of messages delivered.
    pub fn message_count(&self) -> usize {
        lock(&self.messages).len()
    }

    /// Permission strings checked so far, in order.
    pub fn checks(&self) -> Vec<String> {
        lock(&self.checks).clone()
    }

    pub fn clear(&self) {
        lock(&self.messages).clear();
        lock(&self.checks).clear();
    }
}

impl PermissionService for MemoryHost {
    fn check_permission(&self, detail: &PlatformSource, permission: &str) -> bool {
        lock(&self.checks).push(permission.to_string());
        if detail.is_console() {
            return true;
        }
        lock(&self.grants)
            .get(detail)
            .is_some_and(|set| set.contains(permission))
    }
}

impl MessageService for MemoryHost {
    fn send_message(&self, detail: &PlatformSource, message: &Message) {
        if self.echo {
            println!("[{detail}] {message}");
        }
        lock(&self.messages).push((*detail, message.clone()));
    }
}

/// A diagnostic sink that keeps every report.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<(ReportLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(ReportLevel, String)> {
        lock(&self.reports).clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, level: ReportLevel, text: &str) {
        lock(&self.reports).push((level, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_types::SourceId;

    fn player(n: u128) -> PlatformSource {
        PlatformSource::Player(SourceId::from_u128(n))
    }

    #[test]
    fn console_holds_everything() {
        let host = MemoryHost::new();
        assert!(host.check_permission(&PlatformSource::Console, "anything.at.all"));
    }

    #[test]
    fn grant_and_revoke() {
        let host = MemoryHost::new();
        let p = player(1);
        assert!(!host.check_permission(&p, "herald.greet"));
        host.grant(p, "herald.greet");
        assert!(host.check_permission(&p, "herald.greet"));
        assert!(!host.check_permission(&player(2), "herald.greet"));
        host.revoke(p, "herald.greet");
        assert!(!host.check_permission(&p, "herald.greet"));
        assert_eq!(host.checks().len(), 4);
    }

    #[test]
    fn messages_are_recorded_per_source() {
        let host = MemoryHost::new();
        host.send_message(&player(1), &Message::info("one"));
        host.send_message(&player(2), &Message::info("two"));
        host.send_message(&player(1), &Message::info("three"));
        let texts: Vec<String> = host
            .messages_for(&player(1))
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "three"]);
        assert_eq!(host.message_count(), 3);
        host.clear();
        assert_eq!(host.message_count(), 0);
    }

    #[test]
    fn sink_keeps_reports() {
        let sink = MemorySink::new();
        sink.report(ReportLevel::Error, "boom");
        assert_eq!(sink.reports(), vec![(ReportLevel::Error, "boom".to_string())]);
    }
}
