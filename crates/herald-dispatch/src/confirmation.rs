//! Pending confirmations for gated commands.
//!
//! One entry per source identity. A new request for a source replaces
//! whatever was pending for it, even when the two requests are for different
//! commands. Expiry is checked when the source confirms, and optionally by a
//! periodic [`sweep`](ConfirmationManager::sweep).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use herald_types::{Message, SourceId};

use crate::command::Command;
use crate::context::CommandContext;

/// A command invocation deferred until the source confirms it.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    pub command: Arc<Command>,
    pub context: CommandContext,
}

struct Entry {
    invocation: PendingInvocation,
    created_at: Instant,
}

pub struct ConfirmationManager {
    timeout: Duration,
    entries: Mutex<HashMap<SourceId, Entry>>,
    prompt: Message,
    no_pending: Message,
}

impl ConfirmationManager {
    pub fn new(timeout: Duration, prompt: Message, no_pending: Message) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
            prompt,
            no_pending,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SourceId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `invocation` for its source and prompt the source to confirm.
    pub fn request(&self, invocation: PendingInvocation) {
        self.request_at(invocation, Instant::now());
    }

    pub(crate) fn request_at(&self, invocation: PendingInvocation, now: Instant) {
        let source = invocation.context.source().clone();
        let replaced = self.entries().insert(
            source.id(),
            Entry {
                invocation,
                created_at: now,
            },
        );
        if let Some(old) = replaced {
            log::debug!(
                "confirmation for '{}' by {} replaced",
                old.invocation.context.input(),
                source.name()
            );
        }
        source.send_message(self.prompt.clone());
    }

    /// Take the pending invocation for `id` if it has not expired.
    ///
    /// The entry is removed either way. Returns `None` without notifying
    /// anyone; [`confirm`](Self::confirm) is the notifying form.
    pub fn take(&self, id: SourceId) -> Option<PendingInvocation> {
        self.take_at(id, Instant::now())
    }

    pub(crate) fn take_at(&self, id: SourceId, now: Instant) -> Option<PendingInvocation> {
        let entry = self.entries().remove(&id)?;
        if now.saturating_duration_since(entry.created_at) < self.timeout {
            Some(entry.invocation)
        } else {
            log::debug!(
                "confirmation for '{}' expired",
                entry.invocation.context.input()
            );
            None
        }
    }

    /// Take the pending invocation for the context's source, or tell the
    /// source there is nothing to confirm.
    pub fn confirm(&self, ctx: &CommandContext) -> Option<PendingInvocation> {
        self.confirm_at(ctx, Instant::now())
    }

    pub(crate) fn confirm_at(&self, ctx: &CommandContext, now: Instant) -> Option<PendingInvocation> {
        let taken = self.take_at(ctx.source().id(), now);
        if taken.is_none() {
            ctx.reply(self.no_pending.clone());
        }
        taken
    }

    /// Evict expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.created_at) < self.timeout);
        before - entries.len()
    }

    pub fn pending_count(&self) -> usize {
        self.entries().len()
    }

    pub fn has_pending(&self, id: SourceId) -> bool {
        self.entries().contains_key(&id)
    }
}

impl std::fmt::Debug for ConfirmationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationManager")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use crate::source::CommandSource;
    use crate::test_support::{console, player};
    use herald_platform::MemoryHost;

    fn manager() -> ConfirmationManager {
        ConfirmationManager::new(
            Duration::from_secs(30),
            Message::info("confirm please"),
            Message::warning("nothing pending"),
        )
    }

    fn invocation(source: &CommandSource, path: &str) -> PendingInvocation {
        let command = CommandSpec::new(path).handler(|_| Ok(())).build().unwrap();
        PendingInvocation {
            command: Arc::new(command),
            context: CommandContext::new(source.clone(), path),
        }
    }

    #[test]
    fn request_prompts_and_confirm_takes() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let m = manager();
        m.request(invocation(&ada, "purge"));
        assert!(m.has_pending(ada.id()));
        assert_eq!(host.messages_for(ada.source())[0].text, "confirm please");

        let ctx = CommandContext::new(ada.clone(), "confirm");
        let taken = m.confirm(&ctx).expect("pending");
        assert_eq!(taken.command.path(), "purge");
        assert_eq!(m.pending_count(), 0);
        assert!(m.confirm(&ctx).is_none());
        let messages = host.messages_for(ada.source());
        assert_eq!(messages.last().unwrap().text, "nothing pending");
    }

    #[test]
    fn expired_entry_is_removed_and_reported() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let m = manager();
        let start = Instant::now();
        m.request_at(invocation(&ada, "purge"), start);
        let ctx = CommandContext::new(ada.clone(), "confirm");
        assert!(m.confirm_at(&ctx, start + Duration::from_secs(30)).is_none());
        assert_eq!(m.pending_count(), 0);
        assert_eq!(host.messages_for(ada.source()).len(), 2);
    }

    #[test]
    fn just_before_timeout_still_confirms() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let m = manager();
        let start = Instant::now();
        m.request_at(invocation(&ada, "purge"), start);
        assert!(m.take_at(ada.id(), start + Duration::from_millis(29_999)).is_some());
    }

    #[test]
    fn second_request_overwrites_first() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let m = manager();
        m.request(invocation(&ada, "purge"));
        m.request(invocation(&ada, "reset"));
        assert_eq!(m.pending_count(), 1);
        assert_eq!(m.take(ada.id()).unwrap().command.path(), "reset");
        assert!(m.take(ada.id()).is_none());
    }

    #[test]
    fn sources_are_independent() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let root = console(&host);
        let m = manager();
        m.request(invocation(&ada, "purge"));
        m.request(invocation(&root, "reset"));
        assert_eq!(m.take(root.id()).unwrap().command.path(), "reset");
        assert_eq!(m.take(ada.id()).unwrap().command.path(), "purge");
    }

    #[test]
    fn sweep_evicts_only_expired() {
        let host = Arc::new(MemoryHost::new());
        let m = manager();
        let start = Instant::now();
        m.request_at(invocation(&player(&host, 1, "Ada"), "a"), start);
        m.request_at(
            invocation(&player(&host, 2, "Grace"), "b"),
            start + Duration::from_secs(20),
        );
        assert_eq!(m.sweep_at(start + Duration::from_secs(35)), 1);
        assert!(m.has_pending(SourceId::from_u128(2)));
        assert!(!m.has_pending(SourceId::from_u128(1)));
    }

    #[test]
    fn racing_confirms_take_at_most_once() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        let m = Arc::new(manager());
        m.request(invocation(&ada, "purge"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                let id = ada.id();
                std::thread::spawn(move || m.take(id).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn racing_request_and_confirm_settle_to_one_outcome() {
        let host = Arc::new(MemoryHost::new());
        let ada = player(&host, 1, "Ada");
        for _ in 0..200 {
            let m = Arc::new(manager());
            let now = Instant::now();
            m.request_at(invocation(&ada, "old"), now);

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let requester = {
                let (m, barrier, ada) = (Arc::clone(&m), Arc::clone(&barrier), ada.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    m.request_at(invocation(&ada, "new"), now);
                })
            };
            let confirmer = {
                let (m, barrier, ada) = (Arc::clone(&m), Arc::clone(&barrier), ada.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    let ctx = CommandContext::new(ada, "confirm");
                    m.confirm_at(&ctx, now)
                        .map(|taken| taken.command.path().to_string())
                })
            };
            requester.join().unwrap();
            let taken = confirmer.join().unwrap().expect("an entry was always pending");

            match taken.as_str() {
                // Confirm ran first: the new request is still waiting.
                "old" => assert_eq!(m.take_at(ada.id(), now).unwrap().command.path(), "new"),
                // Request ran first: the old entry was discarded unseen.
                "new" => assert_eq!(m.pending_count(), 0),
                other => panic!("unexpected invocation {other}"),
            }
        }
    }
}
