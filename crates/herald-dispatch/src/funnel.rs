//! Routes dispatch errors to per-kind handlers.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use herald_platform::{DiagnosticSink, ReportLevel};
use herald_types::{ErrorKind, HeraldError, Tone};

use crate::config::DispatchConfig;
use crate::pool::panic_message;
use crate::printer::ExecutionReport;
use crate::source::CommandSource;

/// Reacts to one kind of error.
pub type ExceptionHandler = dyn Fn(&CommandSource, &HeraldError) + Send + Sync;

/// At most one handler per [`ErrorKind`]; registering again replaces the
/// previous handler. Errors of a kind with no handler are ignored here.
#[derive(Default)]
pub struct ExceptionFunnel {
    handlers: RwLock<HashMap<ErrorKind, Arc<ExceptionHandler>>>,
}

impl ExceptionFunnel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A funnel with the stock handlers installed.
    ///
    /// Parse, permission, and player-only failures are reported to the
    /// source. Execution failures are reported twice: a short message with
    /// the trace attached as detail goes to the source, and a boxed report
    /// goes to `sink`.
    pub fn with_defaults(config: &DispatchConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let funnel = Self::new();

        let cfg = config.clone();
        funnel.register(ErrorKind::Parse, move |source, err| {
            if let HeraldError::Parse { message, .. } = err {
                source.send_message(cfg.message(&format!("Invalid command: {message}"), Tone::Error));
            }
        });

        let no_permission = config.message(&config.messages.no_permission, Tone::Error);
        funnel.register(ErrorKind::NoPermission, move |source, _| {
            source.send_message(no_permission.clone());
        });

        let not_a_player = config.message(&config.messages.not_a_player, Tone::Error);
        funnel.register(ErrorKind::NotAPlayer, move |source, _| {
            source.send_message(not_a_player.clone());
        });

        let internal = config.message(&config.messages.internal_error, Tone::Error);
        let width = config.report_width;
        funnel.register(ErrorKind::CommandExecution, move |source, err| {
            let Some(failure) = err.execution_failure() else {
                return;
            };
            let report = ExecutionReport::new(source.name(), failure);
            // Two independent emissions; a failure in one must not block the other.
            guarded("user notice", || {
                source.send_message(internal.clone().with_detail(report.trace.clone()));
            });
            guarded("operator report", || {
                report.printer(width).log(sink.as_ref(), ReportLevel::Error);
            });
            match report.to_json() {
                Ok(json) => log::debug!("execution failure: {json}"),
                Err(e) => log::warn!("could not serialize execution report: {e}"),
            }
        });

        funnel
    }

    pub fn register<F>(&self, kind: ErrorKind, handler: F)
    where
        F: Fn(&CommandSource, &HeraldError) + Send + Sync + 'static,
    {
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, Arc::new(handler));
        if previous.is_some() {
            log::debug!("replaced exception handler for {kind:?}");
        }
    }

    pub fn unregister(&self, kind: ErrorKind) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind)
            .is_some()
    }

    pub fn has_handler(&self, kind: ErrorKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&kind)
    }

    /// Run the handler for `err`'s kind. Returns whether one ran.
    ///
    /// A panicking handler is logged and otherwise ignored.
    pub fn handle(&self, source: &CommandSource, err: &HeraldError) -> bool {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&err.kind())
            .map(Arc::clone);
        match handler {
            Some(handler) => {
                guarded("exception handler", || handler(source, err));
                true
            },
            None => {
                log::trace!("no handler for {:?}: {err}", err.kind());
                false
            },
        }
    }
}

impl std::fmt::Debug for ExceptionFunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut kinds: Vec<&ErrorKind> = handlers.keys().collect();
        kinds.sort();
        f.debug_struct("ExceptionFunnel")
            .field("handlers", &kinds)
            .finish()
    }
}

/// Run `f`, dropping any panic after logging it.
fn guarded(what: &str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        log::warn!("{what} panicked: {}", panic_message(&*payload));
    }
}
