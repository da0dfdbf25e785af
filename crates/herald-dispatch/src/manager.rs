//! The command manager: registration, locking, and asynchronous dispatch.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use herald_platform::{DiagnosticSink, LogSink};
use herald_types::{ErrorKind, ExecutionFailure, HeraldError, Result, Tone};

use crate::command::{Action, Command, CommandSpec, Scope};
use crate::config::DispatchConfig;
use crate::confirmation::{ConfirmationManager, PendingInvocation};
use crate::context::CommandContext;
use crate::funnel::ExceptionFunnel;
use crate::grammar::GrammarRegistry;
use crate::pool::{Pending, WorkerPool, panic_message};
use crate::source::{CommandSource, SenderTranslator};
use crate::syntax::tokenize;
use crate::tree::{CommandTree, Resolved};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a dispatch did when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion.
    Executed,
    /// The command is gated; the source was asked to confirm.
    AwaitingConfirmation,
    /// The confirmation command ran with nothing pending.
    NoPendingConfirmation,
}

/// State shared with worker jobs.
struct Core {
    confirmations: ConfirmationManager,
    funnel: ExceptionFunnel,
}

impl Core {
    fn dispatch(&self, tree: &CommandTree, input: &str, source: CommandSource) -> Result<DispatchOutcome> {
        // Handler panics are caught in `invoke`; this catches the rest
        // (argument parsers, permission predicates, host services).
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(tree, input, &source)))
            .unwrap_or_else(|payload| {
                let ctx = CommandContext::new(source.clone(), input);
                Err(failure(
                    &ctx,
                    anyhow::anyhow!("dispatch panicked: {}", panic_message(&*payload)),
                ))
            });
        match &result {
            Ok(outcome) => log::trace!("'{input}' by {}: {outcome:?}", source.name()),
            Err(err) => {
                log::debug!("'{input}' by {} failed: {err}", source.name());
                self.funnel.handle(&source, err);
            },
        }
        result
    }

    fn run(&self, tree: &CommandTree, input: &str, source: &CommandSource) -> Result<DispatchOutcome> {
        let tokens = tokenize(input)?;
        let Resolved { command, values } = tree.resolve(input, &tokens)?;
        check_access(&command, source)?;

        let mut ctx = CommandContext::new(source.clone(), input);
        for (name, value) in values {
            ctx.insert(&name, value);
        }

        if matches!(command.action, Action::ConfirmTrigger) {
            return match self.confirmations.confirm(&ctx) {
                Some(pending) => {
                    invoke(&pending.command, &pending.context)?;
                    Ok(DispatchOutcome::Executed)
                },
                None => Ok(DispatchOutcome::NoPendingConfirmation),
            };
        }
        if command.requires_confirmation() {
            self.confirmations.request(PendingInvocation { command, context: ctx });
            return Ok(DispatchOutcome::AwaitingConfirmation);
        }
        invoke(&command, &ctx)?;
        Ok(DispatchOutcome::Executed)
    }

    fn suggest(&self, tree: &CommandTree, input: &str, source: CommandSource) -> Result<Vec<String>> {
        match panic::catch_unwind(AssertUnwindSafe(|| tree.suggest(input, &source))) {
            Ok(suggestions) => Ok(suggestions),
            Err(payload) => {
                let ctx = CommandContext::new(source.clone(), input).for_suggestions();
                let err = failure(
                    &ctx,
                    anyhow::anyhow!("suggestion provider panicked: {}", panic_message(&*payload)),
                );
                self.funnel.handle(&source, &err);
                Err(err)
            },
        }
    }
}

fn check_access(command: &Command, source: &CommandSource) -> Result<()> {
    match command.meta.scope {
        Scope::PlayerOnly if !source.source().is_player() => {
            return Err(HeraldError::NotAPlayer(source.name().to_string()));
        },
        Scope::ConsoleOnly if !source.source().is_console() => {
            return Err(HeraldError::NoPermission {
                command: command.path.clone(),
            });
        },
        _ => {},
    }
    if command.permission.evaluate(source) {
        Ok(())
    } else {
        Err(HeraldError::NoPermission {
            command: command.path.clone(),
        })
    }
}

/// Run a handler, turning errors and panics into `CommandExecution`.
///
/// A handler that fails by narrowing its source to a player surfaces as
/// `NotAPlayer` rather than as an execution failure.
fn invoke(command: &Command, ctx: &CommandContext) -> Result<()> {
    let cause = match panic::catch_unwind(AssertUnwindSafe(|| command.run(ctx))) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(cause)) => {
            if let Some(HeraldError::NotAPlayer(name)) = cause.downcast_ref::<HeraldError>() {
                return Err(HeraldError::NotAPlayer(name.clone()));
            }
            cause
        },
        Err(payload) => anyhow::anyhow!("handler panicked: {}", panic_message(&*payload)),
    };
    Err(failure(ctx, cause))
}

fn failure(ctx: &CommandContext, cause: anyhow::Error) -> HeraldError {
    HeraldError::CommandExecution(Box::new(ExecutionFailure {
        input: ctx.input().to_string(),
        suggestions: ctx.is_suggestion(),
        context: ctx.snapshot(),
        cause,
    }))
}

struct Sweeper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Registers commands and dispatches input to them on a worker pool.
///
/// Registration is open until the first dispatch or suggestion, or until
/// [`lock_registration`](Self::lock_registration) is called. After that the
/// tree is shared read-only between workers and further registration fails
/// with `RegistrationLocked`.
pub struct CommandManager<T: SenderTranslator> {
    translator: T,
    core: Arc<Core>,
    staging: Mutex<Option<CommandTree>>,
    locked: OnceLock<Arc<CommandTree>>,
    pool: WorkerPool,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<T: SenderTranslator> CommandManager<T> {
    pub fn builder(translator: T) -> CommandManagerBuilder<T> {
        CommandManagerBuilder {
            translator,
            config: DispatchConfig::default(),
            grammars: GrammarRegistry::new(),
            sink: Arc::new(LogSink),
            default_handlers: true,
        }
    }

    /// A manager with default config, grammars, and handlers.
    pub fn new(translator: T) -> Result<Self> {
        Self::builder(translator).build()
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    pub fn confirmations(&self) -> &ConfirmationManager {
        &self.core.confirmations
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.size()
    }

    /// Add a command. Fails with `RegistrationLocked` once dispatch began,
    /// or with `DuplicateCommand` on a conflicting path; the tree is
    /// unchanged on failure.
    pub fn register(&self, spec: CommandSpec) -> Result<()> {
        let mut staging = lock(&self.staging);
        let tree = staging.as_mut().ok_or(HeraldError::RegistrationLocked)?;
        tree.insert(spec.build()?)?;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get().is_some()
    }

    /// Close registration. Irreversible; called implicitly by the first
    /// dispatch or suggestion.
    pub fn lock_registration(&self) {
        let _ = self.tree();
    }

    fn tree(&self) -> Arc<CommandTree> {
        Arc::clone(self.locked.get_or_init(|| {
            let tree = lock(&self.staging)
                .take()
                .unwrap_or_else(|| CommandTree::new(GrammarRegistry::new()));
            log::info!(
                "command registration locked with {} commands",
                tree.commands().len()
            );
            Arc::new(tree)
        }))
    }

    fn with_tree<R>(&self, f: impl FnOnce(&CommandTree) -> R) -> R {
        if let Some(tree) = self.locked.get() {
            return f(tree);
        }
        {
            let staging = lock(&self.staging);
            if let Some(tree) = staging.as_ref() {
                return f(tree);
            }
        }
        f(&self.tree())
    }

    /// Parse and run `input` for `native` on the worker pool.
    ///
    /// Returns immediately. Every failure has already been passed to the
    /// exception funnel by the time the handle resolves.
    pub fn dispatch(&self, input: &str, native: T::Native) -> Pending<DispatchOutcome> {
        let source = self.translator.translate(native);
        self.dispatch_source(input, source)
    }

    /// [`dispatch`](Self::dispatch) for an already translated source.
    pub fn dispatch_source(&self, input: &str, source: CommandSource) -> Pending<DispatchOutcome> {
        let tree = self.tree();
        let core = Arc::clone(&self.core);
        let input = input.to_string();
        self.pool.spawn(move || core.dispatch(&tree, &input, source))
    }

    /// Completion candidates for partial input, computed on the worker pool.
    pub fn suggest(&self, input: &str, native: T::Native) -> Pending<Vec<String>> {
        let source = self.translator.translate(native);
        let tree = self.tree();
        let core = Arc::clone(&self.core);
        let input = input.to_string();
        self.pool.spawn(move || core.suggest(&tree, &input, source))
    }

    /// Every permission atom reachable from a registered command.
    pub fn collect_leaf_permissions(&self) -> BTreeSet<String> {
        self.with_tree(CommandTree::collect_permissions)
    }

    /// Registered commands, sorted by path.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.with_tree(CommandTree::commands)
    }

    /// Install or replace the handler for one error kind.
    pub fn register_exception_handler<F>(&self, kind: ErrorKind, handler: F)
    where
        F: Fn(&CommandSource, &HeraldError) + Send + Sync + 'static,
    {
        self.core.funnel.register(kind, handler);
    }

    /// Stop the sweeper, finish queued work, and join the workers.
    /// Later dispatches resolve to `Shutdown`.
    pub fn shutdown(&self) {
        if let Some(sweeper) = lock(&self.sweeper).take() {
            drop(sweeper.stop);
            if sweeper.handle.join().is_err() {
                log::warn!("confirmation sweeper exited abnormally");
            }
        }
        self.pool.shutdown();
    }
}

impl<T: SenderTranslator> Drop for CommandManager<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: SenderTranslator> std::fmt::Debug for CommandManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("locked", &self.is_locked())
            .field("workers", &self.pool.size())
            .field("confirmations", &self.core.confirmations)
            .field("funnel", &self.core.funnel)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CommandManager`].
pub struct CommandManagerBuilder<T> {
    translator: T,
    config: DispatchConfig,
    grammars: GrammarRegistry,
    sink: Arc<dyn DiagnosticSink>,
    default_handlers: bool,
}

impl<T: SenderTranslator> CommandManagerBuilder<T> {
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn grammars(mut self, grammars: GrammarRegistry) -> Self {
        self.grammars = grammars;
        self
    }

    /// Where operator reports go. Defaults to [`LogSink`].
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Start with an empty exception funnel.
    pub fn without_default_handlers(mut self) -> Self {
        self.default_handlers = false;
        self
    }

    pub fn build(self) -> Result<CommandManager<T>> {
        let config = self.config;
        config.validate()?;

        let confirmations = ConfirmationManager::new(
            config.confirmation_timeout(),
            config.message(&config.messages.confirm_prompt, Tone::Info),
            config.message(&config.messages.no_pending, Tone::Warning),
        );
        let funnel = if self.default_handlers {
            ExceptionFunnel::with_defaults(&config, self.sink)
        } else {
            ExceptionFunnel::new()
        };
        let core = Arc::new(Core {
            confirmations,
            funnel,
        });

        let mut tree = CommandTree::new(self.grammars);
        tree.insert(Command::confirm_trigger(&config.confirm_literal)?)?;

        let pool = WorkerPool::new(config.worker_threads())?;
        let sweeper = match config.confirmation_sweep() {
            Some(interval) => Some(spawn_sweeper(Arc::clone(&core), interval)?),
            None => None,
        };
        log::info!(
            "command manager ready: {} workers, confirmation timeout {:?}",
            pool.size(),
            config.confirmation_timeout()
        );

        Ok(CommandManager {
            translator: self.translator,
            core,
            staging: Mutex::new(Some(tree)),
            locked: OnceLock::new(),
            pool,
            sweeper: Mutex::new(sweeper),
        })
    }
}

fn spawn_sweeper(core: Arc<Core>, interval: Duration) -> Result<Sweeper> {
    let (stop, stopped) = channel::bounded::<()>(0);
    let handle = thread::Builder::new()
        .name("herald-sweeper".to_string())
        .spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                let evicted = core.confirmations.sweep();
                if evicted > 0 {
                    log::debug!("evicted {evicted} expired confirmations");
                }
            }
        })?;
    Ok(Sweeper { stop, handle })
}
