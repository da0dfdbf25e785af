//! Command dispatch core.
//!
//! Commands are registered as path specs (`"give <target:id> <amount:int>"`)
//! into a prefix tree. Input is tokenized, matched against the tree, checked
//! against the command's permission expression, and executed on a worker
//! pool so the caller never blocks. Commands flagged for confirmation are
//! parked until the source re-invokes the confirm command. Every failure is
//! routed through an exception funnel that reports to the source and, for
//! execution failures, to the operator's diagnostic sink.

mod command;
mod config;
mod confirmation;
mod context;
mod funnel;
mod grammar;
mod manager;
mod permission;
mod pool;
mod printer;
mod source;
mod syntax;
mod tree;

#[cfg(test)]
pub(crate) mod test_support;

/// A registered command with its path, permission, and metadata.
pub use command::Command;
/// A command body: anything callable with a `&CommandContext`.
pub use command::CommandHandler;
/// Per-command metadata (description, confirmation, scope).
pub use command::CommandMeta;
/// Builder used to register a command.
pub use command::CommandSpec;
/// Which kinds of source may run a command.
pub use command::Scope;
/// Dispatcher tunables, loaded from TOML.
pub use config::DispatchConfig;
/// User-facing message strings.
pub use config::Messages;
/// Time-bounded store of commands awaiting confirmation.
pub use confirmation::ConfirmationManager;
/// A deferred command invocation.
pub use confirmation::PendingInvocation;
/// Resolved arguments and source for one invocation.
pub use context::CommandContext;
/// Signature of an exception handler.
pub use funnel::ExceptionHandler;
/// Per-kind error handler registry.
pub use funnel::ExceptionFunnel;
/// Parses one argument from a token stream.
pub use grammar::ArgumentParser;
/// Table from semantic type name to parser constructor.
pub use grammar::GrammarRegistry;
/// Inclusive integer range argument value.
pub use grammar::IntRange;
/// A parsed argument value.
pub use grammar::Value;
/// Registration, locking, and asynchronous dispatch.
pub use manager::CommandManager;
/// Builder for a `CommandManager`.
pub use manager::CommandManagerBuilder;
/// Non-failing result of a dispatch.
pub use manager::DispatchOutcome;
/// Composable permission expression.
pub use permission::Permission;
/// Fixed-size worker pool.
pub use pool::WorkerPool;
/// Handle to a result computed on the worker pool.
pub use pool::Pending;
/// Operator-facing summary of an execution failure.
pub use printer::ExecutionReport;
/// Boxed, word-wrapped text reports.
pub use printer::PrettyPrinter;
/// Whoever issued a command.
pub use source::CommandSource;
/// Translator backed by a host entity service.
pub use source::HostTranslator;
/// Maps host-native invoker handles to command sources and back.
pub use source::SenderTranslator;
/// Command path component (literal or argument).
pub use syntax::ComponentSpec;
/// Token of raw input with its byte offset.
pub use syntax::Token;
/// Cursor over tokens handed to argument parsers.
pub use syntax::TokenStream;
/// Split input into tokens, honoring quotes and escapes.
pub use syntax::tokenize;
/// Prefix tree of registered commands.
pub use tree::CommandTree;
