//! Command definitions and the builder used to register them.

use std::fmt;
use std::sync::Arc;

use herald_types::{HeraldError, Result};

use crate::context::CommandContext;
use crate::permission::Permission;
use crate::syntax::{ComponentSpec, parse_path};

/// A command's body.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()>;
}

impl<F> CommandHandler for F
where
    F: Fn(&CommandContext) -> anyhow::Result<()> + Send + Sync,
{
    fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Which kinds of source may run a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    Any,
    /// Non-players are rejected with `NotAPlayer`.
    PlayerOnly,
    /// Everyone but the console is rejected with `NoPermission`.
    ConsoleOnly,
}

/// Per-command metadata.
#[derive(Debug, Clone, Default)]
pub struct CommandMeta {
    pub description: Option<String>,
    /// Run only after the source re-invokes the confirmation trigger.
    pub confirmation: bool,
    pub scope: Scope,
}

#[derive(Clone)]
pub(crate) enum Action {
    Handler(Arc<dyn CommandHandler>),
    /// The built-in confirmation command.
    ConfirmTrigger,
}

/// A registered command.
pub struct Command {
    pub(crate) path: String,
    pub(crate) components: Vec<ComponentSpec>,
    pub(crate) permission: Permission,
    pub(crate) meta: CommandMeta,
    pub(crate) action: Action,
}

impl Command {
    pub(crate) fn confirm_trigger(literal: &str) -> Result<Self> {
        Ok(Self {
            path: literal.to_string(),
            components: parse_path(literal)?,
            permission: Permission::Empty,
            meta: CommandMeta {
                description: Some("Confirm a pending command".to_string()),
                ..CommandMeta::default()
            },
            action: Action::ConfirmTrigger,
        })
    }

    /// The path spec the command was registered with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    pub fn permission(&self) -> &Permission {
        &self.permission
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn requires_confirmation(&self) -> bool {
        self.meta.confirmation
    }

    /// Usage line such as `give <target:id> [note:greedy]`.
    pub fn usage(&self) -> String {
        self.components
            .iter()
            .map(ComponentSpec::usage)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn run(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        match &self.action {
            Action::Handler(handler) => handler.execute(ctx),
            Action::ConfirmTrigger => Ok(()),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("path", &self.path)
            .field("permission", &self.permission)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Builder for a command registration.
///
/// ```ignore
/// manager.register(
///     CommandSpec::new("greet <name>")
///         .permission("herald.greet")
///         .handler(|ctx| {
///             ctx.reply(format!("Hello, {}!", ctx.str("name")?));
///             Ok(())
///         }),
/// )?;
/// ```
pub struct CommandSpec {
    path: String,
    permission: Permission,
    meta: CommandMeta,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permission: Permission::Empty,
            meta: CommandMeta::default(),
            handler: None,
        }
    }

    pub fn permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permission = permission.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn confirmation(mut self, required: bool) -> Self {
        self.meta.confirmation = required;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.meta.scope = scope;
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Use a named [`CommandHandler`] implementation instead of a closure.
    pub fn executor(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validate the path and produce the command.
    pub fn build(self) -> Result<Command> {
        let components = parse_path(&self.path)?;
        let handler = self.handler.ok_or_else(|| {
            HeraldError::InvalidSyntax(format!("'{}' has no handler", self.path))
        })?;
        Ok(Command {
            path: self.path,
            components,
            permission: self.permission,
            meta: self.meta,
            action: Action::Handler(handler),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_meta() {
        let cmd = CommandSpec::new("purge <count:int>")
            .permission("herald.purge")
            .description("Delete things")
            .confirmation(true)
            .scope(Scope::PlayerOnly)
            .handler(|_| Ok(()))
            .build()
            .unwrap();
        assert!(cmd.requires_confirmation());
        assert_eq!(cmd.meta().scope, Scope::PlayerOnly);
        assert_eq!(cmd.meta().description.as_deref(), Some("Delete things"));
        assert_eq!(cmd.permission().to_string(), "herald.purge");
        assert_eq!(cmd.usage(), "purge <count:int>");
    }

    #[test]
    fn handler_is_required() {
        let err = CommandSpec::new("greet").build().unwrap_err();
        assert!(matches!(err, HeraldError::InvalidSyntax(_)));
    }

    #[test]
    fn bad_path_is_rejected() {
        let err = CommandSpec::new("<x>")
            .handler(|_| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, HeraldError::InvalidSyntax(_)));
    }

    #[test]
    fn named_executor() {
        struct Noop;
        impl CommandHandler for Noop {
            fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
                Ok(())
            }
        }
        let cmd = CommandSpec::new("noop").executor(Noop).build().unwrap();
        assert!(matches!(cmd.action, Action::Handler(_)));
    }

    #[test]
    fn confirm_trigger_is_a_noop_command() {
        let cmd = Command::confirm_trigger("confirm").unwrap();
        assert!(matches!(cmd.action, Action::ConfirmTrigger));
        assert!(cmd.permission().is_empty());
    }
}
