//! Resolved invocation context handed to command handlers.

use std::collections::BTreeMap;

use anyhow::{Context as _, anyhow};
use herald_types::{Message, SourceId};

use crate::grammar::{IntRange, Value};
use crate::source::CommandSource;

/// Everything a handler knows about one invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    source: CommandSource,
    input: String,
    suggestions: bool,
    values: BTreeMap<String, Value>,
}

impl CommandContext {
    pub fn new(source: CommandSource, input: impl Into<String>) -> Self {
        Self {
            source,
            input: input.into(),
            suggestions: false,
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn for_suggestions(mut self) -> Self {
        self.suggestions = true;
        self
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn source(&self) -> &CommandSource {
        &self.source
    }

    /// The raw input that produced this context.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_suggestion(&self) -> bool {
        self.suggestions
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// String argument. Any value kind is accepted and rendered as text.
    pub fn str(&self, name: &str) -> anyhow::Result<String> {
        self.get(name)
            .map(ToString::to_string)
            .with_context(|| format!("missing argument '{name}'"))
    }

    pub fn int(&self, name: &str) -> anyhow::Result<i64> {
        match self.get(name) {
            Some(Value::Int(v)) => Ok(*v),
            other => Err(type_mismatch(name, "int", other)),
        }
    }

    pub fn float(&self, name: &str) -> anyhow::Result<f64> {
        match self.get(name) {
            Some(Value::Float(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as f64),
            other => Err(type_mismatch(name, "float", other)),
        }
    }

    pub fn bool(&self, name: &str) -> anyhow::Result<bool> {
        match self.get(name) {
            Some(Value::Bool(v)) => Ok(*v),
            other => Err(type_mismatch(name, "bool", other)),
        }
    }

    pub fn range(&self, name: &str) -> anyhow::Result<IntRange> {
        match self.get(name) {
            Some(Value::Range(r)) => Ok(*r),
            other => Err(type_mismatch(name, "int_range", other)),
        }
    }

    pub fn id(&self, name: &str) -> anyhow::Result<SourceId> {
        match self.get(name) {
            Some(Value::Id(id)) => Ok(*id),
            other => Err(type_mismatch(name, "id", other)),
        }
    }

    /// Send a message back to whoever issued the command.
    pub fn reply(&self, message: impl Into<Message>) {
        self.source.send_message(message);
    }

    /// Resolved values rendered as text, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

fn type_mismatch(name: &str, expected: &str, found: Option<&Value>) -> anyhow::Error {
    match found {
        None => anyhow!("missing argument '{name}'"),
        Some(v) => anyhow!("argument '{name}' is not {expected}: {v:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::player;
    use herald_platform::MemoryHost;
    use std::sync::Arc;

    fn ctx() -> (CommandContext, Arc<MemoryHost>) {
        let host = Arc::new(MemoryHost::new());
        let mut ctx = CommandContext::new(player(&host, 1, "Ada"), "give Ada 5");
        ctx.insert("target", Value::Str("Ada".into()));
        ctx.insert("amount", Value::Int(5));
        (ctx, host)
    }

    #[test]
    fn typed_getters() {
        let (ctx, _) = ctx();
        assert_eq!(ctx.str("target").unwrap(), "Ada");
        assert_eq!(ctx.int("amount").unwrap(), 5);
        assert_eq!(ctx.float("amount").unwrap(), 5.0);
        assert_eq!(ctx.str("amount").unwrap(), "5");
    }

    #[test]
    fn getter_errors_name_the_argument() {
        let (ctx, _) = ctx();
        let err = ctx.int("target").unwrap_err();
        assert!(err.to_string().contains("'target' is not int"));
        let err = ctx.bool("missing").unwrap_err();
        assert_eq!(err.to_string(), "missing argument 'missing'");
    }

    #[test]
    fn snapshot_is_sorted() {
        let (ctx, _) = ctx();
        assert_eq!(
            ctx.snapshot(),
            vec![
                ("amount".to_string(), "5".to_string()),
                ("target".to_string(), "Ada".to_string()),
            ]
        );
    }

    #[test]
    fn reply_reaches_the_source() {
        let (ctx, host) = ctx();
        ctx.reply("done");
        assert_eq!(host.messages_for(ctx.source().source())[0].text, "done");
        assert!(!ctx.is_suggestion());
        assert!(ctx.clone().for_suggestions().is_suggestion());
    }
}
