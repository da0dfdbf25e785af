//! Prefix tree of registered commands.
//!
//! Every command path is split into components; components shared between
//! paths share a node. A node is *executable* when a command is attached to
//! it: the node for the last required component and every trailing optional
//! argument after it.

use std::collections::BTreeSet;
use std::sync::Arc;

use herald_types::{HeraldError, Result};

use crate::command::{Command, Scope};
use crate::grammar::{ArgumentParser, GrammarRegistry, Value};
use crate::source::CommandSource;
use crate::syntax::{ComponentSpec, Token, TokenStream, tokenize};

pub(crate) enum NodeKind {
    Root,
    Literal {
        name: String,
        aliases: Vec<String>,
    },
    Argument {
        name: String,
        kind: String,
        optional: bool,
        parser: Arc<dyn ArgumentParser>,
    },
}

impl NodeKind {
    fn build(spec: &ComponentSpec, grammars: &GrammarRegistry) -> Result<Self> {
        Ok(match spec {
            ComponentSpec::Literal { name, aliases } => Self::Literal {
                name: name.clone(),
                aliases: aliases.clone(),
            },
            ComponentSpec::Argument {
                name,
                kind,
                optional,
            } => Self::Argument {
                name: name.clone(),
                kind: kind.clone(),
                optional: *optional,
                parser: grammars.create(kind)?,
            },
        })
    }

    fn usage(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Literal { name, .. } => name.clone(),
            Self::Argument {
                name,
                kind,
                optional: false,
                ..
            } => format!("<{name}:{kind}>"),
            Self::Argument { name, kind, .. } => format!("[{name}:{kind}]"),
        }
    }

    fn accepts_literal(&self, token: &str) -> bool {
        match self {
            Self::Literal { name, aliases } => {
                name.eq_ignore_ascii_case(token) || aliases.iter().any(|a| a.eq_ignore_ascii_case(token))
            },
            _ => false,
        }
    }

    /// Same component: the node can be reused for `spec`.
    fn same_as(&self, spec: &ComponentSpec) -> bool {
        match (self, spec) {
            (Self::Literal { name, .. }, ComponentSpec::Literal { name: n, .. }) => name == n,
            (
                Self::Argument {
                    name,
                    kind,
                    optional,
                    ..
                },
                ComponentSpec::Argument {
                    name: n,
                    kind: k,
                    optional: o,
                },
            ) => name == n && kind == k && optional == o,
            _ => false,
        }
    }

    /// A different component that cannot live beside `spec`.
    fn clashes_with(&self, spec: &ComponentSpec) -> bool {
        match (self, spec) {
            (Self::Literal { name, aliases }, ComponentSpec::Literal { name: n, aliases: a }) => {
                let mine: Vec<&String> = std::iter::once(name).chain(aliases).collect();
                std::iter::once(n).chain(a).any(|w| mine.contains(&w))
            },
            (Self::Literal { name, .. }, ComponentSpec::Argument { name: n, .. })
            | (Self::Argument { name, .. }, ComponentSpec::Literal { name: n, .. })
            | (Self::Argument { name, .. }, ComponentSpec::Argument { name: n, .. }) => name == n,
            (Self::Root, _) => false,
        }
    }
}

pub(crate) struct Node {
    kind: NodeKind,
    children: Vec<Node>,
    command: Option<Arc<Command>>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            command: None,
        }
    }

    /// What the node expects next, for "missing input" errors.
    fn expected(&self) -> String {
        if let Some(arg) = self
            .children
            .iter()
            .find(|c| matches!(c.kind, NodeKind::Argument { .. }))
        {
            return format!("missing argument {}", arg.kind.usage());
        }
        let words: Vec<String> = self.children.iter().map(|c| c.kind.usage()).collect();
        format!("incomplete command, expected one of: {}", words.join(", "))
    }

    fn visible_to(&self, source: &CommandSource) -> bool {
        self.command.as_ref().is_some_and(|c| admits(c, source))
            || self.children.iter().any(|c| c.visible_to(source))
    }
}

/// Whether `source` could run `command`: permission and scope both pass.
pub(crate) fn admits(command: &Command, source: &CommandSource) -> bool {
    let scoped = match command.meta.scope {
        Scope::Any => true,
        Scope::PlayerOnly => source.source().is_player(),
        Scope::ConsoleOnly => source.source().is_console(),
    };
    scoped && command.permission.evaluate(source)
}

fn match_child<'n>(
    children: &'n [Node],
    spec: &ComponentSpec,
) -> std::result::Result<Option<&'n Node>, String> {
    let found = children.iter().find(|c| c.kind.same_as(spec));
    for child in children {
        if found.is_some_and(|f| std::ptr::eq(f, child)) {
            continue;
        }
        if child.kind.clashes_with(spec) {
            return Err(format!(
                "'{}' clashes with existing '{}'",
                spec.usage(),
                child.kind.usage()
            ));
        }
    }
    Ok(found)
}

/// Index of the first component whose node gets the command attached.
fn executable_from(components: &[ComponentSpec]) -> usize {
    match components.iter().position(ComponentSpec::is_optional) {
        Some(first_optional) => first_optional - 1,
        None => components.len() - 1,
    }
}

fn parse_position(err: &HeraldError) -> usize {
    match err {
        HeraldError::Parse { position, .. } => *position,
        _ => 0,
    }
}

/// Keep whichever error got furthest into the input. Ties keep the first.
fn record(best: &mut Option<HeraldError>, err: HeraldError) {
    if best
        .as_ref()
        .is_none_or(|b| parse_position(&err) > parse_position(b))
    {
        *best = Some(err);
    }
}

/// A command matched against input, with its parsed argument values.
pub(crate) struct Resolved {
    pub command: Arc<Command>,
    pub values: Vec<(String, Value)>,
}

pub struct CommandTree {
    root: Node,
    grammars: GrammarRegistry,
}

impl CommandTree {
    pub fn new(grammars: GrammarRegistry) -> Self {
        Self {
            root: Node::new(NodeKind::Root),
            grammars,
        }
    }

    /// Insert a command. The tree is unchanged when this fails.
    pub fn insert(&mut self, command: Command) -> Result<Arc<Command>> {
        let kinds = command
            .components
            .iter()
            .map(|c| NodeKind::build(c, &self.grammars))
            .collect::<Result<Vec<_>>>()?;
        let exec_from = executable_from(&command.components);
        self.check(&command, exec_from)?;

        let command = Arc::new(command);
        let mut node = &mut self.root;
        for (i, (spec, kind)) in command.components.iter().zip(kinds).enumerate() {
            let idx = match node.children.iter().position(|c| c.kind.same_as(spec)) {
                Some(idx) => idx,
                None => {
                    node.children.push(Node::new(kind));
                    node.children.len() - 1
                },
            };
            node = &mut node.children[idx];
            if let (
                NodeKind::Literal { aliases, .. },
                ComponentSpec::Literal { aliases: extra, .. },
            ) = (&mut node.kind, spec)
            {
                for alias in extra {
                    if !aliases.contains(alias) {
                        aliases.push(alias.clone());
                    }
                }
            }
            if i >= exec_from {
                node.command = Some(Arc::clone(&command));
            }
        }
        log::debug!("registered command '{}'", command.path);
        Ok(command)
    }

    fn check(&self, command: &Command, exec_from: usize) -> Result<()> {
        let mut node = Some(&self.root);
        for (i, spec) in command.components.iter().enumerate() {
            let Some(current) = node else { break };
            let next = match_child(&current.children, spec)
                .map_err(|why| HeraldError::DuplicateCommand(format!("{}: {why}", command.path)))?;
            if let Some(child) = next
                && i >= exec_from
                && let Some(existing) = &child.command
            {
                return Err(HeraldError::DuplicateCommand(format!(
                    "'{}' conflicts with '{}'",
                    command.path, existing.path
                )));
            }
            node = next;
        }
        Ok(())
    }

    /// Match tokenized input to a command.
    ///
    /// Literals are tried before arguments, arguments in registration
    /// order, backtracking when a branch dead-ends. On failure the parse
    /// error that got furthest into the input is returned.
    pub(crate) fn resolve(&self, input: &str, tokens: &[Token]) -> Result<Resolved> {
        let stream = TokenStream::new(input, tokens);
        if stream.is_empty() {
            return Err(HeraldError::parse(0, "empty command"));
        }
        let mut best = None;
        let mut values = Vec::new();
        match walk(&self.root, stream, &mut values, &mut best) {
            Some(command) => Ok(Resolved { command, values }),
            None => Err(best.unwrap_or_else(|| HeraldError::parse(0, "unknown command"))),
        }
    }

    /// Completion candidates for partially typed input, sorted and
    /// deduplicated. Literals leading only to commands `source` cannot run
    /// are left out.
    pub fn suggest(&self, input: &str, source: &CommandSource) -> Vec<String> {
        let Ok(tokens) = tokenize(input) else {
            return Vec::new();
        };
        let trailing_space = input.is_empty() || input.ends_with(char::is_whitespace);
        let (complete, partial) = match tokens.split_last() {
            Some((last, rest)) if !trailing_space => (rest, last.text.as_str()),
            _ => (&tokens[..], ""),
        };

        let mut reached = Vec::new();
        reach(&self.root, TokenStream::new(input, complete), &mut reached);

        let lower = partial.to_ascii_lowercase();
        let mut out = Vec::new();
        for node in reached {
            for child in &node.children {
                match &child.kind {
                    NodeKind::Literal { name, aliases } => {
                        if child.visible_to(source) {
                            out.extend(
                                std::iter::once(name)
                                    .chain(aliases)
                                    .filter(|w| w.starts_with(&lower))
                                    .cloned(),
                            );
                        }
                    },
                    NodeKind::Argument { parser, .. } => out.extend(parser.suggest(partial)),
                    NodeKind::Root => {},
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Every distinct registered command, sorted by path.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        fn visit(node: &Node, out: &mut Vec<Arc<Command>>) {
            if let Some(cmd) = &node.command
                && !out.iter().any(|c| Arc::ptr_eq(c, cmd))
            {
                out.push(Arc::clone(cmd));
            }
            for child in &node.children {
                visit(child, out);
            }
        }
        let mut out = Vec::new();
        visit(&self.root, &mut out);
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    /// Every permission atom reachable from any registered command.
    pub fn collect_permissions(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for command in self.commands() {
            command.permission.collect_atoms(&mut out);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

fn walk(
    node: &Node,
    stream: TokenStream<'_>,
    values: &mut Vec<(String, Value)>,
    best: &mut Option<HeraldError>,
) -> Option<Arc<Command>> {
    let Some(token) = stream.peek() else {
        if let Some(command) = &node.command {
            return Some(Arc::clone(command));
        }
        record(best, HeraldError::parse(stream.position(), node.expected()));
        return None;
    };

    for child in &node.children {
        if child.kind.accepts_literal(&token.text) {
            let mut next = stream;
            next.next();
            if let Some(command) = walk(child, next, values, best) {
                return Some(command);
            }
        }
    }

    for child in &node.children {
        if let NodeKind::Argument { name, parser, .. } = &child.kind {
            let mut next = stream;
            match parser.parse(&mut next) {
                Ok(value) => {
                    values.push((name.clone(), value));
                    if let Some(command) = walk(child, next, values, best) {
                        return Some(command);
                    }
                    values.pop();
                },
                Err(e) => record(best, e),
            }
        }
    }

    let message = if matches!(node.kind, NodeKind::Root) {
        format!("unknown command '{}'", token.text)
    } else if node.children.is_empty() {
        format!("unexpected trailing input '{}'", token.text)
    } else {
        let words: Vec<String> = node.children.iter().map(|c| c.kind.usage()).collect();
        format!("unexpected '{}', expected one of: {}", token.text, words.join(", "))
    };
    record(best, HeraldError::parse(stream.position(), message));
    None
}

fn reach<'n>(node: &'n Node, stream: TokenStream<'_>, out: &mut Vec<&'n Node>) {
    let Some(token) = stream.peek() else {
        out.push(node);
        return;
    };
    for child in &node.children {
        let mut next = stream;
        let matched = match &child.kind {
            NodeKind::Literal { .. } => {
                next.next();
                child.kind.accepts_literal(&token.text)
            },
            NodeKind::Argument { parser, .. } => parser.parse(&mut next).is_ok(),
            NodeKind::Root => false,
        };
        if matched {
            reach(child, next, out);
        }
    }
}
