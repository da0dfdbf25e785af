//! Composable permission expressions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::source::CommandSource;

/// Boxed predicate over a command source.
pub type PredicateFn = dyn Fn(&CommandSource) -> bool + Send + Sync;

/// An authorization rule evaluated against a [`CommandSource`].
///
/// Evaluation is pure: the only observable effect is the host permission
/// lookup performed for each [`Atom`](Permission::Atom) actually visited.
#[derive(Clone, Default)]
pub enum Permission {
    /// Always allowed.
    #[default]
    Empty,
    /// A permission string resolved by the host.
    Atom(String),
    /// An arbitrary check on the source.
    Predicate(Arc<PredicateFn>),
    /// Every child must allow. `And([])` allows.
    And(Vec<Permission>),
    /// Some child must allow. `Or([])` denies.
    Or(Vec<Permission>),
}

impl Permission {
    pub fn atom(permission: impl Into<String>) -> Self {
        Self::Atom(permission.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&CommandSource) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn all(children: impl IntoIterator<Item = Permission>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn any(children: impl IntoIterator<Item = Permission>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// Conjunction. `Empty` is the identity.
    pub fn and(self, other: Permission) -> Self {
        match (self, other) {
            (Self::Empty, p) | (p, Self::Empty) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            },
            (Self::And(mut left), p) => {
                left.push(p);
                Self::And(left)
            },
            (p, q) => Self::And(vec![p, q]),
        }
    }

    /// Disjunction. `Empty` absorbs: anything OR always-allowed is always-allowed.
    pub fn or(self, other: Permission) -> Self {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            },
            (Self::Or(mut left), p) => {
                left.push(p);
                Self::Or(left)
            },
            (p, q) => Self::Or(vec![p, q]),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Evaluate left to right, short-circuiting.
    pub fn evaluate(&self, source: &CommandSource) -> bool {
        match self {
            Self::Empty => true,
            Self::Atom(permission) => source.has_permission(permission),
            Self::Predicate(f) => f(source),
            Self::And(children) => children.iter().all(|c| c.evaluate(source)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(source)),
        }
    }

    /// Add every atom reachable from this expression to `out`.
    ///
    /// Predicates and `Empty` have no externally nameable permission and
    /// are skipped.
    pub fn collect_atoms(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Empty | Self::Predicate(_) => {},
            Self::Atom(permission) => {
                out.insert(permission.clone());
            },
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_atoms(out);
                }
            },
        }
    }
}

impl From<&str> for Permission {
    fn from(permission: &str) -> Self {
        Self::atom(permission)
    }
}

impl From<String> for Permission {
    fn from(permission: String) -> Self {
        Self::Atom(permission)
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Atom(p) => f.debug_tuple("Atom").field(p).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::And(c) => f.debug_tuple("And").field(c).finish(),
            Self::Or(c) => f.debug_tuple("Or").field(c).finish(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[Permission], op: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }
        match self {
            Self::Empty => f.write_str("<none>"),
            Self::Atom(p) => f.write_str(p),
            Self::Predicate(_) => f.write_str("<predicate>"),
            Self::And(c) => join(f, c, "&&"),
            Self::Or(c) => join(f, c, "||"),
        }
    }
}
