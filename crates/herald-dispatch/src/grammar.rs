//! Argument grammars: parsed values, parsers, and the registry that maps a
//! semantic type name to a parser constructor.
//!
//! The registry is a plain table built once at startup. Embedding
//! applications add their own domain grammars (coordinates, item stacks, ...)
//! with [`GrammarRegistry::register`] before building the manager.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use herald_types::{HeraldError, Result, SourceId};

use crate::syntax::TokenStream;

/// A parsed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Range(IntRange),
    Id(SourceId),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "{r}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// An inclusive integer range with optional bounds: `1..5`, `3..`, `..7`, `4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntRange {
    pub fn contains(&self, value: i64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(a), Some(b)) if a == b => write!(f, "{a}"),
            (min, max) => {
                if let Some(a) = min {
                    write!(f, "{a}")?;
                }
                f.write_str("..")?;
                if let Some(b) = max {
                    write!(f, "{b}")?;
                }
                Ok(())
            },
        }
    }
}

impl FromStr for IntRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bound = |part: &str| -> std::result::Result<Option<i64>, String> {
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse::<i64>()
                    .map(Some)
                    .map_err(|_| format!("invalid range bound '{part}'"))
            }
        };
        let range = match s.split_once("..") {
            Some((lo, hi)) => IntRange {
                min: bound(lo)?,
                max: bound(hi)?,
            },
            None => {
                let exact = bound(s)?;
                IntRange {
                    min: exact,
                    max: exact,
                }
            },
        };
        if range.min.is_none() && range.max.is_none() {
            return Err("range needs at least one bound".to_string());
        }
        if let (Some(a), Some(b)) = (range.min, range.max)
            && a > b
        {
            return Err(format!("range minimum {a} exceeds maximum {b}"));
        }
        Ok(range)
    }
}

/// Parses one argument out of a token stream.
pub trait ArgumentParser: Send + Sync {
    /// Semantic type name shown in usage strings.
    fn type_name(&self) -> &str;

    /// Consume tokens and produce a value, or a parse error positioned at
    /// the offending token.
    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value>;

    /// Completion candidates for a partially typed token.
    fn suggest(&self, _partial: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Take the next token or fail with "missing argument".
fn next_text(tokens: &mut TokenStream<'_>, what: &str) -> Result<String> {
    let pos = tokens.position();
    tokens
        .next()
        .map(|t| t.text.clone())
        .ok_or_else(|| HeraldError::parse(pos, format!("missing {what} argument")))
}

/// A single token taken verbatim.
pub struct WordParser;

impl ArgumentParser for WordParser {
    fn type_name(&self) -> &str {
        "string"
    }

    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
        next_text(tokens, "string").map(Value::Str)
    }
}

/// Everything left on the line.
pub struct GreedyParser;

impl ArgumentParser for GreedyParser {
    fn type_name(&self) -> &str {
        "greedy"
    }

    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
        let pos = tokens.position();
        tokens
            .take_rest()
            .map(Value::Str)
            .ok_or_else(|| HeraldError::parse(pos, "missing text argument"))
    }
}

/// Parses a single token with [`FromStr`].
struct FromStrParser<T> {
    name: &'static str,
    wrap: fn(T) -> Value,
}

impl<T> ArgumentParser for FromStrParser<T>
where
    T: FromStr + Send + Sync,
{
    fn type_name(&self) -> &str {
        self.name
    }

    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
        let pos = tokens.position();
        let text = next_text(tokens, self.name)?;
        text.parse::<T>()
            .map(self.wrap)
            .map_err(|_| HeraldError::parse(pos, format!("expected {}, found '{text}'", self.name)))
    }
}

pub struct BoolParser;

impl ArgumentParser for BoolParser {
    fn type_name(&self) -> &str {
        "bool"
    }

    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
        let pos = tokens.position();
        let text = next_text(tokens, "bool")?;
        match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(HeraldError::parse(pos, format!("expected bool, found '{text}'"))),
        }
    }

    fn suggest(&self, partial: &str) -> Vec<String> {
        ["true", "false"]
            .into_iter()
            .filter(|c| c.starts_with(&partial.to_ascii_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

pub struct IntRangeParser;

impl ArgumentParser for IntRangeParser {
    fn type_name(&self) -> &str {
        "int_range"
    }

    fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
        let pos = tokens.position();
        let text = next_text(tokens, "range")?;
        text.parse::<IntRange>()
            .map(Value::Range)
            .map_err(|e| HeraldError::parse(pos, e))
    }
}

/// Constructor stored in the registry.
pub type GrammarCtor = fn() -> Arc<dyn ArgumentParser>;

/// Table from semantic type name to parser constructor.
#[derive(Clone)]
pub struct GrammarRegistry {
    table: HashMap<String, GrammarCtor>,
}

impl GrammarRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// A registry holding the built-in grammars.
    pub fn new() -> Self {
        let mut reg = Self::empty();
        reg.register("string", || Arc::new(WordParser));
        reg.register("word", || Arc::new(WordParser));
        reg.register("greedy", || Arc::new(GreedyParser));
        reg.register("bool", || Arc::new(BoolParser));
        reg.register("int_range", || Arc::new(IntRangeParser));
        reg.register("int", || {
            Arc::new(FromStrParser::<i64> {
                name: "int",
                wrap: Value::Int,
            })
        });
        reg.register("float", || {
            Arc::new(FromStrParser::<f64> {
                name: "float",
                wrap: Value::Float,
            })
        });
        reg.register("id", || {
            Arc::new(FromStrParser::<SourceId> {
                name: "id",
                wrap: Value::Id,
            })
        });
        reg
    }

    /// Add or replace a grammar.
    pub fn register(&mut self, kind: &str, ctor: GrammarCtor) {
        self.table.insert(kind.to_ascii_lowercase(), ctor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// Build a parser for `kind`.
    pub fn create(&self, kind: &str) -> Result<Arc<dyn ArgumentParser>> {
        self.table
            .get(kind)
            .map(|ctor| ctor())
            .ok_or_else(|| HeraldError::UnknownGrammar(kind.to_string()))
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.table.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tokenize;

    fn parse_one(kind: &str, input: &str) -> Result<Value> {
        let tokens = tokenize(input).unwrap();
        let mut stream = TokenStream::new(input, &tokens);
        GrammarRegistry::new().create(kind)?.parse(&mut stream)
    }

    #[test]
    fn builtins_are_registered() {
        let reg = GrammarRegistry::new();
        for kind in ["string", "word", "greedy", "int", "float", "bool", "int_range", "id"] {
            assert!(reg.contains(kind), "{kind} missing");
        }
    }

    #[test]
    fn unknown_grammar() {
        let err = GrammarRegistry::new().create("item_stack").err().unwrap();
        assert!(matches!(err, HeraldError::UnknownGrammar(ref k) if k == "item_stack"));
    }

    #[test]
    fn parses_scalars() {
        assert_eq!(parse_one("int", "42").unwrap(), Value::Int(42));
        assert_eq!(parse_one("float", "2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_one("bool", "Yes").unwrap(), Value::Bool(true));
        assert_eq!(parse_one("string", "Ada").unwrap(), Value::Str("Ada".into()));
    }

    #[test]
    fn int_error_points_at_token() {
        match parse_one("int", "abc") {
            Err(HeraldError::Parse { position, message }) => {
                assert_eq!(position, 0);
                assert_eq!(message, "expected int, found 'abc'");
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_argument() {
        assert!(matches!(parse_one("string", ""), Err(HeraldError::Parse { .. })));
        assert!(matches!(parse_one("greedy", ""), Err(HeraldError::Parse { .. })));
    }

    #[test]
    fn greedy_takes_the_rest() {
        assert_eq!(
            parse_one("greedy", "hello there world").unwrap(),
            Value::Str("hello there world".into())
        );
    }

    #[test]
    fn ranges() {
        assert_eq!(
            "1..5".parse::<IntRange>().unwrap(),
            IntRange {
                min: Some(1),
                max: Some(5)
            }
        );
        assert_eq!("3..".parse::<IntRange>().unwrap().max, None);
        assert_eq!("..7".parse::<IntRange>().unwrap().min, None);
        let exact = "4".parse::<IntRange>().unwrap();
        assert!(exact.contains(4) && !exact.contains(5));
        assert_eq!(exact.to_string(), "4");
        assert!("5..1".parse::<IntRange>().is_err());
        assert!("..".parse::<IntRange>().is_err());
        assert!(parse_one("int_range", "x..y").is_err());
    }

    #[test]
    fn ids() {
        let v = parse_one("id", "00000000-0000-0000-0000-00000000002a").unwrap();
        assert_eq!(v, Value::Id(SourceId::from_u128(42)));
    }

    #[test]
    fn bool_suggestions() {
        assert_eq!(BoolParser.suggest("t"), vec!["true"]);
        assert_eq!(BoolParser.suggest(""), vec!["true", "false"]);
    }

    #[test]
    fn custom_grammar_replaces_builtin() {
        struct Upper;
        impl ArgumentParser for Upper {
            fn type_name(&self) -> &str {
                "string"
            }
            fn parse(&self, tokens: &mut TokenStream<'_>) -> Result<Value> {
                next_text(tokens, "string").map(|s| Value::Str(s.to_uppercase()))
            }
        }
        let mut reg = GrammarRegistry::new();
        reg.register("string", || Arc::new(Upper));
        let tokens = tokenize("ada").unwrap();
        let mut stream = TokenStream::new("ada", &tokens);
        let v = reg.create("string").unwrap().parse(&mut stream).unwrap();
        assert_eq!(v, Value::Str("ADA".into()));
    }
}
