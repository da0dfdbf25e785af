//! Input tokenizer and command path specs.
//!
//! Path specs describe a command's shape in one line:
//! `"give|g <target:id> <amount:int> [note:greedy]"`. Literals may carry
//! `|`-separated aliases, `<name:type>` is a required argument and
//! `[name:type]` an optional trailing one. The type defaults to `string`.

use herald_types::{HeraldError, Result};

// ---------------------------------------------------------------------------
// Tokenizer: handles single quotes, double quotes, and backslash escapes.
// ---------------------------------------------------------------------------

/// One token of raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Unquoted, unescaped text.
    pub text: String,
    /// Byte offset of the token's first character in the input.
    pub start: usize,
    /// Byte offset just past the token's last character, quotes included.
    pub end: usize,
}

/// Tokenize a command line respecting quotes and backslash escapes.
///
/// - Single-quoted strings preserve all characters literally.
/// - Double-quoted strings allow `\"` and `\\` escapes.
/// - Backslash escapes the next character outside of quotes.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start: Option<usize> = None;
    let mut chars = input.char_indices().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some((idx, ch)) = chars.next() {
        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                current.push(ch);
            }
        } else if in_double {
            if ch == '"' {
                in_double = false;
            } else if ch == '\\'
                && let Some(&(_, next)) = chars.peek()
                && matches!(next, '"' | '\\')
            {
                current.push(next);
                chars.next();
            } else {
                current.push(ch);
            }
        } else if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    start: s,
                    end: idx,
                });
            }
        } else {
            start.get_or_insert(idx);
            match ch {
                '\'' => in_single = true,
                '"' => in_double = true,
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        current.push(next);
                    }
                },
                _ => current.push(ch),
            }
        }
    }

    if in_single || in_double {
        let quote = if in_single { "single" } else { "double" };
        return Err(HeraldError::parse(
            tokens.len(),
            format!("unterminated {quote} quote"),
        ));
    }

    if let Some(s) = start {
        tokens.push(Token {
            text: current,
            start: s,
            end: input.len(),
        });
    }

    Ok(tokens)
}

/// A cursor over tokenized input, handed to argument parsers.
#[derive(Debug, Clone, Copy)]
pub struct TokenStream<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(input: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
        }
    }

    /// Index of the next token.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume everything left as one string.
    ///
    /// Every token is unquoted and unescaped; the whitespace between tokens
    /// is kept exactly as typed.
    pub fn take_rest(&mut self) -> Option<String> {
        let rest = self.tokens.get(self.pos..).filter(|r| !r.is_empty())?;
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for token in rest {
            if let Some(prev) = prev {
                out.push_str(self.input.get(prev.end..token.start).unwrap_or(" "));
            }
            out.push_str(&token.text);
            prev = Some(token);
        }
        self.pos = self.tokens.len();
        Some(out)
    }
}

// ---------------------------------------------------------------------------
// Path specs
// ---------------------------------------------------------------------------

/// One component of a command path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSpec {
    Literal {
        name: String,
        aliases: Vec<String>,
    },
    Argument {
        name: String,
        kind: String,
        optional: bool,
    },
}

impl ComponentSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::Argument { name, .. } => name,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Argument { optional: true, .. })
    }

    /// How the component is shown in usage strings.
    pub fn usage(&self) -> String {
        match self {
            Self::Literal { name, .. } => name.clone(),
            Self::Argument {
                name,
                kind,
                optional: false,
            } => format!("<{name}:{kind}>"),
            Self::Argument {
                name,
                kind,
                optional: true,
            } => format!("[{name}:{kind}]"),
        }
    }
}

fn valid_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse_argument(body: &str, optional: bool, spec: &str) -> Result<ComponentSpec> {
    let (name, kind) = match body.split_once(':') {
        Some((name, kind)) => (name.trim(), kind.trim()),
        None => (body.trim(), "string"),
    };
    if !valid_ident(name) || !valid_ident(kind) {
        return Err(HeraldError::InvalidSyntax(format!(
            "bad argument '{body}' in '{spec}'"
        )));
    }
    Ok(ComponentSpec::Argument {
        name: name.to_string(),
        kind: kind.to_ascii_lowercase(),
        optional,
    })
}

/// Parse a path spec into its components.
pub fn parse_path(spec: &str) -> Result<Vec<ComponentSpec>> {
    let mut components = Vec::new();
    for word in spec.split_whitespace() {
        let component = if let Some(body) = word.strip_prefix('<').and_then(|w| w.strip_suffix('>')) {
            parse_argument(body, false, spec)?
        } else if let Some(body) = word.strip_prefix('[').and_then(|w| w.strip_suffix(']')) {
            parse_argument(body, true, spec)?
        } else {
            let mut names = word.split('|').map(|n| n.to_ascii_lowercase());
            let name = names.next().unwrap_or_default();
            let aliases: Vec<String> = names.collect();
            if !valid_ident(&name) || !aliases.iter().all(|a| valid_ident(a)) {
                return Err(HeraldError::InvalidSyntax(format!(
                    "bad literal '{word}' in '{spec}'"
                )));
            }
            ComponentSpec::Literal { name, aliases }
        };
        components.push(component);
    }

    match components.first() {
        None => {
            return Err(HeraldError::InvalidSyntax("empty command path".into()));
        },
        Some(ComponentSpec::Argument { .. }) => {
            return Err(HeraldError::InvalidSyntax(format!(
                "'{spec}' must start with a literal"
            )));
        },
        Some(ComponentSpec::Literal { .. }) => {},
    }

    if let Some(first_optional) = components.iter().position(ComponentSpec::is_optional)
        && components[first_optional..].iter().any(|c| !c.is_optional())
    {
        return Err(HeraldError::InvalidSyntax(format!(
            "optional arguments must come last in '{spec}'"
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for component in &components {
        if let ComponentSpec::Argument { name, .. } = component
            && !seen.insert(name.as_str())
        {
            return Err(HeraldError::InvalidSyntax(format!(
                "argument '{name}' declared twice in '{spec}'"
            )));
        }
    }

    Ok(components)
}
