//! Boxed, word-wrapped operator reports.

use std::collections::BTreeMap;

use herald_platform::{DiagnosticSink, ReportLevel};
use herald_types::{ExecutionFailure, Result};
use serde::Serialize;

enum Line {
    Title(String),
    Text(String),
    Rule(char),
    Blank,
}

/// Builds a fixed-width text box for the diagnostic sink.
///
/// ```text
/// /==============================\
/// |        Report Title          |
/// |==============================|
/// | Some wrapped text            |
/// \==============================/
/// ```
pub struct PrettyPrinter {
    width: usize,
    lines: Vec<Line>,
}

impl PrettyPrinter {
    const MIN_WIDTH: usize = 20;

    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(Self::MIN_WIDTH),
            lines: Vec::new(),
        }
    }

    fn inner(&self) -> usize {
        self.width - 4
    }

    /// Centered title followed by a double rule.
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.lines.push(Line::Title(title.into()));
        self.lines.push(Line::Rule('='));
        self
    }

    /// Add text. Embedded newlines start new lines; long lines wrap and keep
    /// their leading indentation.
    pub fn add(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().lines() {
            self.lines.push(Line::Text(line.to_string()));
        }
        self
    }

    pub fn hr(&mut self, ch: char) -> &mut Self {
        self.lines.push(Line::Rule(ch));
        self
    }

    pub fn newline(&mut self) -> &mut Self {
        self.lines.push(Line::Blank);
        self
    }

    pub fn render(&self) -> String {
        let inner = self.inner();
        let mut out = String::new();
        out.push('/');
        out.push_str(&"=".repeat(self.width - 2));
        out.push_str("\\\n");
        for line in &self.lines {
            match line {
                Line::Title(title) => {
                    for chunk in wrap(title, inner) {
                        out.push_str(&format!("| {chunk:^inner$} |\n"));
                    }
                },
                Line::Text(text) => {
                    for chunk in wrap(text, inner) {
                        out.push_str(&format!("| {chunk:<inner$} |\n"));
                    }
                },
                Line::Rule(ch) => {
                    out.push('|');
                    out.push_str(&ch.to_string().repeat(self.width - 2));
                    out.push_str("|\n");
                },
                Line::Blank => out.push_str(&format!("| {:inner$} |\n", "")),
            }
        }
        out.push('\\');
        out.push_str(&"=".repeat(self.width - 2));
        out.push('/');
        out
    }

    /// Send the rendered box to `sink` as a single report.
    pub fn log(&self, sink: &dyn DiagnosticSink, level: ReportLevel) {
        sink.report(level, &self.render());
    }
}

/// Greedy word wrap to `width` characters. Words longer than the available
/// space are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let indent_len = text.len() - text.trim_start().len();
    let indent = &text[..indent_len];
    let indent = if indent.chars().count() >= width / 2 {
        ""
    } else {
        indent
    };
    let room = width - indent.chars().count();

    let mut out = Vec::new();
    let mut current = String::new();
    let mut len = 0;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let needed = if len == 0 { word.len() } else { len + 1 + word.len() };
            if needed <= room {
                if len > 0 {
                    current.push(' ');
                }
                current.extend(word.iter());
                len = needed;
                break;
            }
            if len > 0 {
                out.push(format!("{indent}{current}"));
                current.clear();
                len = 0;
                continue;
            }
            let rest = word.split_off(room);
            out.push(format!("{indent}{}", word.iter().collect::<String>()));
            word = rest;
        }
    }
    if len > 0 || out.is_empty() {
        out.push(format!("{indent}{current}"));
    }
    out
}

/// Operator-facing summary of an execution failure.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub source: String,
    pub input: String,
    pub suggestions: bool,
    pub context: BTreeMap<String, String>,
    /// Cause chain, outermost first.
    pub causes: Vec<String>,
    pub trace: String,
}

impl ExecutionReport {
    pub fn new(source: &str, failure: &ExecutionFailure) -> Self {
        Self {
            source: source.to_string(),
            input: failure.input.clone(),
            suggestions: failure.suggestions,
            context: failure.context.iter().cloned().collect(),
            causes: failure.cause.chain().map(ToString::to_string).collect(),
            trace: failure.trace(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn printer(&self, width: usize) -> PrettyPrinter {
        let mut p = PrettyPrinter::new(width);
        p.title("Command Execution Exception")
            .add("An unexpected error was encountered during command processing. This error")
            .add("alongside its relative context will now be displayed.")
            .hr('-')
            .add(format!("Command Source: {}", self.source))
            .add(format!("Command Input: {}", self.input))
            .add(format!("During Suggestions: {}", self.suggestions))
            .add("Context:");
        for (key, value) in &self.context {
            p.add(format!("  {key}: {value}"));
        }
        p.newline()
            .add("Encountered Exception Stacktrace:")
            .add(&self.trace);
        p
    }
}
