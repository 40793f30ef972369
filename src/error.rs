//! Diagnostics for every pipeline stage, plus source-span highlighting.
//!
//! Each stage has its own error type so the CLI can map failures to the exit
//! code table in one place; all of them carry a [`Span`] and know how to
//! render themselves against the original source the way [`ParseError`] does
//! in the teacher crate this was adapted from.

use std::fmt;

use crate::span::Span;
use crate::token::TokenKind;

fn render(label: &str, message: &str, span: Span, source: &str) -> String {
    use crate::style::Style;

    let line_num = span.start.line;
    let line_content = source.lines().nth((line_num as usize).saturating_sub(1)).unwrap_or("");
    let col = span.start.col.saturating_sub(1) as usize;
    let len = if span.end.line == span.start.line {
        (span.end.col.saturating_sub(span.start.col)).max(1) as usize
    } else {
        1
    };
    let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

    format!(
        "{}: {}\n\n{} {} {}\n     {} {}",
        Style::bold_red(label),
        message,
        Style::blue(&format!("{:4}", line_num)),
        Style::blue("|"),
        line_content,
        Style::blue("|"),
        Style::red(&underline),
    )
}

#[derive(Debug, Clone)]
pub struct TokenizerError {
    pub message: String,
    pub span: Span,
}

impl TokenizerError {
    pub fn unknown_char(ch: char, why: &str, span: Span) -> Self {
        let message = if why.is_empty() {
            format!("unknown character {:?}", ch)
        } else {
            format!("unknown character {:?}, {}", ch, why)
        };
        TokenizerError { message, span }
    }

    pub fn display_with_source(&self, source: &str) -> String {
        render("error", &self.message, self.span, source)
    }
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TokenizerError {}

#[derive(Debug, Clone)]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ParserErrorKind {
    UnexpectedToken { expected: &'static str, found: TokenKind },
    UnexpectedEnd { expected: &'static str },
}

impl ParserError {
    pub fn display_with_source(&self, source: &str) -> String {
        let message = match &self.kind {
            ParserErrorKind::UnexpectedToken { expected, found } => {
                format!("expected {}, found {:?}", expected, found)
            }
            ParserErrorKind::UnexpectedEnd { expected } => {
                format!("unexpected end of input, expected {}", expected)
            }
        };
        render("error", &message, self.span, source)
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl std::error::Error for ParserError {}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CompileErrorKind {
    DuplicatedLocalName { name: String },
    NoSuchName { name: String },
    BadReturn,
    BadBreak,
    BadContinue,
}

impl CompileError {
    pub fn display_with_source(&self, source: &str) -> String {
        let message = match &self.kind {
            CompileErrorKind::DuplicatedLocalName { name } => {
                format!("'{}' is already declared in this block", name)
            }
            CompileErrorKind::NoSuchName { name } => format!("no such name: '{}'", name),
            CompileErrorKind::BadReturn => "return outside a function".to_string(),
            CompileErrorKind::BadBreak => "break outside a loop".to_string(),
            CompileErrorKind::BadContinue => "continue outside a loop".to_string(),
        };
        render("error", &message, self.span, source)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl std::error::Error for CompileError {}

/// A runtime failure raised while evaluating a resolved, control-flow-checked
/// program (division by zero, out-of-range index, calling a non-function...).
#[derive(Debug, Clone)]
pub struct JBError {
    pub message: String,
    pub span: Option<Span>,
}

impl JBError {
    pub fn new(message: impl Into<String>) -> Self {
        JBError { message: message.into(), span: None }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        JBError { message: message.into(), span: Some(span) }
    }

    pub fn display_with_source(&self, source: &str) -> String {
        match self.span {
            Some(span) => render("error", &self.message, span, source),
            None => format!("error: {}", self.message),
        }
    }
}

impl fmt::Display for JBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JBError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Pos;

    #[test]
    fn tokenizer_error_reports_the_offending_char() {
        let err = TokenizerError::unknown_char('`', "unexpected character", Span::point(Pos::new()));
        assert!(err.message.contains('`'));
    }

    #[test]
    fn display_with_source_underlines_the_span() {
        let mut start = Pos::new();
        for ch in "let ".chars() {
            start.advance(ch);
        }
        let mut end = start;
        end.advance('@');
        let err = TokenizerError { message: "unknown character".into(), span: Span::new(start, end) };
        let rendered = err.display_with_source("let @ = 1;");
        assert!(rendered.contains('^'));
        assert!(rendered.contains("let @ = 1;"));
    }

    #[test]
    fn compile_error_messages_name_the_offending_identifier() {
        let err = CompileError {
            kind: CompileErrorKind::NoSuchName { name: "b".into() },
            span: Span::point(Pos::new()),
        };
        assert!(err.display_with_source("a").contains("no such name: 'b'"));
    }
}
