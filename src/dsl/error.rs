use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::lexer::Span;

/// Which compiler stage rejected the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Lexer,
    Parser,
    /// Name resolution: unknown routines, misused variables.
    Semantic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Lexer => "lexical",
            ErrorKind::Parser => "syntax",
            ErrorKind::Semantic => "semantic",
        })
    }
}

/// A script rejected at `span`. Compilation keeps going after most errors,
/// so one run may report several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
}

impl CompileError {
    fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
        }
    }

    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Lexer, message, span)
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Parser, message, span)
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Semantic, message, span)
    }

    /// Header with line and column, then the offending line with the span
    /// underlined:
    ///
    /// ```text
    /// semantic error at 2:5: Unknown name: "Frank"
    ///   | set Frank
    ///   |     ^^^^^
    /// ```
    pub fn format_with_source(&self, source: &str) -> String {
        let at = SourcePoint::locate(source, self.span.start);
        let width = underline_width(source, self.span).max(1);
        format!(
            "{} error at {}:{}: {}\n  | {}\n  | {}{}",
            self.kind,
            at.line,
            at.column,
            self.message,
            at.text,
            " ".repeat(at.column - 1),
            "^".repeat(width),
        )
    }
}

/// 1-based line and character column of a byte offset, plus that line.
struct SourcePoint<'a> {
    line: usize,
    column: usize,
    text: &'a str,
}

impl<'a> SourcePoint<'a> {
    fn locate(source: &'a str, offset: usize) -> Self {
        let offset = floor_boundary(source, offset);
        let before = source.get(..offset).unwrap_or_default();
        let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
        let text = source
            .get(line_start..)
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default();
        Self {
            line: before.matches('\n').count() + 1,
            column: before.get(line_start..).map_or(0, |s| s.chars().count()) + 1,
            text,
        }
    }
}

/// Characters of `span` on its first line. Zero for an empty span or one
/// at end of input.
fn underline_width(source: &str, span: Span) -> usize {
    let start = floor_boundary(source, span.start);
    let end = floor_boundary(source, span.end.max(span.start));
    source
        .get(start..end)
        .and_then(|text| text.lines().next())
        .map_or(0, |line| line.chars().count())
}

fn floor_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn underlines_the_span() {
        let source = "hue 5\nset Frank";
        let err = CompileError::semantic("Unknown name: \"Frank\"", Span::new(10, 15));
        assert_eq!(
            err.format_with_source(source),
            "semantic error at 2:5: Unknown name: \"Frank\"\n  | set Frank\n  |     ^^^^^"
        );
        assert_eq!(err.to_string(), "Unknown name: \"Frank\"");
    }

    #[test]
    fn end_of_input_gets_one_caret() {
        let source = "repeat 3 begin";
        let err = CompileError::parser("Expected end, found end of input", Span::new(14, 14));
        let text = err.format_with_source(source);
        assert!(text.starts_with("syntax error at 1:15:"));
        assert!(text.ends_with(&format!("  | {}^", " ".repeat(14))));
    }

    #[test]
    fn columns_count_characters() {
        let source = "print \"héllo\" ?";
        let err = CompileError::lexer("Unexpected character '?'", Span::new(15, 16));
        let text = err.format_with_source(source);
        assert!(text.starts_with("lexical error at 1:15:"), "{text}");
        let multiline = CompileError::lexer("Unterminated string", Span::new(0, 8));
        assert!(multiline.format_with_source("\"abc\ndef").ends_with("^^^^"));
    }
}
