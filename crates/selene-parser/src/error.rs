use std::fmt;

use selene_common::Span;

/// A single parse diagnostic. The parser never stops at the first
/// error: it records one of these and attempts to resynchronize at
/// the next statement boundary, so a whole file's worth of mistakes
/// can be reported in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub related: Option<(String, Span)>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            related: None,
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, span: Span) -> Self {
        self.related = Some((message.into(), span));
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span.start)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_common::Position;

    #[test]
    fn display_includes_position() {
        let err = ParseError::new("expected ';'", Span::point(Position::new(4, 1, 5)));
        assert_eq!(err.to_string(), "expected ';' at 1:5");
    }
}
