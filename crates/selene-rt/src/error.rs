use std::fmt;

use selene_common::Span;

use crate::value::Value;

/// An error surfaced while evaluating a program: an undefined name, a
/// type mismatch, division by zero, a violated contract clause, and so
/// on. Carries a span when the failing expression is known, so the
/// same position information threaded through lexing and parsing
/// survives into runtime diagnostics. `thrown` carries the original
/// Value passed to a language-level `throw`, so `catch` can bind the
/// exact value rather than a re-stringified message.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub span: Option<Span>,
    pub thrown: Option<Value>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            thrown: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            thrown: None,
        }
    }

    /// Construct the error raised by a `throw <value>;` statement. The
    /// message is the thrown value's `inspect()` form, used when no
    /// catch binder is present to surface it directly.
    pub fn thrown(value: Value, span: Span) -> Self {
        Self {
            message: value.inspect(),
            span: Some(span),
            thrown: Some(value),
        }
    }

    /// The value a `catch` block should bind: the originally thrown
    /// Value when present, otherwise the error wrapped as an
    /// `ErrorValue` carrying this message.
    pub fn as_catch_value(&self) -> Value {
        self.thrown.clone().unwrap_or_else(|| {
            Value::Error(std::sync::Arc::new(crate::value::ErrorValue {
                message: self.message.clone(),
                cause: None,
            }))
        })
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at {}", self.message, span.start),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}
