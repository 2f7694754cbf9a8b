use std::fmt;

use tern_ir::{SourceId, Span};

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A labeled span with a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

impl Label {
    /// Create a primary label (the main error location).
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    /// Create a secondary label (related context).
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: false,
        }
    }
}

/// A structured diagnostic.
///
/// Rendering to a terminal is the host's concern; the core only builds and
/// propagates these values. A diagnostic whose code is in the internal
/// range ([`ErrorCode::is_internal`]) reports a compiler bug — callers
/// distinguish the two kinds through that predicate.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub source: SourceId,
    pub labels: Vec<Label>,
}

impl Diagnostic {
    /// Create an error diagnostic with a primary span.
    pub fn error(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        let message = message.into();
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.clone(),
            source: SourceId::default(),
            labels: vec![Label::primary(span, message)],
        }
    }

    /// Create an internal-failure diagnostic.
    ///
    /// # Panics
    /// Panics in debug builds if `code` is not in the internal range.
    pub fn bug(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        debug_assert!(code.is_internal(), "bug() requires an E9xxx code");
        Self::error(code, message, span)
    }

    /// Attach a secondary label.
    #[must_use]
    pub fn with_secondary(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// Attach the source file identity.
    #[must_use]
    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = source;
        self
    }

    /// The primary span.
    pub fn span(&self) -> Span {
        self.labels
            .iter()
            .find(|l| l.is_primary)
            .map_or(Span::DUMMY, |l| l.span)
    }

    /// True if this diagnostic reports a compiler bug.
    pub fn is_internal(&self) -> bool {
        self.code.is_internal()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_span_survives_secondary_labels() {
        let d = Diagnostic::error(ErrorCode::E2007, "duplicate case", Span::new(10, 12))
            .with_secondary(Span::new(2, 4), "first occurrence");
        assert_eq!(d.span(), Span::new(10, 12));
        assert_eq!(d.labels.len(), 2);
    }

    #[test]
    fn internal_predicate_follows_code() {
        let d = Diagnostic::bug(ErrorCode::E9002, "dead code reached", Span::DUMMY);
        assert!(d.is_internal());
        let d = Diagnostic::error(ErrorCode::E2001, "unknown name", Span::DUMMY);
        assert!(!d.is_internal());
    }

    #[test]
    fn renders_code_and_message() {
        let d = Diagnostic::error(ErrorCode::E2001, "unknown name `x`", Span::DUMMY);
        assert_eq!(d.to_string(), "error[E2001]: unknown name `x`");
    }
}
