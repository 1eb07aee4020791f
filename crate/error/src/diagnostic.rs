use crate::error_codes::ErrorCode;
use mgen_ir::SourceLocation;
use std::fmt;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            }
        )
    }
}

/// An actionable fix attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub message: String,
    /// Replacement source text, when one can be offered mechanically
    pub replacement: Option<String>,
}

impl Suggestion {
    pub fn new(message: impl Into<String>) -> Self {
        Suggestion {
            message: message.into(),
            replacement: None,
        }
    }
}

/// A located compiler message
///
/// Every diagnostic carries a code, a message and a source location;
/// suggestions render as `help:` lines and doc pointers as `note:` lines.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    pub location: SourceLocation,
    pub suggestion: Option<Suggestion>,
    pub note: Option<String>,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            location,
            suggestion: None,
            note: None,
        }
    }

    /// Creates a warning-severity diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            location,
            suggestion: None,
            note: None,
        }
    }

    /// Attaches a `help:` suggestion
    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// Attaches a `help:` suggestion from a plain message
    pub fn with_help(self, message: impl Into<String>) -> Self {
        self.with_suggestion(Suggestion::new(message))
    }

    /// Attaches a `note:` documentation pointer
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Whether this diagnostic is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Sort key for stable location ordering within a pipeline result
    pub fn order_key(&self) -> (usize, usize, u16) {
        (self.location.line, self.location.column, self.code.code())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({}:{})",
            self.severity, self.code, self.message, self.location.line, self.location.column
        )
    }
}

/// Top-level error type for hosts embedding the compiler
#[derive(Debug, thiserror::Error)]
pub enum MgenError {
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    #[error("invalid preference: {0}")]
    Preferences(String),

    #[error("build error: {0}")]
    Build(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_help_and_note() {
        let diag = Diagnostic::error(
            ErrorCode::UnsupportedFeature,
            "generators are not supported",
            SourceLocation::point(3, 5),
        )
        .with_help("return a list; generators are not supported")
        .with_note("see the subset reference");

        assert!(diag.is_error());
        let help = diag.suggestion.as_ref().expect("has suggestion");
        assert!(help.message.contains("return a list"));
        assert!(diag.note.is_some());
    }

    #[test]
    fn order_key_sorts_by_location_then_code() {
        let a = Diagnostic::error(
            ErrorCode::MissingAnnotation,
            "a",
            SourceLocation::point(1, 2),
        );
        let b = Diagnostic::error(
            ErrorCode::IncompatibleTypes,
            "b",
            SourceLocation::point(1, 2),
        );
        let c = Diagnostic::error(
            ErrorCode::MissingAnnotation,
            "c",
            SourceLocation::point(2, 1),
        );
        assert!(a.order_key() < b.order_key());
        assert!(b.order_key() < c.order_key());
    }
}
