//! Definition of diagnostics displayed to users.
//!
//! A diagnostic is addressed by the *model path* of the offending node (e.g.
//! `/root/heater/on`) rather than by a source span: the input document is a
//! deserialized mapping, so node identity is the most precise location the
//! compiler can report.

use std::cmp::Ordering;
use std::fmt;

/// Represents the kind of a diagnostic.
///
/// The kind determines the exit behavior of the compiler: every kind is fatal
/// to the current compile, but the rendered prefix differs so that drivers and
/// tests can distinguish input problems from model problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// The input file could not be opened or parsed.
    Input,
    /// A well-formedness rule of the model was violated.
    Validation,
    /// A backend required data that is absent from the model.
    Emission,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Validation => write!(f, "validation"),
            Self::Emission => write!(f, "emission"),
        }
    }
}

/// Represents the severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The diagnostic is displayed as an error.
    Error,
    /// The diagnostic is displayed as a warning.
    Warning,
    /// The diagnostic is displayed as a note.
    Note,
}

impl Severity {
    /// Returns `true` if the severity is [`Error`].
    ///
    /// [`Error`]: Severity::Error
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// Represents a diagnostic to display to the user.
///
/// Diagnostics render as `<severity>: <kind>: <path>: <message>`; the path
/// segment is omitted when no node (or file) is attached.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Diagnostic {
    /// The kind of the diagnostic.
    kind: Kind,
    /// The severity of the diagnostic.
    severity: Severity,
    /// The optional rule slug associated with the diagnostic.
    rule: Option<String>,
    /// The model path (or file path, for input errors) of the offending node.
    path: Option<String>,
    /// The diagnostic message.
    message: String,
}

impl Diagnostic {
    /// Creates a new input error diagnostic with the given message.
    pub fn input(message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Input,
            severity: Severity::Error,
            rule: None,
            path: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error diagnostic with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Validation,
            severity: Severity::Error,
            rule: None,
            path: None,
            message: message.into(),
        }
    }

    /// Creates a new emission error diagnostic with the given message.
    pub fn emission(message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Emission,
            severity: Severity::Error,
            rule: None,
            path: None,
            message: message.into(),
        }
    }

    /// Sets the rule slug for the diagnostic.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the offending node (or file) path for the diagnostic.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the severity of the diagnostic.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Gets the kind of the diagnostic.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Gets the severity of the diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Gets the optional rule slug associated with the diagnostic.
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    /// Gets the offending node path, if one was attached.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Gets the message of the diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.path.cmp(&other.path) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match self.rule.cmp(&other.rule) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.message.cmp(&other.message)
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{severity}: {kind}", severity = self.severity, kind = self.kind)?;
        if let Some(path) = &self.path {
            write!(f, ": {path}")?;
        }
        write!(f, ": {message}", message = self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_path() {
        let diagnostic = Diagnostic::validation("initial state `on` is not a child")
            .with_rule("unknown-initial-child")
            .with_path("/root/heater");
        assert_eq!(
            diagnostic.to_string(),
            "error: validation: /root/heater: initial state `on` is not a child"
        );
    }

    #[test]
    fn display_omits_missing_path() {
        let diagnostic = Diagnostic::input("could not open `machine.yaml`");
        assert_eq!(
            diagnostic.to_string(),
            "error: input: could not open `machine.yaml`"
        );
    }

    #[test]
    fn ordering_is_by_path_first() {
        let a = Diagnostic::validation("z").with_path("/root/a");
        let b = Diagnostic::validation("a").with_path("/root/b");
        assert!(a < b);
    }
}
