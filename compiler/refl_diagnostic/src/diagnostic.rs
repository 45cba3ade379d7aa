use std::fmt;

use refl_ir::SourceLoc;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
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

/// A diagnostic with everything needed to report it.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// Declaration or rule location the diagnostic refers to.
    pub location: Option<SourceLoc>,
    pub notes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            location: None,
            notes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    pub fn note(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Note)
    }

    /// Create a diagnostic at the default severity of its code.
    pub fn for_code(code: ErrorCode) -> Self {
        if code.is_warning() {
            Self::warning(code)
        } else {
            Self::error(code)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a location; unknown locations (empty file) are ignored.
    pub fn at(mut self, location: &SourceLoc) -> Self {
        if location.is_known() {
            self.location = Some(location.clone());
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.severity, Severity::Warning)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;

        if let Some(location) = &self.location {
            write!(f, "\n  --> {location}")?;
        }

        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }

        for suggestion in &self.suggestions {
            write!(f, "\n  = help: {suggestion}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_collects_context() {
        let diag = Diagnostic::error(ErrorCode::E2001)
            .with_message("pointer member `data` has no length field")
            .at(&SourceLoc::new("Track.h", 14))
            .with_note("the binary layout would be ambiguous")
            .with_suggestion("add a `//[fN]` comment naming the length field");

        assert!(diag.is_error());
        assert_eq!(
            diag.to_string(),
            "error [E2001]: pointer member `data` has no length field\n  \
             --> Track.h:14\n  \
             = note: the binary layout would be ambiguous\n  \
             = help: add a `//[fN]` comment naming the length field"
        );
    }

    #[test]
    fn unknown_locations_are_dropped() {
        let diag = Diagnostic::warning(ErrorCode::E1003).at(&SourceLoc::default());
        assert_eq!(diag.location, None);
        assert!(diag.is_warning());
    }

    #[test]
    fn default_severity_follows_code() {
        assert!(Diagnostic::for_code(ErrorCode::E1003).is_warning());
        assert!(Diagnostic::for_code(ErrorCode::E2003).is_error());
    }
}
