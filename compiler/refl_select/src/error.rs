use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::{DeclId, SourceLoc};
use thiserror::Error;

/// Fatal problems while loading selection rules.
///
/// Any of these aborts the pipeline before the universe is scanned.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{location}: malformed pragma: {message}")]
    Pragma { location: SourceLoc, message: String },
    #[error("`{0}` is neither a pragma list (LinkDef.h) nor an XML rule file")]
    UnknownFileType(String),
    #[error("{location}: malformed rule file: {message}")]
    Xml { location: SourceLoc, message: String },
    #[error("{location}: invalid pattern `{pattern}`: {message}")]
    Pattern {
        location: SourceLoc,
        pattern: String,
        message: String,
    },
    #[error("{location}: `{name}` requests both `+` and `-`")]
    ConflictingModifiers { location: SourceLoc, name: String },
    #[error("cannot read selection file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RuleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RuleError::Pragma { .. } => ErrorCode::E0001,
            RuleError::UnknownFileType(_) => ErrorCode::E0002,
            RuleError::Xml { .. } => ErrorCode::E0003,
            RuleError::Pattern { .. } => ErrorCode::E0004,
            RuleError::ConflictingModifiers { .. } => ErrorCode::E0005,
            RuleError::Io { .. } => ErrorCode::E9002,
        }
    }

    pub fn location(&self) -> Option<&SourceLoc> {
        match self {
            RuleError::Pragma { location, .. }
            | RuleError::Xml { location, .. }
            | RuleError::Pattern { location, .. }
            | RuleError::ConflictingModifiers { location, .. } => Some(location),
            RuleError::UnknownFileType(_) | RuleError::Io { .. } => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = match self {
            RuleError::Pragma { message, .. } | RuleError::Xml { message, .. } => message.clone(),
            RuleError::Pattern {
                pattern, message, ..
            } => format!("invalid pattern `{pattern}`: {message}"),
            RuleError::ConflictingModifiers { name, .. } => {
                format!("`{name}` requests both `+` and `-`")
            }
            other => other.to_string(),
        };
        let diag = Diagnostic::error(self.code()).with_message(message);
        match self.location() {
            Some(location) => diag.at(location),
            None => diag,
        }
    }
}

/// Fatal problems found while selecting.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("`{name}` names two distinct declarations ({first} and {second})")]
    DuplicateName {
        name: String,
        first: DeclId,
        second: DeclId,
    },
}

impl SelectionError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(ErrorCode::E9001)
            .with_message(self.to_string())
            .with_note("continuing would publish contradictory index entries")
    }
}
