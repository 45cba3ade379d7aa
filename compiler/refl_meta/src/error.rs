use refl_diagnostic::{Diagnostic, ErrorCode};
use thiserror::Error;

/// Problems reading or writing index artifacts.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{file}:{line}: {message}")]
    Malformed {
        file: String,
        line: usize,
        message: String,
    },
    #[error("`{0}` was selected twice under the same normalized name")]
    DuplicateClass(String),
    #[error("cannot access `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IndexError::Malformed { .. } => ErrorCode::E3001,
            IndexError::DuplicateClass(_) => ErrorCode::E9001,
            IndexError::Io { .. } => ErrorCode::E9002,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code()).with_message(self.to_string());
        match self {
            IndexError::DuplicateClass(_) => {
                diag.with_note("the generated index would list contradictory entries")
            }
            _ => diag,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
