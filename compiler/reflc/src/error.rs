use std::path::{Path, PathBuf};

use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::UniverseError;
use refl_meta::IndexError;
use refl_select::{RuleError, SelectionError};
use thiserror::Error;

/// Why a dictionary run stopped.
///
/// Every variant ends the run in the failed state with nothing written.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error(transparent)]
    Universe(#[from] UniverseError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("cannot write `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{}` is produced twice in one run", .0.display())]
    DuplicateArtifact(PathBuf),
    /// Errors were reported along the way; their diagnostics are queued.
    #[error("{errors} error(s) reported, no artifact written")]
    Aborted { errors: usize },
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Rules(error) => error.code(),
            PipelineError::Index(error) => error.code(),
            PipelineError::Selection(_) => ErrorCode::E9001,
            PipelineError::Universe(_) | PipelineError::Io { .. } => ErrorCode::E9002,
            PipelineError::DuplicateArtifact(_) | PipelineError::Aborted { .. } => {
                ErrorCode::E9003
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PipelineError::Rules(error) => error.to_diagnostic(),
            PipelineError::Selection(error) => error.to_diagnostic(),
            PipelineError::Index(error) => error.to_diagnostic(),
            other => Diagnostic::error(other.code()).with_message(other.to_string()),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
