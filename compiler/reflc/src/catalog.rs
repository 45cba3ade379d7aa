//! Artifacts of a run, held in temporaries until the run succeeds.
//!
//! Each artifact is written to a hidden temporary next to its target, so
//! that committing is a rename within one directory. Dropping the catalog
//! without committing deletes every temporary.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use crate::error::PipelineError;

struct PendingArtifact {
    target: PathBuf,
    file: NamedTempFile,
}

/// Artifacts written but not yet visible under their final names.
#[derive(Default)]
pub struct ArtifactCatalog {
    pending: Vec<PendingArtifact>,
}

impl ArtifactCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Path> {
        self.pending.iter().map(|artifact| artifact.target.as_path())
    }

    /// Write `contents` to a temporary standing in for `target`.
    pub fn add(&mut self, target: &Path, contents: &str) -> Result<(), PipelineError> {
        if self.targets().any(|pending| pending == target) {
            return Err(PipelineError::DuplicateArtifact(target.to_path_buf()));
        }
        let mut file = sibling_temp(target, ".tmp")?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| PipelineError::io(target, source))?;
        debug!(
            target = %target.display(),
            temp = %file.path().display(),
            "file added to temp catalog"
        );
        self.pending.push(PendingArtifact {
            target: target.to_path_buf(),
            file,
        });
        Ok(())
    }

    /// Rename every temporary into place.
    ///
    /// A target left by an earlier run is moved to a backup next to it
    /// before being replaced. If one rename fails, every target already
    /// replaced gets its backup back (or is removed when it had none) and
    /// the remaining temporaries are deleted: either all targets are
    /// updated or none are.
    pub fn commit(self) -> Result<Vec<PathBuf>, PipelineError> {
        info!(artifacts = self.pending.len(), "committing artifacts");
        let mut committed: Vec<Replaced> = Vec::with_capacity(self.pending.len());
        for artifact in self.pending {
            let backup = match set_aside(&artifact.target) {
                Ok(backup) => backup,
                Err(error) => {
                    undo(committed);
                    return Err(error);
                }
            };
            match artifact.file.persist(&artifact.target) {
                Ok(_) => committed.push(Replaced {
                    target: artifact.target,
                    backup,
                }),
                Err(error) => {
                    committed.push(Replaced {
                        target: artifact.target.clone(),
                        backup,
                    });
                    undo(committed);
                    return Err(PipelineError::io(&artifact.target, error.error));
                }
            }
        }
        // Dropping the backups deletes them.
        Ok(committed.into_iter().map(|replaced| replaced.target).collect())
    }

    /// Delete every temporary.
    pub fn rollback(self) {
        info!(artifacts = self.pending.len(), "discarding artifacts");
        drop(self);
    }
}

/// A target renamed into place, with what it replaced.
struct Replaced {
    target: PathBuf,
    backup: Option<TempPath>,
}

/// An empty hidden temporary in the directory of `target`.
fn sibling_temp(target: &Path, suffix: &str) -> Result<NamedTempFile, PipelineError> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| PipelineError::io(target, source))
}

/// Move an existing target file to a backup beside it.
fn set_aside(target: &Path) -> Result<Option<TempPath>, PipelineError> {
    if !target.is_file() {
        return Ok(None);
    }
    let backup = sibling_temp(target, ".bak")?.into_temp_path();
    std::fs::rename(target, &backup).map_err(|source| PipelineError::io(target, source))?;
    debug!(
        target = %target.display(),
        backup = %backup.display(),
        "previous artifact set aside"
    );
    Ok(Some(backup))
}

/// Put back what a partial commit replaced, last first.
fn undo(replaced: Vec<Replaced>) {
    for Replaced { target, backup } in replaced.into_iter().rev() {
        let restored = match &backup {
            Some(backup) => std::fs::rename(backup, &target),
            None if target.is_file() => std::fs::remove_file(&target),
            None => Ok(()),
        };
        if let Err(error) = restored {
            warn!(path = %target.display(), %error, "cannot undo committed artifact");
        }
    }
}
