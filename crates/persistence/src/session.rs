//! Working-copy session over a workbook file.
//!
//! The original file is read once and never written. Its content is frozen
//! as a base snapshot next to a mutable working copy, both inside a private
//! temporary directory that disappears with the session.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sheet_doc::Workbook;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::{load_document, load_json, save_json_atomic, DocumentFormat, PersistError};

#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    original: PathBuf,
    base: PathBuf,
    work: PathBuf,
    opened_at: DateTime<Utc>,
}

impl WorkingCopy {
    pub fn open(original: impl AsRef<Path>) -> Result<Self, PersistError> {
        let original = original.as_ref().to_path_buf();
        let doc = load_document(&original)?;
        let dir = tempfile::Builder::new().prefix("margin-sim-").tempdir()?;
        let base = dir.path().join("base.json");
        let work = dir.path().join("work.json");
        save_json_atomic(&doc, &base)?;
        fs::copy(&base, &work)?;
        info!(
            original = %original.display(),
            session = %dir.path().display(),
            "working copy opened"
        );
        Ok(Self {
            dir,
            original,
            base,
            work,
            opened_at: Utc::now(),
        })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Current state of the working copy.
    pub fn load(&self) -> Result<Workbook, PersistError> {
        load_json(&self.work)
    }

    /// The workbook as it was when the session opened.
    pub fn load_base(&self) -> Result<Workbook, PersistError> {
        load_json(&self.base)
    }

    /// Replace the working copy with `wb`, caching fresh formula results.
    /// Returns how many formula caches changed.
    pub fn save(&self, wb: &Workbook) -> Result<usize, PersistError> {
        let mut snapshot = wb.clone();
        let refreshed = snapshot.refresh_cached();
        save_json_atomic(&snapshot, &self.work)?;
        debug!(refreshed, "working copy saved");
        Ok(refreshed)
    }

    /// Discard every edit since the session opened.
    pub fn reset_to_base(&self) -> Result<(), PersistError> {
        let base = self.load_base()?;
        save_json_atomic(&base, &self.work)?;
        info!(original = %self.original.display(), "working copy reset to base");
        Ok(())
    }

    /// Write the working copy to `dest` as JSON. Refuses the original path.
    pub fn export(&self, dest: &Path) -> Result<(), PersistError> {
        if DocumentFormat::from_path(dest)? != DocumentFormat::Json {
            return Err(PersistError::UnsupportedFormat(dest.to_path_buf()));
        }
        if same_file(dest, &self.original) {
            return Err(PersistError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "the original workbook is never overwritten",
            )));
        }
        let wb = self.load()?;
        save_json_atomic(&wb, dest)?;
        info!(dest = %dest.display(), "working copy exported");
        Ok(())
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        debug!(session = %self.dir.path().display(), "working copy discarded");
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
