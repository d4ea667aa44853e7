#![deny(warnings)]

//! Workbook files on disk.
//!
//! Documents are stored as JSON with cells keyed by A1 reference. `.xlsx`
//! workbooks can be imported but are never written back; edits go to a
//! [`WorkingCopy`] held in a private temporary directory.

mod json;
mod session;
mod xlsx;

pub use json::{load_json, save_json_atomic};
pub use session::WorkingCopy;
pub use xlsx::import_xlsx;

use std::path::{Path, PathBuf};

use sheet_doc::{DocError, Workbook};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed workbook file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read xlsx workbook: {0}")]
    Xlsx(String),
    /// Zero-byte file, either found on load or produced by a save.
    #[error("empty workbook file: {}", .0.display())]
    Empty(PathBuf),
    #[error(transparent)]
    Doc(#[from] DocError),
    #[error("unsupported workbook format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// On-disk representation chosen from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Xlsx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, PersistError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("xlsx") | Some("xlsm") => Ok(Self::Xlsx),
            _ => Err(PersistError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load a JSON or XLSX workbook, dispatching on the extension.
pub fn load_document(path: &Path) -> Result<Workbook, PersistError> {
    match DocumentFormat::from_path(path)? {
        DocumentFormat::Json => load_json(path),
        DocumentFormat::Xlsx => import_xlsx(path),
    }
}
