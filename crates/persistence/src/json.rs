use std::fs;
use std::io::Write;
use std::path::Path;

use sheet_doc::Workbook;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::PersistError;

pub fn load_json(path: &Path) -> Result<Workbook, PersistError> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Err(PersistError::Empty(path.to_path_buf()));
    }
    let wb: Workbook = serde_json::from_slice(&bytes)?;
    info!(path = %path.display(), sheets = wb.sheets().len(), "workbook loaded");
    Ok(wb)
}

/// Write `wb` next to `path` and rename it into place, so a failed save
/// never leaves a truncated file behind.
pub fn save_json_atomic(wb: &Workbook, path: &Path) -> Result<(), PersistError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), wb)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    let written = tmp.as_file().metadata()?.len();
    if written == 0 {
        return Err(PersistError::Empty(path.to_path_buf()));
    }
    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;
    debug!(path = %path.display(), bytes = written, "workbook saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_doc::{Cell, CellAddr, Document, Grid, Sheet};

    fn book() -> Workbook {
        let mut sheet = Sheet::new("Ricavi");
        sheet.set_cell(CellAddr::new(0, 0), Cell::Number(2.5));
        sheet.set_cell(CellAddr::new(0, 1), Cell::formula("A1*2"));
        sheet.set_cell(CellAddr::new(1, 0), Cell::text("MP 1"));
        Workbook::from_sheets(vec![sheet]).unwrap()
    }

    #[test]
    fn saved_file_reloads_equal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        save_json_atomic(&book(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"B1\""), "{text}");
        assert_eq!(load_json(&path).unwrap(), book());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        fs::write(&path, "stale").unwrap();
        let mut wb = book();
        wb.sheet_mut("Ricavi")
            .unwrap()
            .set_cell(CellAddr::new(0, 0), Cell::Number(4.0));
        save_json_atomic(&wb, &path).unwrap();
        let back = load_json(&path).unwrap();
        let sheet = back.sheet("Ricavi").unwrap();
        assert_eq!(sheet.cell(CellAddr::new(0, 0)), Some(&Cell::Number(4.0)));
        // only the target file remains in the directory
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_and_malformed_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        fs::write(&empty, "").unwrap();
        assert!(matches!(load_json(&empty), Err(PersistError::Empty(_))));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"sheets\": 3}").unwrap();
        assert!(matches!(load_json(&bad), Err(PersistError::Json(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_json(&missing), Err(PersistError::Io(_))));
    }
}
