use serde::{Deserialize, Serialize};

use crate::sheet::Sheet;
use crate::{DocError, Document};

/// An ordered collection of uniquely named sheets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "WorkbookFile", try_from = "WorkbookFile")]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

/// On-disk shape; loading goes through [`Workbook::from_sheets`].
#[derive(Serialize, Deserialize)]
struct WorkbookFile {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

impl From<Workbook> for WorkbookFile {
    fn from(wb: Workbook) -> Self {
        WorkbookFile { sheets: wb.sheets }
    }
}

impl TryFrom<WorkbookFile> for Workbook {
    type Error = DocError;

    fn try_from(file: WorkbookFile) -> Result<Self, Self::Error> {
        Workbook::from_sheets(file.sheets)
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Result<Self, DocError> {
        let mut wb = Self::new();
        for sheet in sheets {
            wb.add_sheet(sheet)?;
        }
        Ok(wb)
    }

    pub fn add_sheet(&mut self, sheet: Sheet) -> Result<(), DocError> {
        if self.sheets.iter().any(|s| s.name() == sheet.name()) {
            return Err(DocError::DuplicateSheet(sheet.name().to_string()));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Store fresh formula results in every sheet ahead of a save.
    pub fn refresh_cached(&mut self) -> usize {
        self.sheets.iter_mut().map(Sheet::refresh_cached).sum()
    }
}

impl Document for Workbook {
    type Sheet = Sheet;

    fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, CellAddr, Grid};

    #[test]
    fn rejects_duplicate_sheet_names() {
        let err = Workbook::from_sheets(vec![Sheet::new("Ricavi"), Sheet::new("Ricavi")]);
        assert_eq!(err, Err(DocError::DuplicateSheet("Ricavi".into())));
    }

    #[test]
    fn lookup_by_exact_name() {
        let mut wb =
            Workbook::from_sheets(vec![Sheet::new("Ricavi"), Sheet::new("CE Budget 2022")])
                .unwrap();
        assert_eq!(wb.sheet_names(), vec!["Ricavi", "CE Budget 2022"]);
        assert!(wb.sheet("ricavi").is_none());
        wb.sheet_mut("Ricavi")
            .unwrap()
            .set_cell(CellAddr::new(0, 0), Cell::Number(1.0));
        assert_eq!(wb.sheet("Ricavi").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_names_fail_to_deserialize() {
        let text = r#"{"sheets": [{"name": "Ricavi"}, {"name": "Ricavi"}]}"#;
        let err = serde_json::from_str::<Workbook>(text).unwrap_err();
        assert!(err.to_string().contains("duplicate sheet name"), "{err}");

        let ok: Workbook = serde_json::from_str(r#"{"sheets": [{"name": "Ricavi"}]}"#).unwrap();
        assert_eq!(ok.sheet_names(), vec!["Ricavi"]);
        let empty: Workbook = serde_json::from_str("{}").unwrap();
        assert!(empty.sheets().is_empty());
    }
}
