//! Read-only import of `.xlsx` workbooks.
//!
//! Every sheet keeps its name and absolute cell positions. Formula cells are
//! imported as formulas with the value Excel last computed as their cache, so
//! expressions the evaluator cannot run still read back a number.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx, XlsxError};
use sheet_doc::{Cell, CellAddr, Formula, Grid, Sheet, Workbook};
use tracing::{debug, info};

use crate::PersistError;

pub fn import_xlsx(path: &Path) -> Result<Workbook, PersistError> {
    if fs::metadata(path)?.len() == 0 {
        return Err(PersistError::Empty(path.to_path_buf()));
    }
    let mut book: Xlsx<BufReader<File>> = open_workbook(path).map_err(xlsx_error)?;
    let names = book.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let values = book.worksheet_range(&name).map_err(xlsx_error)?;
        // sheets without formulas are fine
        let formulas = book.worksheet_formula(&name).ok();
        let sheet = build_sheet(&name, &values, formulas.as_ref());
        debug!(sheet = %name, cells = sheet.len(), "imported sheet");
        sheets.push(sheet);
    }
    let wb = Workbook::from_sheets(sheets)?;
    info!(path = %path.display(), sheets = wb.sheets().len(), "xlsx workbook imported");
    Ok(wb)
}

fn xlsx_error(e: XlsxError) -> PersistError {
    PersistError::Xlsx(e.to_string())
}

fn build_sheet(name: &str, values: &Range<Data>, formulas: Option<&Range<String>>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let (row0, col0) = origin(values.start());
    for (r, c, data) in values.used_cells() {
        if let Some(cell) = value_cell(data) {
            sheet.set_cell(CellAddr::new(row0 + r, col0 + c), cell);
        }
    }
    if let Some(formulas) = formulas {
        let (row0, col0) = origin(formulas.start());
        for (r, c, expr) in formulas.used_cells() {
            if expr.trim().is_empty() {
                continue;
            }
            let addr = CellAddr::new(row0 + r, col0 + c);
            let mut formula = Formula::new(expr.as_str());
            if let Some(Cell::Number(n)) = sheet.cell(addr) {
                formula = formula.with_cached(*n);
            }
            sheet.set_cell(addr, Cell::Formula(formula));
        }
    }
    sheet
}

fn origin(start: Option<(u32, u32)>) -> (usize, usize) {
    let (row, col) = start.unwrap_or_default();
    (row as usize, col as usize)
}

fn value_cell(data: &Data) -> Option<Cell> {
    match data {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Cell::Text(s.clone())),
        Data::Float(f) => Some(Cell::Number(*f)),
        Data::Int(i) => Some(Cell::Number(*i as f64)),
        Data::DateTime(dt) => Some(Cell::Number(dt.as_f64())),
        Data::Bool(b) => Some(Cell::text(if *b { "TRUE" } else { "FALSE" })),
        Data::Error(e) => Some(Cell::Text(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_values_map_to_cells() {
        assert_eq!(value_cell(&Data::Float(2.5)), Some(Cell::Number(2.5)));
        assert_eq!(value_cell(&Data::Int(-3)), Some(Cell::Number(-3.0)));
        assert_eq!(
            value_cell(&Data::String("MP 1".into())),
            Some(Cell::text("MP 1"))
        );
        assert_eq!(value_cell(&Data::String(String::new())), None);
        assert_eq!(value_cell(&Data::Empty), None);
        assert_eq!(value_cell(&Data::Bool(true)), Some(Cell::text("TRUE")));
    }

    #[test]
    fn formulas_keep_excel_result_as_cache() {
        // values and formulas both start at B3
        let mut values: Range<Data> = Range::new((2, 1), (2, 2));
        values.set_value((2, 1), Data::Float(4.0));
        values.set_value((2, 2), Data::Float(8.0));
        let mut formulas: Range<String> = Range::new((2, 2), (2, 2));
        formulas.set_value((2, 2), "B3*2".to_string());

        let sheet = build_sheet("Ricavi", &values, Some(&formulas));
        assert_eq!(sheet.cell(CellAddr::new(2, 1)), Some(&Cell::Number(4.0)));
        assert_eq!(
            sheet.cell(CellAddr::new(2, 2)),
            Some(&Cell::Formula(Formula::new("B3*2").with_cached(8.0)))
        );
    }

    #[test]
    fn zero_byte_and_non_zip_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.xlsx");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(import_xlsx(&empty), Err(PersistError::Empty(_))));

        let garbage = dir.path().join("garbage.xlsx");
        fs::write(&garbage, b"not a zip archive").unwrap();
        assert!(matches!(import_xlsx(&garbage), Err(PersistError::Xlsx(_))));
    }
}
