#![deny(warnings)]

//! In-memory spreadsheet document used by the scenario engine.
//!
//! A [`Workbook`] is an ordered list of named [`Sheet`]s holding typed
//! [`Cell`]s. Formula cells are evaluated on demand, so a numeric edit is
//! visible to every dependent formula on the next read. The engine only talks
//! to the document through the [`Document`] and [`Grid`] traits.

mod addr;
mod cell;
mod formula;
mod sheet;
mod workbook;

pub use addr::{column_index, column_letters, CellAddr};
pub use cell::{Cell, Evaluated, Formula};
pub use formula::{translate, Binding, FormulaError, Translation};
pub use sheet::Sheet;
pub use workbook::Workbook;

use thiserror::Error;

/// Errors raised while building or addressing a document.
#[derive(Debug, Error, PartialEq)]
pub enum DocError {
    /// Text that is not an A1-style cell reference.
    #[error("invalid cell address: {0}")]
    InvalidAddress(String),
    /// Two sheets with the same name in one workbook.
    #[error("duplicate sheet name: {0}")]
    DuplicateSheet(String),
}

/// Read/write access to one sheet's cells.
pub trait Grid {
    /// Stored cell at `addr`, if any.
    fn cell(&self, addr: CellAddr) -> Option<&Cell>;

    /// Current value of the cell at `addr`, evaluating formulas.
    fn evaluate(&self, addr: CellAddr) -> Evaluated;

    /// Store `cell` at `addr`, replacing whatever was there.
    fn set_cell(&mut self, addr: CellAddr, cell: Cell);

    /// Index of the last row holding at least one cell.
    fn last_row(&self) -> Option<usize>;

    /// Number of columns up to and including the last stored cell of `row`.
    fn row_width(&self, row: usize) -> usize;

    /// Display text of the cell at `addr`; empty when the cell is missing.
    fn text(&self, addr: CellAddr) -> String {
        self.cell(addr).map(Cell::display_text).unwrap_or_default()
    }
}

/// A grid-of-sheets document with lookup by sheet name.
pub trait Document {
    type Sheet: Grid;

    fn sheet_names(&self) -> Vec<&str>;

    fn sheet(&self, name: &str) -> Option<&Self::Sheet>;

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Self::Sheet>;
}
