use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::addr::CellAddr;
use crate::cell::{Cell, Evaluated};
use crate::formula::{self, EvalContext};
use crate::{DocError, Grid};

/// A named sheet of sparse cells. Empty cells are not stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "SheetFile", try_from = "SheetFile")]
pub struct Sheet {
    name: String,
    cells: BTreeMap<CellAddr, Cell>,
}

/// On-disk shape of a sheet: cells keyed by A1 reference.
#[derive(Serialize, Deserialize)]
struct SheetFile {
    name: String,
    #[serde(default)]
    cells: Vec<CellEntry>,
}

#[derive(Serialize, Deserialize)]
struct CellEntry {
    at: String,
    cell: Cell,
}

impl From<Sheet> for SheetFile {
    fn from(sheet: Sheet) -> Self {
        SheetFile {
            name: sheet.name,
            cells: sheet
                .cells
                .into_iter()
                .map(|(addr, cell)| CellEntry {
                    at: addr.to_a1(),
                    cell,
                })
                .collect(),
        }
    }
}

impl TryFrom<SheetFile> for Sheet {
    type Error = DocError;

    fn try_from(file: SheetFile) -> Result<Self, Self::Error> {
        let mut sheet = Sheet::new(file.name);
        for entry in file.cells {
            sheet.set_cell(CellAddr::parse(&entry.at)?, entry.cell);
        }
        Ok(sheet)
    }
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored (non-empty) cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Builder-style setter taking an A1 reference.
    pub fn with(mut self, a1: &str, cell: Cell) -> Result<Self, DocError> {
        self.set_cell(CellAddr::parse(a1)?, cell);
        Ok(self)
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellAddr, &Cell)> {
        self.cells.iter().map(|(a, c)| (*a, c))
    }

    /// Addresses of stored cells inside the rectangle, row-major.
    pub fn addrs_between(&self, top_left: CellAddr, bottom_right: CellAddr) -> Vec<CellAddr> {
        let last = match self.last_row() {
            Some(r) => r.min(bottom_right.row),
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        for row in top_left.row..=last {
            let from = CellAddr::new(row, top_left.col);
            let to = CellAddr::new(row, bottom_right.col);
            out.extend(self.cells.range(from..=to).map(|(a, _)| *a));
        }
        out
    }

    pub(crate) fn evaluate_with(&self, addr: CellAddr, ctx: &mut EvalContext) -> Evaluated {
        match self.cells.get(&addr) {
            None | Some(Cell::Empty) => Evaluated::Empty,
            Some(Cell::Number(v)) => Evaluated::Number(*v),
            Some(Cell::Text(s)) => Evaluated::Text(s.clone()),
            Some(Cell::Formula(f)) => formula::evaluate(self, addr, f, ctx),
        }
    }

    /// Re-evaluate every formula and store numeric results as the cached value.
    ///
    /// Returns the number of formulas whose cache was updated.
    pub fn refresh_cached(&mut self) -> usize {
        // one context for the whole sheet, nothing changes until the writes below
        let mut ctx = EvalContext::default();
        let fresh: Vec<(CellAddr, Option<f64>)> = self
            .cells
            .iter()
            .filter(|(_, c)| matches!(c, Cell::Formula(_)))
            .map(|(a, _)| (*a, self.evaluate_with(*a, &mut ctx).as_number()))
            .collect();
        let mut updated = 0;
        for (addr, value) in fresh {
            if let Some(Cell::Formula(f)) = self.cells.get_mut(&addr) {
                if value.is_some() && f.cached != value {
                    f.cached = value;
                    updated += 1;
                }
            }
        }
        debug!(sheet = %self.name, updated, "refreshed formula caches");
        updated
    }
}

impl Grid for Sheet {
    fn cell(&self, addr: CellAddr) -> Option<&Cell> {
        self.cells.get(&addr)
    }

    fn evaluate(&self, addr: CellAddr) -> Evaluated {
        self.evaluate_with(addr, &mut EvalContext::default())
    }

    fn set_cell(&mut self, addr: CellAddr, cell: Cell) {
        if cell.is_empty() {
            self.cells.remove(&addr);
        } else {
            self.cells.insert(addr, cell);
        }
    }

    fn last_row(&self) -> Option<usize> {
        self.cells.keys().next_back().map(|a| a.row)
    }

    fn row_width(&self, row: usize) -> usize {
        self.cells
            .range(CellAddr::new(row, 0)..=CellAddr::new(row, usize::MAX))
            .next_back()
            .map(|(a, _)| a.col + 1)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Formula;

    fn sample() -> Sheet {
        Sheet::new("Ricavi")
            .with("A1", Cell::text("Cat"))
            .unwrap()
            .with("C1", Cell::text("POS"))
            .unwrap()
            .with("B3", Cell::Number(4.0))
            .unwrap()
            .with("C3", Cell::formula("B3*2"))
            .unwrap()
    }

    #[test]
    fn dimensions_follow_stored_cells() {
        let sheet = sample();
        assert_eq!(sheet.last_row(), Some(2));
        assert_eq!(sheet.row_width(0), 3);
        assert_eq!(sheet.row_width(1), 0);
        assert_eq!(sheet.row_width(2), 3);
        assert_eq!(sheet.text(CellAddr::new(0, 2)), "POS");
        assert_eq!(sheet.text(CellAddr::new(9, 9)), "");
    }

    #[test]
    fn setting_empty_removes_cell() {
        let mut sheet = sample();
        sheet.set_cell(CellAddr::new(0, 0), Cell::Empty);
        assert!(sheet.cell(CellAddr::new(0, 0)).is_none());
        assert_eq!(sheet.len(), 3);
    }

    #[test]
    fn refresh_stores_cached_results() {
        let mut sheet = sample();
        assert_eq!(sheet.refresh_cached(), 1);
        assert_eq!(
            sheet.cell(CellAddr::new(2, 2)),
            Some(&Cell::Formula(Formula::new("B3*2").with_cached(8.0)))
        );
        assert_eq!(sheet.refresh_cached(), 0);
    }

    #[test]
    fn json_uses_a1_keys() {
        let sheet = sample();
        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["name"], "Ricavi");
        assert_eq!(json["cells"][0]["at"], "A1");
        let back: Sheet = serde_json::from_value(json).unwrap();
        assert_eq!(back, sheet);
    }

    #[test]
    fn json_with_bad_address_is_rejected() {
        let raw = r#"{"name":"S","cells":[{"at":"1A","cell":{"type":"number","value":1}}]}"#;
        assert!(serde_json::from_str::<Sheet>(raw).is_err());
    }
}
