//! Budget income statement: snapshot, propagation and label lookup.

use serde::{Deserialize, Serialize};
use sheet_doc::{CellAddr, Document, Grid};
use sim_core::config::{StatementCells, StatementConfig};
use sim_core::{normalize_spaces, Category, EngineConfig, SimError, ValueExtractor};
use tracing::{debug, info, warn};

/// The seven line items read from fixed cells, in statement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKey {
    FinishedGoodsRevenue,
    RawMaterialRevenue,
    ContractWorkRevenue,
    OtherRevenue,
    FinishedGoodsVariation,
    RawMaterialPurchases,
    InventoryVariation,
}

impl LineKey {
    pub const ALL: [LineKey; 7] = [
        LineKey::FinishedGoodsRevenue,
        LineKey::RawMaterialRevenue,
        LineKey::ContractWorkRevenue,
        LineKey::OtherRevenue,
        LineKey::FinishedGoodsVariation,
        LineKey::RawMaterialPurchases,
        LineKey::InventoryVariation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LineKey::FinishedGoodsRevenue => "Ricavi PF",
            LineKey::RawMaterialRevenue => "Ricavi MP",
            LineKey::ContractWorkRevenue => "Ricavi C/Lav.",
            LineKey::OtherRevenue => "Altri ricavi",
            LineKey::FinishedGoodsVariation => "Var. PF",
            LineKey::RawMaterialPurchases => "Acquisto MP",
            LineKey::InventoryVariation => "Var. scorte",
        }
    }

    pub fn cell(&self, cells: &StatementCells) -> CellAddr {
        match self {
            LineKey::FinishedGoodsRevenue => cells.finished_goods_revenue,
            LineKey::RawMaterialRevenue => cells.raw_material_revenue,
            LineKey::ContractWorkRevenue => cells.contract_work_revenue,
            LineKey::OtherRevenue => cells.other_revenue,
            LineKey::FinishedGoodsVariation => cells.finished_goods_variation,
            LineKey::RawMaterialPurchases => cells.raw_material_purchases,
            LineKey::InventoryVariation => cells.inventory_variation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItem {
    pub key: LineKey,
    pub label: String,
    pub value: f64,
}

/// Ordered line items of one statement view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IncomeStatement {
    pub items: Vec<LineItem>,
}

impl IncomeStatement {
    /// Build from values in [`LineKey::ALL`] order.
    pub fn from_values(values: [f64; 7]) -> Self {
        let items = LineKey::ALL
            .iter()
            .zip(values)
            .map(|(key, value)| LineItem {
                key: *key,
                label: key.label().to_string(),
                value,
            })
            .collect();
        Self { items }
    }

    pub fn get(&self, key: LineKey) -> f64 {
        self.items
            .iter()
            .find(|i| i.key == key)
            .map(|i| i.value)
            .unwrap_or(0.0)
    }

    fn add(&mut self, key: LineKey, amount: f64) {
        if let Some(item) = self.items.iter_mut().find(|i| i.key == key) {
            item.value += amount;
        }
    }
}

/// Statement after a product-line change, computed from the deltas alone.
///
/// Raw material moves raw-material revenue and purchases (purchases are
/// stored as negative costs, so a cost increase lowers them); every other
/// category moves finished-goods revenue.
pub fn propagate_variation(
    base: &IncomeStatement,
    category: Category,
    revenue_delta: f64,
    cost_delta: f64,
) -> IncomeStatement {
    let mut out = base.clone();
    if category.is_raw_material() {
        out.add(LineKey::RawMaterialRevenue, revenue_delta);
        out.add(LineKey::RawMaterialPurchases, -cost_delta);
    } else {
        out.add(LineKey::FinishedGoodsRevenue, revenue_delta);
    }
    out
}

/// Per-item difference `varied − base`.
pub fn delta(base: &IncomeStatement, varied: &IncomeStatement) -> IncomeStatement {
    let items = base
        .items
        .iter()
        .map(|b| LineItem {
            key: b.key,
            label: b.label.clone(),
            value: varied.get(b.key) - b.value,
        })
        .collect();
    IncomeStatement { items }
}

/// A line of the read-only aggregate view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtendedLine {
    pub label: String,
    pub value: f64,
    /// False when no row carried the label; the value is then 0.
    pub found: bool,
}

/// Reads the statement sheet of a document.
#[derive(Clone, Debug, Default)]
pub struct StatementReader {
    config: StatementConfig,
    extractor: ValueExtractor,
}

impl StatementReader {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.statement.clone(),
            extractor: ValueExtractor::new(config.numbers.clone()),
        }
    }

    /// Name of the statement sheet: a known name first, else the first sheet
    /// with a cell naming the statement, the budget and the year together.
    pub fn locate_sheet<D: Document + ?Sized>(&self, doc: &D) -> Result<String, SimError> {
        for name in self.config.candidate_names() {
            if doc.sheet(&name).is_some() {
                debug!(sheet = %name, "statement sheet found by name");
                return Ok(name);
            }
        }
        for name in doc.sheet_names() {
            if let Some(sheet) = doc.sheet(name) {
                if self.looks_like_statement(sheet) {
                    debug!(sheet = %name, "statement sheet found by content");
                    return Ok(name.to_string());
                }
            }
        }
        Err(SimError::SheetNotFound(format!(
            "{} {} {}",
            self.config.statement_token, self.config.budget_token, self.config.budget_year
        )))
    }

    fn looks_like_statement<G: Grid + ?Sized>(&self, sheet: &G) -> bool {
        let Some(last) = sheet.last_row() else {
            return false;
        };
        let tokens = [
            self.config.statement_token.to_uppercase(),
            self.config.budget_token.to_uppercase(),
            self.config.budget_year.to_string(),
        ];
        for row in 0..=last.min(self.config.scan_rows) {
            let width = sheet.row_width(row).min(self.config.scan_cols);
            for col in 0..width {
                let text = normalize_spaces(&sheet.text(CellAddr::new(row, col))).to_uppercase();
                if !text.is_empty() && tokens.iter().all(|t| text.contains(t.as_str())) {
                    return true;
                }
            }
        }
        false
    }

    /// The seven line items from their fixed cells.
    pub fn read_snapshot<D: Document + ?Sized>(&self, doc: &D) -> Result<IncomeStatement, SimError> {
        let name = self.locate_sheet(doc)?;
        let sheet = doc
            .sheet(&name)
            .ok_or_else(|| SimError::SheetNotFound(name.clone()))?;
        let mut values = [0.0; 7];
        for (slot, key) in values.iter_mut().zip(LineKey::ALL) {
            *slot = self.extractor.read_at(sheet, key.cell(&self.config.cells));
        }
        info!(sheet = %name, "read income statement snapshot");
        Ok(IncomeStatement::from_values(values))
    }

    fn lookup_label<G: Grid + ?Sized>(&self, sheet: &G, needle: &str) -> Option<f64> {
        let needle = normalize_spaces(needle).to_uppercase();
        let last = sheet.last_row()?;
        for row in 0..=last.min(self.config.label_rows) {
            let width = sheet
                .row_width(row)
                .min(self.config.label_cols.saturating_add(1));
            for col in 0..width {
                let text = sheet.text(CellAddr::new(row, col));
                if normalize_spaces(&text).to_uppercase().contains(&needle) {
                    return Some(self.extractor.read_number(sheet, row, self.config.value_col));
                }
            }
        }
        None
    }

    /// Value of the first row whose left margin contains `needle`; 0 with a
    /// warning when no row does.
    pub fn find_by_label<G: Grid + ?Sized>(&self, sheet: &G, needle: &str) -> f64 {
        self.lookup_label(sheet, needle).unwrap_or_else(|| {
            warn!(label = %needle, "statement label not found, using 0");
            0.0
        })
    }

    /// Aggregate lines of the statement looked up by label.
    pub fn extended_view<D: Document + ?Sized>(&self, doc: &D) -> Result<Vec<ExtendedLine>, SimError> {
        let name = self.locate_sheet(doc)?;
        let sheet = doc
            .sheet(&name)
            .ok_or_else(|| SimError::SheetNotFound(name.clone()))?;
        Ok(self
            .config
            .extended
            .iter()
            .map(|line| {
                let found = self.lookup_label(sheet, &line.needle);
                if found.is_none() {
                    warn!(label = %line.needle, "statement label not found, using 0");
                }
                ExtendedLine {
                    label: line.display.clone(),
                    value: found.unwrap_or(0.0),
                    found: found.is_some(),
                }
            })
            .collect())
    }
}
