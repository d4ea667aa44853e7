//! Product-table discovery in a free-form sheet.
//!
//! The sheet may contain several header blocks side by side. Each column
//! whose header equals the category token anchors one candidate block; the
//! first block that carries every mandatory role becomes the schema.

use sheet_doc::{CellAddr, Grid};
use tracing::{debug, info};

use crate::config::HeaderConfig;
use crate::{SimError, TableSchema};

/// Outcome of resolving a header row.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaResolution {
    Found(TableSchema),
    NotFound(String),
}

impl SchemaResolution {
    pub fn into_result(self) -> Result<TableSchema, SimError> {
        match self {
            SchemaResolution::Found(schema) => Ok(schema),
            SchemaResolution::NotFound(reason) => Err(SimError::SchemaNotFound(reason)),
        }
    }
}

struct Tokens {
    category: String,
    article: String,
    category_label: String,
    quantity: String,
    profit: String,
    unit_price: String,
    unit_price_secondary: String,
    unit_cost: String,
    unit_cost_secondary: String,
}

impl Tokens {
    fn new(cfg: &HeaderConfig) -> Self {
        let low = |s: &str| s.trim().to_lowercase();
        Self {
            category: low(&cfg.category),
            article: low(&cfg.article),
            category_label: low(&cfg.category_label),
            quantity: low(&cfg.quantity),
            profit: low(&cfg.profit),
            unit_price: low(&cfg.unit_price),
            unit_price_secondary: low(&cfg.unit_price_secondary),
            unit_cost: low(&cfg.unit_cost),
            unit_cost_secondary: low(&cfg.unit_cost_secondary),
        }
    }
}

fn lowered(cells: &[String]) -> Vec<String> {
    cells.iter().map(|c| c.trim().to_lowercase()).collect()
}

/// Whether a row of header texts names all the roles needed to qualify.
pub fn header_matches(cells: &[String], cfg: &HeaderConfig) -> bool {
    let t = Tokens::new(cfg);
    let cells = lowered(cells);
    let exact = |token: &str| cells.iter().any(|c| c == token);
    exact(&t.category)
        && exact(&t.article)
        && exact(&t.profit)
        && cells.iter().any(|c| c.contains(&t.quantity))
}

/// Display texts of the first `max_cols` cells of `row`.
pub fn row_texts<G: Grid + ?Sized>(sheet: &G, row: usize, max_cols: usize) -> Vec<String> {
    let width = sheet.row_width(row).min(max_cols);
    (0..width).map(|c| sheet.text(CellAddr::new(row, c))).collect()
}

/// First row within the scan limits that qualifies as the table header.
pub fn locate_header<G: Grid + ?Sized>(sheet: &G, cfg: &HeaderConfig) -> Result<usize, SimError> {
    let last = sheet
        .last_row()
        .ok_or_else(|| SimError::SchemaNotFound("sheet is empty".into()))?;
    let limit = last.min(cfg.scan_rows);
    for row in 0..=limit {
        if header_matches(&row_texts(sheet, row, cfg.scan_cols), cfg) {
            info!(row, "found product table header");
            return Ok(row);
        }
    }
    Err(SimError::SchemaNotFound(format!(
        "no header row with '{}', '{}', '{}' and '{}' within the first {} rows",
        cfg.category,
        cfg.article,
        cfg.quantity,
        cfg.profit,
        limit + 1
    )))
}

/// Map header texts to table columns. Pure; `header_row` is only recorded.
pub fn resolve_schema(header_row: usize, cells: &[String], cfg: &HeaderConfig) -> SchemaResolution {
    let t = Tokens::new(cfg);
    let cells = lowered(cells);
    if cells.is_empty() {
        return SchemaResolution::NotFound("header row is empty".into());
    }
    let anchors: Vec<usize> = (0..cells.len()).filter(|&c| cells[c] == t.category).collect();
    if anchors.is_empty() {
        return SchemaResolution::NotFound(format!("no '{}' column in header", cfg.category));
    }

    for &anchor in &anchors {
        let end = anchor.saturating_add(cfg.window).min(cells.len() - 1);
        let window = anchor..=end;
        let first = |pred: &dyn Fn(&str) -> bool| window.clone().find(|&c| pred(&cells[c]));

        let article = first(&|c: &str| c == t.article);
        let category_label = first(&|c: &str| c == t.category_label);
        let quantity = first(&|c: &str| c.contains(&t.quantity));
        let profit = window.clone().rev().find(|&c| cells[c] == t.profit);
        // "cmp medio" contains "p medio"; a price column must not be a cost column.
        let unit_price = first(&|c: &str| c.contains(&t.unit_price) && !c.contains(&t.unit_cost));
        let unit_price_secondary = first(&|c: &str| {
            c.contains(&t.unit_price_secondary) && !c.contains(&t.unit_cost_secondary)
        });
        let unit_cost = first(&|c: &str| c.contains(&t.unit_cost));
        let unit_cost_secondary = first(&|c: &str| c.contains(&t.unit_cost_secondary));

        debug!(
            anchor,
            ?article,
            ?category_label,
            ?quantity,
            ?profit,
            ?unit_price,
            ?unit_cost,
            "header block candidate"
        );

        if unit_price.is_none() && unit_cost.is_none() {
            continue;
        }
        if let (Some(article), Some(category_label), Some(quantity), Some(profit)) =
            (article, category_label, quantity, profit)
        {
            return SchemaResolution::Found(TableSchema {
                header_row,
                category: anchor,
                article,
                category_label,
                quantity,
                unit_price,
                unit_price_secondary,
                unit_cost,
                unit_cost_secondary,
                profit,
            });
        }
    }
    SchemaResolution::NotFound(format!(
        "none of {} '{}' blocks has all required columns",
        anchors.len(),
        cfg.category
    ))
}

/// Resolve the schema from the header row of `sheet`.
pub fn detect_columns<G: Grid + ?Sized>(
    sheet: &G,
    header_row: usize,
    cfg: &HeaderConfig,
) -> Result<TableSchema, SimError> {
    let cells = row_texts(sheet, header_row, usize::MAX);
    let schema = resolve_schema(header_row, &cells, cfg).into_result()?;
    info!(
        header_row,
        anchor = schema.category,
        profit = schema.profit,
        "resolved product table schema"
    );
    Ok(schema)
}
