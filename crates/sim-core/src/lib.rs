#![deny(warnings)]

//! Core domain models for margin scenarios.
//!
//! This crate owns the vocabulary shared by the simulators: the engine
//! configuration, the error type, the product-table schema and catalog, and
//! the cell-level number extraction every other component builds on.

pub mod catalog;
pub mod config;
pub mod extract;
pub mod schema;

pub use catalog::{find_article, load_catalog, ArticleIndex, Catalog};
pub use config::{ConfigError, EngineConfig};
pub use extract::{normalize_spaces, parse_locale_number, parse_percent, ValueExtractor};
pub use schema::{detect_columns, locate_header, resolve_schema, SchemaResolution};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Product family of a catalog row, in catalog priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Raw material.
    MP,
    /// Finished product, P line.
    PFP,
    /// Finished product, V line.
    PFV,
    /// Finished product, A line.
    PFA,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::MP, Category::PFP, Category::PFV, Category::PFA];

    pub fn tag(&self) -> &'static str {
        match self {
            Category::MP => "MP",
            Category::PFP => "PFP",
            Category::PFV => "PFV",
            Category::PFA => "PFA",
        }
    }

    /// Raw material moves raw-material revenue and purchases in the statement.
    pub fn is_raw_material(&self) -> bool {
        matches!(self, Category::MP)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Category::ALL
            .into_iter()
            .find(|c| c.tag().eq_ignore_ascii_case(&compact))
            .ok_or_else(|| format!("unknown category '{}' (expected MP, PFP, PFV or PFA)", s.trim()))
    }
}

/// Commercial lever perturbed by a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lever {
    /// Sold quantity; compensated through the unit price.
    Quantity,
    /// Unit price; compensated through the sold quantity.
    Price,
}

impl fmt::Display for Lever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lever::Quantity => f.write_str("quantity"),
            Lever::Price => f.write_str("price"),
        }
    }
}

impl FromStr for Lever {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quantity" | "q" | "qty" => Ok(Lever::Quantity),
            "price" | "p" => Ok(Lever::Price),
            other => Err(format!("unknown lever '{other}' (expected quantity or price)")),
        }
    }
}

/// Column positions of the product table, tied to one header row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Zero-based header row.
    pub header_row: usize,
    /// Category anchor column.
    pub category: usize,
    pub article: usize,
    pub category_label: usize,
    pub quantity: usize,
    /// Unit price, primary currency.
    pub unit_price: Option<usize>,
    /// Unit price, secondary currency.
    pub unit_price_secondary: Option<usize>,
    /// Unit cost, primary currency.
    pub unit_cost: Option<usize>,
    /// Unit cost, secondary currency.
    pub unit_cost_secondary: Option<usize>,
    /// Row profit (POS) column.
    pub profit: usize,
}

/// Columns a catalog row reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowColumns {
    pub quantity: usize,
    pub unit_price: usize,
    pub unit_price_secondary: Option<usize>,
    pub unit_cost: usize,
    pub unit_cost_secondary: Option<usize>,
    pub profit: usize,
}

/// One classified product line of the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub category: Category,
    /// Article name with whitespace normalized, e.g. "PF V 12".
    pub article: String,
    /// Numeric suffix parsed from the article name.
    pub suffix: u32,
    /// Free-text category label, verbatim.
    pub category_label: String,
    /// Zero-based sheet row.
    pub row: usize,
    pub columns: RowColumns,
}

/// A single what-if request against one catalog row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub category: Category,
    pub article: String,
    pub lever: Lever,
    /// Percentage change of the lever, may be negative.
    pub percent: f64,
}

/// Domain failures of catalog building and simulation.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// No usable header row or column set in the product sheet.
    #[error("table schema not found: {0}")]
    SchemaNotFound(String),
    /// Requested article is not in the catalog.
    #[error("no catalog row for {category} '{article}'")]
    RowNotFound { category: String, article: String },
    /// A figure that must be positive is not.
    #[error("invalid {what}: {value}")]
    InvalidValue { what: String, value: f64 },
    /// The compensating lever has no admissible value.
    #[error("compensation impossible: {0}")]
    CompensationImpossible(String),
    /// A required sheet is missing from the document.
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    /// Percentage text that does not parse as a finite number.
    #[error("invalid percentage: '{0}'")]
    InvalidPercent(String),
}
