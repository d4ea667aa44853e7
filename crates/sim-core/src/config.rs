//! Engine configuration loaded from YAML.
//!
//! Every field has a default, so a file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use sheet_doc::CellAddr;
use std::path::Path;
use thiserror::Error;

use crate::Category;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Tokens, bounds and coordinates used by the simulators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the sheet holding the product table.
    pub product_sheet: String,
    pub numbers: NumberFormat,
    pub header: HeaderConfig,
    pub catalog: CatalogConfig,
    pub statement: StatementConfig,
    pub premium: PremiumConfig,
    pub tolerance: ToleranceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            product_sheet: "Ricavi".into(),
            numbers: NumberFormat::default(),
            header: HeaderConfig::default(),
            catalog: CatalogConfig::default(),
            statement: StatementConfig::default(),
            premium: PremiumConfig::default(),
            tolerance: ToleranceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

/// Separators of numbers stored as text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub thousands_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            thousands_separator: '.',
        }
    }
}

/// Header tokens of the product table and the scan limits used to find it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Exact match, also the anchor of each header block.
    pub category: String,
    /// Exact match.
    pub article: String,
    /// Exact match.
    pub category_label: String,
    /// Substring match.
    pub quantity: String,
    /// Exact match; the last one in the window wins.
    pub profit: String,
    /// Substring matches for the unit figures.
    pub unit_price: String,
    pub unit_price_secondary: String,
    pub unit_cost: String,
    pub unit_cost_secondary: String,
    pub scan_rows: usize,
    pub scan_cols: usize,
    /// Columns after the anchor searched for the other roles.
    pub window: usize,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            category: "Cat".into(),
            article: "Articolo".into(),
            category_label: "Categoria".into(),
            quantity: "quantità".into(),
            profit: "POS".into(),
            unit_price: "p medio (€/kg)".into(),
            unit_price_secondary: "p medio ($/kg)".into(),
            unit_cost: "cmp medio (€/kg)".into(),
            unit_cost_secondary: "cmp medio ($/kg)".into(),
            scan_rows: 200,
            scan_cols: 200,
            window: 50,
        }
    }
}

/// Article classification rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Article names starting with this prefix are skipped.
    pub excluded_prefix: String,
    pub max_suffix: SuffixBounds,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            excluded_prefix: "PCL".into(),
            max_suffix: SuffixBounds::default(),
        }
    }
}

/// Highest accepted numeric suffix per category; the lowest is 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixBounds {
    pub mp: u32,
    pub pfp: u32,
    pub pfv: u32,
    pub pfa: u32,
}

impl Default for SuffixBounds {
    fn default() -> Self {
        Self {
            mp: 14,
            pfp: 7,
            pfv: 16,
            pfa: 19,
        }
    }
}

impl SuffixBounds {
    pub fn max_for(&self, category: Category) -> u32 {
        match category {
            Category::MP => self.mp,
            Category::PFP => self.pfp,
            Category::PFV => self.pfv,
            Category::PFA => self.pfa,
        }
    }
}

/// Where the budget income statement lives and how it is laid out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    pub budget_year: u16,
    /// Exact sheet names tried first; `{year}` expands to the budget year.
    pub sheet_names: Vec<String>,
    /// Tokens that must appear together in one cell of an unnamed sheet.
    pub statement_token: String,
    pub budget_token: String,
    pub scan_rows: usize,
    pub scan_cols: usize,
    pub cells: StatementCells,
    /// Left-margin columns searched by label, inclusive.
    pub label_cols: usize,
    pub label_rows: usize,
    /// Column holding the value of a labelled row.
    pub value_col: usize,
    /// Aggregate lines of the extended view, in display order.
    pub extended: Vec<LabelledLine>,
}

impl Default for StatementConfig {
    fn default() -> Self {
        let names = [
            "CE-Budget-{year}",
            "CE BUDGET {year}",
            "CE_BUDGET_{year}",
            "CE Budget {year}",
            "CE BUDGET{year}",
            "CEBudget{year}",
        ];
        let extended = [
            ("Ricavi PF", "RICAVI DELLE VENDITE DI PRODOTTI FINITI"),
            ("Ricavi MP", "RICAVI DELLE VENDITE DI MATERIE PRIME"),
            ("Ricavi C/Lav.", "RICAVI CONTO LAVORAZIONE"),
            ("Altri ricavi", "ALTRI RICAVI"),
            ("Var. PF", "VARIAZIONE PRODOTTI FINITI"),
            ("Tot. Ricavi produzione (A)", "TOTALE RICAVI PRODUZIONE"),
            ("Acquisto MP", "ACQUISTO MATERIE PRIME"),
            ("Var. scorte", "VARIAZIONE SCORTE"),
            ("Tot. Costi MP (B)", "TOTALE COSTI MATERIE PRIME"),
            ("Costo energia", "COSTO ENERGIA"),
            ("Materiali di consumo", "MATERIALI DI CONSUMO"),
            ("Pulizia/smaltimento", "PULIZIA"),
            ("Tot. Costi variabili prod. (C)", "COSTI VARIABILI DI PRODUZIONE"),
            ("Trasporti/oneri vendita+acquisto", "TRASPORTI"),
            ("Provvigioni/Enasarco", "PROVVIGIONI"),
            ("Tot. Costi di vendita (D)", "TOTALE COSTI DI VENDITA"),
            ("MOL (A-B-C-D)", "MARGINE OPERATIVO LORDO"),
        ];
        Self {
            budget_year: 2022,
            sheet_names: names.iter().map(|s| s.to_string()).collect(),
            statement_token: "CE".into(),
            budget_token: "BUDGET".into(),
            scan_rows: 40,
            scan_cols: 25,
            cells: StatementCells::default(),
            label_cols: 8,
            label_rows: 200,
            value_col: 9,
            extended: extended
                .iter()
                .map(|(display, needle)| LabelledLine {
                    display: display.to_string(),
                    needle: needle.to_string(),
                })
                .collect(),
        }
    }
}

impl StatementConfig {
    /// Candidate sheet names with the budget year filled in.
    pub fn candidate_names(&self) -> Vec<String> {
        let year = self.budget_year.to_string();
        self.sheet_names
            .iter()
            .map(|n| n.replace("{year}", &year))
            .collect()
    }
}

/// Fixed cells of the seven statement line items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementCells {
    pub finished_goods_revenue: CellAddr,
    pub raw_material_revenue: CellAddr,
    pub contract_work_revenue: CellAddr,
    pub other_revenue: CellAddr,
    pub finished_goods_variation: CellAddr,
    pub raw_material_purchases: CellAddr,
    pub inventory_variation: CellAddr,
}

impl Default for StatementCells {
    fn default() -> Self {
        let j = |row| CellAddr::new(row, 9);
        Self {
            finished_goods_revenue: j(4),
            raw_material_revenue: j(5),
            contract_work_revenue: j(6),
            other_revenue: j(7),
            finished_goods_variation: j(8),
            raw_material_purchases: j(10),
            inventory_variation: j(11),
        }
    }
}

/// A statement row found by a label substring, shown under `display`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelledLine {
    pub display: String,
    pub needle: String,
}

/// Cells of the premium channel on the product sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PremiumConfig {
    pub months: CellAddr,
    pub monthly: CellAddr,
    pub annual: CellAddr,
    pub adjustment: CellAddr,
    /// Aggregate profit the premium offsets.
    pub total_profit: CellAddr,
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            months: CellAddr::new(65, 15),
            monthly: CellAddr::new(65, 16),
            annual: CellAddr::new(65, 22),
            adjustment: CellAddr::new(65, 23),
            total_profit: CellAddr::new(66, 23),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Denominators closer to zero than this make compensation impossible.
    pub compensation_epsilon: f64,
    /// Relative tolerance of document cross-checks.
    pub cross_check_relative: f64,
    /// Absolute floor of document cross-checks.
    pub cross_check_absolute: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            compensation_epsilon: 1e-12,
            cross_check_relative: 1e-6,
            cross_check_absolute: 1e-6,
        }
    }
}

impl ToleranceConfig {
    /// Whether a document figure agrees with the analytic one.
    pub fn agrees(&self, analytic: f64, observed: f64) -> bool {
        let allowed = (analytic.abs() * self.cross_check_relative).max(self.cross_check_absolute);
        (analytic - observed).abs() <= allowed
    }
}
