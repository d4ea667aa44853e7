//! Article classification and the product catalog.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sheet_doc::{CellAddr, Document, Grid};
use tracing::{debug, info};

use crate::config::{CatalogConfig, EngineConfig};
use crate::extract::normalize_spaces;
use crate::schema::{detect_columns, locate_header};
use crate::{ArticleRow, Category, RowColumns, SimError, TableSchema};

static RAW_MATERIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^MP\s*(\d{1,2})$").expect("raw material pattern"));
static FINISHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PF\s*([PVA])\s*(\d{1,2})$").expect("finished product pattern"));

/// Classifies article names into categories.
#[derive(Clone, Debug, Default)]
pub struct ArticleIndex {
    config: CatalogConfig,
}

impl ArticleIndex {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    /// Category and numeric suffix of an article name, if it is a catalog article.
    pub fn classify(&self, name: &str) -> Option<(Category, u32)> {
        let name = normalize_spaces(name).to_uppercase();
        if name.is_empty() {
            return None;
        }
        let prefix = self.config.excluded_prefix.trim().to_uppercase();
        if !prefix.is_empty() && name.starts_with(&prefix) {
            return None;
        }
        let (category, digits) = if let Some(caps) = RAW_MATERIAL.captures(&name) {
            (Category::MP, caps.get(1)?)
        } else {
            let caps = FINISHED.captures(&name)?;
            let category = match caps.get(1)?.as_str() {
                "P" => Category::PFP,
                "V" => Category::PFV,
                _ => Category::PFA,
            };
            (category, caps.get(2)?)
        };
        let suffix: u32 = digits.as_str().parse().ok()?;
        (1..=self.config.max_suffix.max_for(category))
            .contains(&suffix)
            .then_some((category, suffix))
    }

    /// Every classified row below the header, sorted by category then suffix.
    pub fn build_catalog<G: Grid + ?Sized>(
        &self,
        sheet: &G,
        schema: &TableSchema,
    ) -> Result<Vec<ArticleRow>, SimError> {
        let (unit_price, unit_cost) = match (schema.unit_price, schema.unit_cost) {
            (Some(p), Some(c)) => (p, c),
            _ => {
                return Err(SimError::SchemaNotFound(
                    "catalog needs both unit price and unit cost columns".into(),
                ))
            }
        };
        let columns = RowColumns {
            quantity: schema.quantity,
            unit_price,
            unit_price_secondary: schema.unit_price_secondary,
            unit_cost,
            unit_cost_secondary: schema.unit_cost_secondary,
            profit: schema.profit,
        };

        let mut rows = Vec::new();
        let last = sheet.last_row().unwrap_or(0);
        for row in schema.header_row + 1..=last {
            let name = sheet.text(CellAddr::new(row, schema.article));
            let Some((category, suffix)) = self.classify(&name) else {
                if !name.trim().is_empty() {
                    debug!(row, name = %name, "skipping unclassified article");
                }
                continue;
            };
            rows.push(ArticleRow {
                category,
                article: normalize_spaces(&name),
                suffix,
                category_label: sheet.text(CellAddr::new(row, schema.category_label)),
                row,
                columns,
            });
        }
        rows.sort_by_key(|r| (r.category, r.suffix));
        info!(articles = rows.len(), "built article catalog");
        Ok(rows)
    }
}

/// Look up an article by category and name, ignoring case and spacing.
pub fn find_article<'a>(
    catalog: &'a [ArticleRow],
    category: Category,
    article: &str,
) -> Result<&'a ArticleRow, SimError> {
    let wanted = normalize_spaces(article).to_uppercase();
    catalog
        .iter()
        .find(|r| r.category == category && r.article.to_uppercase() == wanted)
        .ok_or_else(|| SimError::RowNotFound {
            category: category.to_string(),
            article: article.to_string(),
        })
}

/// Schema and catalog of a product sheet, owned by the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Catalog {
    pub schema: TableSchema,
    pub rows: Vec<ArticleRow>,
}

impl Catalog {
    pub fn find(&self, category: Category, article: &str) -> Result<&ArticleRow, SimError> {
        find_article(&self.rows, category, article)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Locate the product table in `doc` and build its catalog.
pub fn load_catalog<D: Document + ?Sized>(doc: &D, config: &EngineConfig) -> Result<Catalog, SimError> {
    let sheet = doc
        .sheet(&config.product_sheet)
        .ok_or_else(|| SimError::SheetNotFound(config.product_sheet.clone()))?;
    let header_row = locate_header(sheet, &config.header)?;
    let schema = detect_columns(sheet, header_row, &config.header)?;
    let rows = ArticleIndex::new(config.catalog.clone()).build_catalog(sheet, &schema)?;
    Ok(Catalog { schema, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_doc::{Cell, Sheet, Workbook};

    fn index() -> ArticleIndex {
        ArticleIndex::default()
    }

    #[test]
    fn classifies_spelling_variants() {
        let ix = index();
        assert_eq!(ix.classify("MP 3"), Some((Category::MP, 3)));
        assert_eq!(ix.classify("mp03"), Some((Category::MP, 3)));
        assert_eq!(ix.classify("PFP1"), Some((Category::PFP, 1)));
        assert_eq!(ix.classify("PF P 2"), Some((Category::PFP, 2)));
        assert_eq!(ix.classify(" PF  V 12 "), Some((Category::PFV, 12)));
        assert_eq!(ix.classify("PFA7"), Some((Category::PFA, 7)));
        assert_eq!(ix.classify("PF X 1"), None);
        assert_eq!(ix.classify("MP"), None);
        assert_eq!(ix.classify("MP 123"), None);
        assert_eq!(ix.classify("PCL 1"), None);
        assert_eq!(ix.classify(""), None);
    }

    #[test]
    fn suffix_bounds_per_category() {
        let ix = index();
        assert!(ix.classify("MP14").is_some());
        assert!(ix.classify("MP15").is_none());
        assert!(ix.classify("PFP7").is_some());
        assert!(ix.classify("PFP8").is_none());
        assert!(ix.classify("PFV16").is_some());
        assert!(ix.classify("PFV17").is_none());
        assert!(ix.classify("PFA19").is_some());
        assert!(ix.classify("PFA20").is_none());
        assert!(ix.classify("MP0").is_none());
    }

    fn product_sheet() -> Sheet {
        let header = [
            "Cat",
            "Articolo",
            "Categoria",
            "Quantità",
            "p medio (€/kg)",
            "cmp medio (€/kg)",
            "POS",
        ];
        let mut sheet = Sheet::new("Ricavi");
        for (c, text) in header.iter().enumerate() {
            sheet.set_cell(CellAddr::new(1, c), Cell::text(*text));
        }
        let rows = [
            ("PFV", "PF V 2", "Vaschette"),
            ("MP", "MP 10", "Granulo"),
            ("PCL", "PCL 1", "Conto lavoro"),
            ("PFP", "PFP1", "Piatti"),
            ("MP", "MP 2", "Granulo"),
            ("MP", "MP 15", "Fuori range"),
        ];
        for (i, (cat, name, label)) in rows.iter().enumerate() {
            let r = i + 2;
            sheet.set_cell(CellAddr::new(r, 0), Cell::text(*cat));
            sheet.set_cell(CellAddr::new(r, 1), Cell::text(*name));
            sheet.set_cell(CellAddr::new(r, 2), Cell::text(*label));
            sheet.set_cell(CellAddr::new(r, 3), Cell::Number(100.0));
        }
        sheet
    }

    #[test]
    fn catalog_is_filtered_and_sorted() {
        let wb = Workbook::from_sheets(vec![product_sheet()]).unwrap();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        let names: Vec<&str> = catalog.rows.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(names, vec!["MP 2", "MP 10", "PFP1", "PF V 2"]);
        let pfp = catalog.find(Category::PFP, "pfp1").unwrap();
        assert_eq!(pfp.row, 5);
        assert_eq!(pfp.category_label, "Piatti");
        assert_eq!(pfp.columns.unit_price, 4);
        assert_eq!(pfp.columns.unit_cost, 5);
        assert_eq!(pfp.columns.profit, 6);
    }

    #[test]
    fn lookup_miss_is_row_not_found() {
        let wb = Workbook::from_sheets(vec![product_sheet()]).unwrap();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        assert_eq!(
            catalog.find(Category::MP, "MP 9"),
            Err(SimError::RowNotFound {
                category: "MP".into(),
                article: "MP 9".into()
            })
        );
        assert!(catalog.find(Category::PFV, "MP 2").is_err());
        assert!(catalog.find(Category::PFV, "pf  v 2").is_ok());
    }

    #[test]
    fn catalog_requires_price_and_cost() {
        let mut sheet = product_sheet();
        sheet.set_cell(CellAddr::new(1, 4), Cell::text("listino"));
        let schema = detect_columns(&sheet, 1, &Default::default()).unwrap();
        assert_eq!(schema.unit_price, None);
        assert!(matches!(
            index().build_catalog(&sheet, &schema),
            Err(SimError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn missing_product_sheet() {
        let wb = Workbook::new();
        assert_eq!(
            load_catalog(&wb, &EngineConfig::default()),
            Err(SimError::SheetNotFound("Ricavi".into()))
        );
    }
}
