//! A small budget workbook laid out like the real one.
//!
//! Product table header on row 4 starting at column F, row profit as a
//! formula, premium block on rows 66/67 and a `CE Budget 2022` statement.

use sheet_doc::{Cell, CellAddr, Grid, Sheet, Workbook};

/// (category, article, label, quantity, price €, cost €)
const ROWS: [(&str, &str, &str, f64, f64, f64); 7] = [
    ("PFV", "PF V 3", "Vaschette", 800.0, 4.0, 3.1),
    ("MP", "MP 1", "Granulo", 1000.0, 2.0, 1.5),
    ("PFP", "PF P 1", "Piatti", 2000.0, 3.5, 2.6),
    ("PCL", "PCL 1", "Conto lavoro", 300.0, 1.0, 0.5),
    ("MP", "MP 2", "Granulo fine", 5000.0, 1.2, 0.9),
    ("PFA", "PFA2", "Alveoli", 1500.0, 2.8, 2.0),
    ("MP", "MP 15", "Fuori listino", 10.0, 1.0, 1.0),
];

const HEADER: [&str; 9] = [
    "Cat",
    "Articolo",
    "Categoria",
    "Quantità (kg)",
    "P medio (€/kg)",
    "P medio ($/kg)",
    "CMP medio (€/kg)",
    "CMP medio ($/kg)",
    "POS",
];

const HEADER_ROW: usize = 3;
const FIRST_COL: usize = 5;

fn product_sheet() -> Sheet {
    let mut sheet = Sheet::new("Ricavi");
    sheet.set_cell(CellAddr::new(0, 0), Cell::text("Ricavi budget 2022"));
    for (i, text) in HEADER.iter().enumerate() {
        sheet.set_cell(CellAddr::new(HEADER_ROW, FIRST_COL + i), Cell::text(*text));
    }
    for (i, (cat, article, label, q, p, c)) in ROWS.iter().enumerate() {
        let row = HEADER_ROW + 1 + i;
        let r = row + 1;
        let at = |offset: usize| CellAddr::new(row, FIRST_COL + offset);
        sheet.set_cell(at(0), Cell::text(*cat));
        sheet.set_cell(at(1), Cell::text(*article));
        sheet.set_cell(at(2), Cell::text(*label));
        sheet.set_cell(at(3), Cell::Number(*q));
        sheet.set_cell(at(4), Cell::Number(*p));
        sheet.set_cell(at(5), Cell::formula(format!("J{r}*1.1")));
        sheet.set_cell(at(6), Cell::Number(*c));
        sheet.set_cell(at(7), Cell::formula(format!("L{r}*1.1")));
        sheet.set_cell(at(8), Cell::formula(format!("I{r}*(J{r}-L{r})")));
    }
    // premium block: months P66, monthly Q66, annual W66, adjustment X66
    sheet.set_cell(CellAddr::new(65, 14), Cell::text("Premio"));
    sheet.set_cell(CellAddr::new(65, 15), Cell::Number(12.0));
    sheet.set_cell(CellAddr::new(65, 16), Cell::Number(500.0));
    sheet.set_cell(CellAddr::new(65, 22), Cell::formula("Q66*P66"));
    sheet.set_cell(CellAddr::new(65, 23), Cell::formula("-W66"));
    sheet.set_cell(CellAddr::new(66, 22), Cell::text("POS totale"));
    sheet.set_cell(CellAddr::new(66, 23), Cell::formula("SUM(N5:N64)+X66"));
    sheet
}

fn statement_sheet() -> Sheet {
    let mut sheet = Sheet::new("CE Budget 2022");
    sheet.set_cell(CellAddr::new(0, 0), Cell::text("CE BUDGET 2022"));
    let lines: [(usize, &str, f64); 11] = [
        (4, "Ricavi delle vendite di prodotti finiti", 250_000.0),
        (5, "Ricavi delle vendite di materie prime", 100_000.0),
        (6, "Ricavi conto lavorazione", 12_000.0),
        (7, "Altri ricavi", 3_000.0),
        (8, "Variazione prodotti finiti", -1_500.0),
        (10, "Acquisto materie prime", -60_000.0),
        (11, "Variazione scorte", 2_000.0),
        (13, "Costo energia", -18_000.0),
        (14, "Materiali di consumo", -4_000.0),
        (16, "Trasporti", -9_000.0),
        (17, "Provvigioni", -5_000.0),
    ];
    for (row, label, value) in lines {
        sheet.set_cell(CellAddr::new(row, 1), Cell::text(label));
        sheet.set_cell(CellAddr::new(row, 9), Cell::Number(value));
    }
    sheet.set_cell(CellAddr::new(9, 1), Cell::text("Totale ricavi produzione (A)"));
    sheet.set_cell(CellAddr::new(9, 9), Cell::formula("SUM(J5:J9)"));
    sheet.set_cell(CellAddr::new(12, 1), Cell::text("Totale costi materie prime (B)"));
    sheet.set_cell(CellAddr::new(12, 9), Cell::formula("J11+J12"));
    sheet.set_cell(CellAddr::new(19, 1), Cell::text("Margine operativo lordo"));
    sheet.set_cell(CellAddr::new(19, 9), Cell::formula("J10+J13+J14+J15+J17+J18"));
    sheet
}

/// Product sheet, statement sheet and an unrelated notes sheet.
pub fn workbook() -> Workbook {
    let notes = Sheet::new("Note");
    Workbook::from_sheets(vec![product_sheet(), statement_sheet(), notes]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_doc::Document;
    use sim_core::{load_catalog, EngineConfig, ValueExtractor};

    #[test]
    fn sample_catalog_and_totals() {
        let wb = workbook();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        let names: Vec<&str> = catalog.rows.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(names, vec!["MP 1", "MP 2", "PF P 1", "PF V 3", "PFA2"]);
        assert_eq!(catalog.schema.header_row, 3);
        assert_eq!(catalog.schema.unit_price_secondary, Some(10));

        let sheet = wb.sheet("Ricavi").unwrap();
        let x = ValueExtractor::default();
        assert_eq!(x.read_number(sheet, 4, 13), 800.0 * (4.0 - 3.1));
        assert_eq!(x.read_number(sheet, 65, 23), -6000.0);
    }
}
