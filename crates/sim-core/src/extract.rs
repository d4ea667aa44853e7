//! Cell-level number extraction.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sheet_doc::{Cell, CellAddr, Evaluated, Grid};
use std::str::FromStr;
use tracing::trace;

use crate::config::NumberFormat;
use crate::SimError;

/// Reads any cell as a number and writes plain numbers back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueExtractor {
    format: NumberFormat,
}

impl ValueExtractor {
    pub fn new(format: NumberFormat) -> Self {
        Self { format }
    }

    /// Numeric value of the cell; 0.0 whenever no number can be obtained.
    pub fn read_number<G: Grid + ?Sized>(&self, sheet: &G, row: usize, col: usize) -> f64 {
        let addr = CellAddr::new(row, col);
        let value = match sheet.cell(addr) {
            None | Some(Cell::Empty) => 0.0,
            Some(Cell::Number(v)) => *v,
            Some(Cell::Formula(_)) => match sheet.evaluate(addr) {
                Evaluated::Number(v) => v,
                Evaluated::Text(s) => parse_locale_number(&s, &self.format).unwrap_or(0.0),
                Evaluated::Empty | Evaluated::Error(_) => 0.0,
            },
            Some(Cell::Text(s)) => parse_locale_number(s, &self.format).unwrap_or(0.0),
        };
        trace!(cell = %addr, value, "read number");
        value
    }

    /// Store `value` as a plain number, replacing any formula.
    pub fn write_number<G: Grid + ?Sized>(&self, sheet: &mut G, row: usize, col: usize, value: f64) {
        sheet.set_cell(CellAddr::new(row, col), Cell::Number(value));
    }

    pub fn read_at<G: Grid + ?Sized>(&self, sheet: &G, addr: CellAddr) -> f64 {
        self.read_number(sheet, addr.row, addr.col)
    }

    pub fn write_at<G: Grid + ?Sized>(&self, sheet: &mut G, addr: CellAddr, value: f64) {
        self.write_number(sheet, addr.row, addr.col, value)
    }
}

/// Parse number text in the configured convention, e.g. `"1.234,5"`.
pub fn parse_locale_number(text: &str, format: &NumberFormat) -> Option<f64> {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_whitespace() || c == format.thousands_separator {
            continue;
        }
        cleaned.push(if c == format.decimal_separator { '.' } else { c });
    }
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()?.to_f64()
}

/// Parse a user percentage, accepting both `3,5` and `3.5` and a trailing `%`.
pub fn parse_percent(text: &str) -> Result<f64, SimError> {
    let invalid = || SimError::InvalidPercent(text.to_string());
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let value: f64 = trimmed.replace(',', ".").parse().map_err(|_| invalid())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}

/// Trim and collapse runs of whitespace to one space.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sheet_doc::Sheet;

    fn sheet() -> Sheet {
        Sheet::new("Ricavi")
            .with("A1", Cell::Number(2.5))
            .unwrap()
            .with("B1", Cell::text("1.234,50"))
            .unwrap()
            .with("C1", Cell::text("n/a"))
            .unwrap()
            .with("D1", Cell::formula("A1*4"))
            .unwrap()
            .with("E1", Cell::formula("C1+1"))
            .unwrap()
    }

    #[test]
    fn reads_every_representation() {
        let s = sheet();
        let x = ValueExtractor::default();
        assert_eq!(x.read_number(&s, 0, 0), 2.5);
        assert_eq!(x.read_number(&s, 0, 1), 1234.5);
        assert_eq!(x.read_number(&s, 0, 2), 0.0);
        assert_eq!(x.read_number(&s, 0, 3), 10.0);
        assert_eq!(x.read_number(&s, 0, 4), 0.0);
        assert_eq!(x.read_number(&s, 7, 7), 0.0);
    }

    #[test]
    fn write_replaces_formula_and_dependents_follow() {
        let mut s = sheet();
        let x = ValueExtractor::default();
        x.write_number(&mut s, 0, 3, 1.0);
        assert_eq!(s.cell(CellAddr::new(0, 3)), Some(&Cell::Number(1.0)));
        x.write_number(&mut s, 0, 0, 3.0);
        s.set_cell(CellAddr::new(1, 0), Cell::formula("A1*2"));
        assert_eq!(x.read_number(&s, 1, 0), 6.0);
        x.write_number(&mut s, 5, 5, -1.5);
        assert_eq!(x.read_number(&s, 5, 5), -1.5);
    }

    #[test]
    fn locale_text_forms() {
        let it = NumberFormat::default();
        assert_eq!(parse_locale_number("  -12,5 ", &it), Some(-12.5));
        assert_eq!(parse_locale_number("1.000.000", &it), Some(1_000_000.0));
        assert_eq!(parse_locale_number("1 234,75", &it), Some(1234.75));
        assert_eq!(parse_locale_number("", &it), None);
        assert_eq!(parse_locale_number("abc", &it), None);
        assert_eq!(parse_locale_number("inf", &it), None);
        let us = NumberFormat {
            decimal_separator: '.',
            thousands_separator: ',',
        };
        assert_eq!(parse_locale_number("1,234.5", &us), Some(1234.5));
    }

    #[test]
    fn percent_accepts_comma_and_dot() {
        assert_eq!(parse_percent("3,5").unwrap(), 3.5);
        assert_eq!(parse_percent("3.5").unwrap(), 3.5);
        assert_eq!(parse_percent(" -20 %").unwrap(), -20.0);
        assert_eq!(parse_percent("+10").unwrap(), 10.0);
        assert_eq!(parse_percent("ten"), Err(SimError::InvalidPercent("ten".into())));
        assert!(parse_percent("").is_err());
        assert!(parse_percent("NaN").is_err());
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_spaces("  PF \t V   12 "), "PF V 12");
    }

    proptest! {
        #[test]
        fn formatted_integers_parse_back(n in -9_999_999i64..9_999_999) {
            let plain = n.unsigned_abs().to_string();
            let mut grouped = String::new();
            for (i, ch) in plain.chars().enumerate() {
                if i > 0 && (plain.len() - i) % 3 == 0 {
                    grouped.push('.');
                }
                grouped.push(ch);
            }
            let text = if n < 0 { format!("-{grouped},25") } else { format!("{grouped},25") };
            let expected = n as f64 + if n < 0 { -0.25 } else { 0.25 };
            prop_assert_eq!(parse_locale_number(&text, &NumberFormat::default()), Some(expected));
        }
    }
}
