use serde::{Deserialize, Serialize};

/// Stored content of one cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Number(f64),
    Formula(Formula),
    Text(String),
    Empty,
}

/// A formula expression and the last result computed for it, if known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Expression text without the leading `=`.
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<f64>,
}

impl Formula {
    pub fn new(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        let expr = expr.strip_prefix('=').map(str::to_string).unwrap_or(expr);
        Self { expr, cached: None }
    }

    pub fn with_cached(mut self, cached: f64) -> Self {
        self.cached = Some(cached);
        self
    }
}

/// Result of reading a cell with formulas evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluated {
    Number(f64),
    Text(String),
    Empty,
    /// Excel-style error code such as `#DIV/0!` or `#CIRC`.
    Error(String),
}

impl Evaluated {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Evaluated::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl Cell {
    /// Shorthand for a formula cell; a leading `=` is accepted.
    pub fn formula(expr: impl Into<String>) -> Self {
        Cell::Formula(Formula::new(expr))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text as a spreadsheet would display it in "General" format.
    ///
    /// Formula cells show their cached result; without one they display
    /// nothing.
    pub fn display_text(&self) -> String {
        match self {
            Cell::Number(v) => general_format(*v),
            Cell::Formula(f) => f.cached.map(general_format).unwrap_or_default(),
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }
}

fn general_format(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_strips_leading_equals() {
        assert_eq!(Formula::new("=B2*C2").expr, "B2*C2");
        assert_eq!(Formula::new("B2*C2").expr, "B2*C2");
    }

    #[test]
    fn display_text_uses_general_format() {
        assert_eq!(Cell::Number(1000.0).display_text(), "1000");
        assert_eq!(Cell::Number(1.5).display_text(), "1.5");
        assert_eq!(Cell::text("POS").display_text(), "POS");
        assert_eq!(Cell::formula("=A1").display_text(), "");
        assert_eq!(
            Cell::Formula(Formula::new("A1").with_cached(12.0)).display_text(),
            "12"
        );
        assert_eq!(Cell::Empty.display_text(), "");
    }

    #[test]
    fn cell_json_is_tagged() {
        let json = serde_json::to_string(&Cell::Number(2.5)).unwrap();
        assert_eq!(json, r#"{"type":"number","value":2.5}"#);
        let back: Cell =
            serde_json::from_str(r#"{"type":"formula","value":{"expr":"A1*2"}}"#).unwrap();
        assert_eq!(back, Cell::formula("A1*2"));
    }
}
