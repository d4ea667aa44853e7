//! Formula evaluation.
//!
//! A formula is translated into a Rhai expression in which every cell
//! reference, range and numeric literal becomes a scope variable; function
//! calls receive their arguments as one array so the spreadsheet functions
//! can be variadic. Only same-sheet references are understood. Anything else
//! is reported as [`FormulaError::Unsupported`] and the caller falls back to
//! the cached result stored with the formula.

use std::collections::HashMap;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Scope};
use thiserror::Error;
use tracing::debug;

use crate::addr::CellAddr;
use crate::cell::{Evaluated, Formula};
use crate::sheet::Sheet;

/// Deepest chain of formula-to-formula references followed before giving up.
const MAX_DEPTH: usize = 256;

const FUNCTIONS: &[&str] = &["SUM", "MIN", "MAX", "AVERAGE", "ABS", "ROUND"];

#[derive(Debug, Error, PartialEq)]
pub enum FormulaError {
    /// Construct the evaluator does not model (sheet references, strings, comparisons).
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("syntax error: {0}")]
    Syntax(String),
}

/// State of one top-level evaluation: the formulas in progress and the
/// results already computed, so shared inputs are evaluated once.
#[derive(Debug, Default)]
pub(crate) struct EvalContext {
    stack: Vec<CellAddr>,
    memo: HashMap<CellAddr, Evaluated>,
}

/// Value bound to one scope variable of a translated formula.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Number(f64),
    Cell(CellAddr),
    Range(CellAddr, CellAddr),
}

/// A formula rewritten as a Rhai expression over variables `v0`, `v1`, ...
#[derive(Clone, Debug, PartialEq)]
pub struct Translation {
    pub script: String,
    pub bindings: Vec<Binding>,
}

fn var_name(i: usize) -> String {
    format!("v{i}")
}

fn bind(out: &mut String, bindings: &mut Vec<Binding>, binding: Binding) {
    out.push_str(&var_name(bindings.len()));
    bindings.push(binding);
}

fn next_non_space(src: &[char], mut i: usize) -> Option<(usize, char)> {
    while i < src.len() {
        if !src[i].is_whitespace() {
            return Some((i, src[i]));
        }
        i += 1;
    }
    None
}

fn scan_while(src: &[char], mut i: usize, pred: impl Fn(char) -> bool) -> usize {
    while i < src.len() && pred(src[i]) {
        i += 1;
    }
    i
}

/// Translate spreadsheet formula text into a Rhai expression.
pub fn translate(expr: &str) -> Result<Translation, FormulaError> {
    let trimmed = expr.trim();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed);
    let src: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(src.len() * 2);
    let mut bindings = Vec::new();
    // true when the open paren belongs to a function call
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < src.len() {
        let c = src[i];
        match c {
            c if c.is_whitespace() => {
                out.push(' ');
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                i = scan_while(&src, i, |c| c.is_ascii_digit() || c == '.');
                if i < src.len() && matches!(src[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < src.len() && matches!(src[j], '+' | '-') {
                        j += 1;
                    }
                    if j < src.len() && src[j].is_ascii_digit() {
                        i = scan_while(&src, j, |c| c.is_ascii_digit());
                    }
                }
                let text: String = src[start..i].iter().collect();
                let v: f64 = text
                    .parse()
                    .map_err(|_| FormulaError::Syntax(format!("bad number {text}")))?;
                bind(&mut out, &mut bindings, Binding::Number(v));
            }
            c if c.is_ascii_alphabetic() || c == '$' || c == '_' => {
                let start = i;
                i = scan_while(&src, i, |c| c.is_ascii_alphanumeric() || c == '$' || c == '_');
                let word: String = src[start..i].iter().collect();
                match next_non_space(&src, i) {
                    Some((j, '(')) => {
                        let name = word.to_ascii_uppercase();
                        if !FUNCTIONS.contains(&name.as_str()) {
                            return Err(FormulaError::Unsupported(format!("function {name}")));
                        }
                        out.push_str(&name);
                        out.push_str("([");
                        parens.push(true);
                        i = j + 1;
                    }
                    Some((_, '!')) => {
                        return Err(FormulaError::Unsupported(format!("sheet reference {word}!")));
                    }
                    _ => {
                        let first = CellAddr::parse(&word)
                            .map_err(|_| FormulaError::Unsupported(format!("name {word}")))?;
                        if i < src.len() && src[i] == ':' {
                            let end = scan_while(&src, i + 1, |c| {
                                c.is_ascii_alphanumeric() || c == '$'
                            });
                            let word2: String = src[i + 1..end].iter().collect();
                            let second = CellAddr::parse(&word2)
                                .map_err(|_| FormulaError::Syntax(format!("{word}:{word2}")))?;
                            i = end;
                            bind(&mut out, &mut bindings, Binding::Range(first, second));
                        } else {
                            bind(&mut out, &mut bindings, Binding::Cell(first));
                        }
                    }
                }
            }
            '(' => {
                out.push('(');
                parens.push(false);
                i += 1;
            }
            ')' => {
                match parens.pop() {
                    Some(true) => out.push_str("])"),
                    Some(false) => out.push(')'),
                    None => return Err(FormulaError::Syntax("unbalanced ')'".into())),
                }
                i += 1;
            }
            ',' | ';' => {
                out.push_str(", ");
                i += 1;
            }
            '+' | '-' | '*' | '/' => {
                out.push(c);
                i += 1;
            }
            '^' => {
                out.push_str("**");
                i += 1;
            }
            '%' => {
                out.push_str(" / 100.0");
                i += 1;
            }
            '\'' | '!' => {
                return Err(FormulaError::Unsupported("sheet reference".into()));
            }
            other => {
                return Err(FormulaError::Unsupported(format!("operator {other}")));
            }
        }
    }

    if !parens.is_empty() {
        return Err(FormulaError::Syntax("unbalanced '('".into()));
    }
    if out.trim().is_empty() {
        return Err(FormulaError::Syntax("empty formula".into()));
    }
    Ok(Translation {
        script: out,
        bindings,
    })
}

fn numbers(args: &[Dynamic], out: &mut Vec<f64>) -> Result<(), Box<EvalAltResult>> {
    for v in args {
        if let Some(inner) = v.clone().try_cast::<Array>() {
            numbers(&inner, out)?;
        } else if let Ok(f) = v.as_float() {
            out.push(f);
        } else if let Ok(n) = v.as_int() {
            out.push(n as f64);
        } else {
            return Err(format!("not a number: {}", v.type_name()).into());
        }
    }
    Ok(())
}

fn flatten(args: &Array) -> Result<Vec<f64>, Box<EvalAltResult>> {
    let mut out = Vec::with_capacity(args.len());
    numbers(args, &mut out)?;
    Ok(out)
}

fn build_engine() -> Engine {
    let mut engine = Engine::new();
    engine.register_fn("SUM", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        Ok(flatten(&args)?.iter().sum())
    });
    engine.register_fn("MIN", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        Ok(flatten(&args)?.into_iter().fold(f64::INFINITY, f64::min))
    });
    engine.register_fn("MAX", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        Ok(flatten(&args)?.into_iter().fold(f64::NEG_INFINITY, f64::max))
    });
    engine.register_fn("AVERAGE", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        let vals = flatten(&args)?;
        if vals.is_empty() {
            return Err("AVERAGE of no values".into());
        }
        Ok(vals.iter().sum::<f64>() / vals.len() as f64)
    });
    engine.register_fn("ABS", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        match flatten(&args)?.as_slice() {
            [x] => Ok(x.abs()),
            _ => Err("ABS takes one argument".into()),
        }
    });
    engine.register_fn("ROUND", |args: Array| -> Result<f64, Box<EvalAltResult>> {
        match flatten(&args)?.as_slice() {
            [x, digits] => {
                let scale = 10f64.powi(digits.trunc() as i32);
                Ok((x * scale).round() / scale)
            }
            _ => Err("ROUND takes two arguments".into()),
        }
    });
    engine
}

thread_local! {
    static ENGINE: Engine = build_engine();
}

fn scalar(sheet: &Sheet, addr: CellAddr, ctx: &mut EvalContext) -> Result<f64, String> {
    match sheet.evaluate_with(addr, ctx) {
        Evaluated::Number(v) => Ok(v),
        Evaluated::Empty => Ok(0.0),
        Evaluated::Text(_) => Err("#VALUE!".to_string()),
        Evaluated::Error(code) => Err(code),
    }
}

fn range(
    sheet: &Sheet,
    a: CellAddr,
    b: CellAddr,
    ctx: &mut EvalContext,
) -> Result<Array, String> {
    let top_left = CellAddr::new(a.row.min(b.row), a.col.min(b.col));
    let bottom_right = CellAddr::new(a.row.max(b.row), a.col.max(b.col));
    let mut out = Array::new();
    for addr in sheet.addrs_between(top_left, bottom_right) {
        match sheet.evaluate_with(addr, ctx) {
            Evaluated::Number(v) => out.push(Dynamic::from_float(v)),
            Evaluated::Error(code) => return Err(code),
            Evaluated::Text(_) | Evaluated::Empty => {}
        }
    }
    Ok(out)
}

fn to_evaluated(value: Dynamic) -> Evaluated {
    let v = if let Ok(f) = value.as_float() {
        f
    } else if let Ok(n) = value.as_int() {
        n as f64
    } else {
        return Evaluated::Error("#VALUE!".into());
    };
    if v.is_finite() {
        Evaluated::Number(v)
    } else {
        Evaluated::Error("#DIV/0!".into())
    }
}

/// Evaluate `formula` located at `at`, reusing results already in `ctx`.
pub(crate) fn evaluate(
    sheet: &Sheet,
    at: CellAddr,
    formula: &Formula,
    ctx: &mut EvalContext,
) -> Evaluated {
    if let Some(done) = ctx.memo.get(&at) {
        return done.clone();
    }
    if ctx.stack.contains(&at) {
        return Evaluated::Error("#CIRC".into());
    }
    if ctx.stack.len() >= MAX_DEPTH {
        return Evaluated::Error("#DEPTH".into());
    }
    let value = compute(sheet, at, formula, ctx);
    ctx.memo.insert(at, value.clone());
    value
}

fn compute(sheet: &Sheet, at: CellAddr, formula: &Formula, ctx: &mut EvalContext) -> Evaluated {
    let translation = match translate(&formula.expr) {
        Ok(t) => t,
        Err(err) => {
            debug!(cell = %at, expr = %formula.expr, %err, "formula not evaluable, using cached result");
            return match formula.cached {
                Some(v) => Evaluated::Number(v),
                None => Evaluated::Error("#NAME?".into()),
            };
        }
    };

    ctx.stack.push(at);
    let mut scope = Scope::new();
    let mut failure = None;
    for (i, binding) in translation.bindings.iter().enumerate() {
        let bound = match binding {
            Binding::Number(v) => Ok(Dynamic::from_float(*v)),
            Binding::Cell(addr) => scalar(sheet, *addr, ctx).map(Dynamic::from_float),
            Binding::Range(a, b) => range(sheet, *a, *b, ctx).map(Dynamic::from_array),
        };
        match bound {
            Ok(value) => {
                scope.push_dynamic(var_name(i), value);
            }
            Err(code) => {
                failure = Some(code);
                break;
            }
        }
    }
    ctx.stack.pop();

    if let Some(code) = failure {
        return Evaluated::Error(code);
    }

    let result =
        ENGINE.with(|engine| engine.eval_with_scope::<Dynamic>(&mut scope, &translation.script));
    match result {
        Ok(value) => to_evaluated(value),
        Err(err) => {
            debug!(cell = %at, expr = %formula.expr, %err, "formula evaluation failed");
            Evaluated::Error("#VALUE!".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::Grid;

    fn sheet_with(cells: &[(&str, Cell)]) -> Sheet {
        let mut sheet = Sheet::new("S");
        for (a1, cell) in cells {
            sheet.set_cell(CellAddr::parse(a1).unwrap(), cell.clone());
        }
        sheet
    }

    fn eval_at(sheet: &Sheet, a1: &str) -> Evaluated {
        sheet.evaluate(CellAddr::parse(a1).unwrap())
    }

    #[test]
    fn translate_binds_refs_and_literals() {
        let t = translate("=B2*(C2-D2)+100").unwrap();
        assert_eq!(t.script, "v0*(v1-v2)+v3");
        assert_eq!(t.bindings[0], Binding::Cell(CellAddr::new(1, 1)));
        assert_eq!(t.bindings[3], Binding::Number(100.0));
    }

    #[test]
    fn translate_wraps_function_arguments() {
        let t = translate("SUM(A1:A3; B1)").unwrap();
        assert_eq!(t.script, "SUM([v0,  v1])");
        assert_eq!(
            t.bindings[0],
            Binding::Range(CellAddr::new(0, 0), CellAddr::new(2, 0))
        );
    }

    #[test]
    fn translate_rejects_sheet_refs_and_unknown_functions() {
        assert!(matches!(
            translate("Ricavi!X67"),
            Err(FormulaError::Unsupported(_))
        ));
        assert!(matches!(
            translate("'CE Budget'!J5"),
            Err(FormulaError::Unsupported(_))
        ));
        assert!(matches!(
            translate("VLOOKUP(A1, B1:C4, 2)"),
            Err(FormulaError::Unsupported(_))
        ));
        assert!(matches!(translate("(A1"), Err(FormulaError::Syntax(_))));
    }

    #[test]
    fn evaluates_row_profit_formula() {
        let sheet = sheet_with(&[
            ("B2", Cell::Number(1000.0)),
            ("C2", Cell::Number(2.0)),
            ("D2", Cell::Number(1.5)),
            ("E2", Cell::formula("=B2*(C2-D2)")),
        ]);
        assert_eq!(eval_at(&sheet, "E2"), Evaluated::Number(500.0));
    }

    #[test]
    fn evaluates_chained_formulas_and_functions() {
        let sheet = sheet_with(&[
            ("A1", Cell::Number(2.0)),
            ("A2", Cell::Number(3.0)),
            ("A3", Cell::text("note")),
            ("B1", Cell::formula("SUM(A1:A3)*2")),
            ("C1", Cell::formula("ROUND(B1/3, 2)")),
            ("D1", Cell::formula("MAX(A1, A2, 1) + ABS(-4) + 2^3")),
            ("E1", Cell::formula("A2*10%")),
        ]);
        assert_eq!(eval_at(&sheet, "B1"), Evaluated::Number(10.0));
        assert_eq!(eval_at(&sheet, "C1"), Evaluated::Number(3.33));
        assert_eq!(eval_at(&sheet, "D1"), Evaluated::Number(15.0));
        let e1 = eval_at(&sheet, "E1").as_number().unwrap();
        assert!((e1 - 0.3).abs() < 1e-12);
    }

    #[test]
    fn edits_are_seen_by_dependents() {
        let mut sheet = sheet_with(&[
            ("A1", Cell::Number(10.0)),
            ("B1", Cell::formula("A1*3")),
        ]);
        assert_eq!(eval_at(&sheet, "B1"), Evaluated::Number(30.0));
        sheet.set_cell(CellAddr::new(0, 0), Cell::Number(12.0));
        assert_eq!(eval_at(&sheet, "B1"), Evaluated::Number(36.0));
    }

    #[test]
    fn errors_and_fallbacks() {
        let sheet = sheet_with(&[
            ("A1", Cell::formula("B1+1")),
            ("B1", Cell::formula("A1+1")),
            ("C1", Cell::formula("1/0")),
            ("D1", Cell::text("abc")),
            ("E1", Cell::formula("D1*2")),
            ("F1", Cell::Formula(Formula::new("Other!A1*2").with_cached(42.0))),
            ("G1", Cell::formula("Other!A1*2")),
        ]);
        assert_eq!(eval_at(&sheet, "A1"), Evaluated::Error("#CIRC".into()));
        assert!(matches!(eval_at(&sheet, "C1"), Evaluated::Error(_)));
        assert_eq!(eval_at(&sheet, "E1"), Evaluated::Error("#VALUE!".into()));
        assert_eq!(eval_at(&sheet, "F1"), Evaluated::Number(42.0));
        assert_eq!(eval_at(&sheet, "G1"), Evaluated::Error("#NAME?".into()));
    }

    #[test]
    fn empty_references_count_as_zero() {
        let sheet = sheet_with(&[("A1", Cell::formula("B7+5"))]);
        assert_eq!(eval_at(&sheet, "A1"), Evaluated::Number(5.0));
    }

    #[test]
    fn shared_inputs_are_evaluated_once() {
        // A(n) = B(n) = A(n-1) + B(n-1): every level doubles the paths
        let mut sheet = sheet_with(&[("A1", Cell::Number(1.0)), ("B1", Cell::Number(1.0))]);
        for row in 2..=40 {
            let prev = row - 1;
            for col in ["A", "B"] {
                let at = CellAddr::parse(&format!("{col}{row}")).unwrap();
                sheet.set_cell(at, Cell::formula(format!("A{prev}+B{prev}")));
            }
        }
        let mut ctx = EvalContext::default();
        let top = sheet.evaluate_with(CellAddr::parse("A40").unwrap(), &mut ctx);
        assert_eq!(top, Evaluated::Number(2f64.powi(39)));
        // A2..A40 and B2..B39; B40 is never referenced
        assert_eq!(ctx.memo.len(), 39 + 38);
        assert!(ctx.stack.is_empty());
    }
}
