#![deny(warnings)]

//! Closed-form margin algebra for single-lever scenarios.
//!
//! This module provides validated utilities for:
//! - Perturbing one commercial lever of a product line by a percentage
//! - Solving the other lever so the line keeps its baseline profit
//! - Solving the monthly premium that offsets a line's profit change
//! - Sweeping a percentage range without touching any document
//!
//! Every function is pure; the runtime crate applies the results to a
//! document and cross-checks them against the document's own formulas.

use serde::{Deserialize, Serialize};
use sim_core::{Lever, SimError};
use tracing::debug;

/// Baseline figures of one product line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Sold quantity (> 0).
    pub quantity: f64,
    /// Unit price (> 0).
    pub price: f64,
    /// Unit cost (> 0), constant across a scenario.
    pub cost: f64,
}

impl Baseline {
    /// Reject figures that are not strictly positive and finite.
    pub fn validate(&self) -> Result<(), SimError> {
        for (what, value) in [
            ("quantity", self.quantity),
            ("unit price", self.price),
            ("unit cost", self.cost),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidValue {
                    what: what.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn revenue(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn total_cost(&self) -> f64 {
        self.quantity * self.cost
    }

    /// Line profit P0 = q0·p0 − q0·c0.
    pub fn profit(&self) -> f64 {
        self.revenue() - self.total_cost()
    }
}

/// Quantity/price pair of a line with its derived totals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineState {
    pub quantity: f64,
    pub price: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

impl LineState {
    pub fn new(quantity: f64, price: f64, unit_cost: f64) -> Self {
        let revenue = quantity * price;
        let cost = quantity * unit_cost;
        Self {
            quantity,
            price,
            revenue,
            cost,
            profit: revenue - cost,
        }
    }
}

/// Multiplier for a percentage change: 20 -> 1.2.
pub fn factor(percent: f64) -> f64 {
    1.0 + percent / 100.0
}

fn check_percent(percent: f64) -> Result<(), SimError> {
    if percent.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidPercent(percent.to_string()))
    }
}

/// Line after moving `lever` by `percent`, unit cost unchanged.
pub fn apply_lever(base: &Baseline, lever: Lever, percent: f64) -> LineState {
    let f = factor(percent);
    let (quantity, price) = match lever {
        Lever::Quantity => (base.quantity * f, base.price),
        Lever::Price => (base.quantity, base.price * f),
    };
    LineState::new(quantity, price, base.cost)
}

/// The compensating lever's new value and the resulting line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    /// Lever that was solved: price for a quantity scenario and vice versa.
    pub lever: Lever,
    /// Solved value of that lever.
    pub value: f64,
    /// Change of the solved lever against its baseline, in percent.
    pub change_pct: f64,
    pub line: LineState,
}

/// Solve the other lever so the varied line earns the baseline profit again.
///
/// Quantity scenario: p* = c0 + P0/q1. Price scenario: q* = P0/(p1 − c0),
/// impossible when the margin `p1 − c0` is within `epsilon` of zero or q* ≤ 0.
pub fn compensate(
    base: &Baseline,
    lever: Lever,
    varied: &LineState,
    epsilon: f64,
) -> Result<Compensation, SimError> {
    let target = base.profit();
    match lever {
        Lever::Quantity => {
            if varied.quantity <= 0.0 {
                return Err(SimError::CompensationImpossible(format!(
                    "varied quantity {} is not positive",
                    varied.quantity
                )));
            }
            let price = base.cost + target / varied.quantity;
            Ok(Compensation {
                lever: Lever::Price,
                value: price,
                change_pct: (price / base.price - 1.0) * 100.0,
                line: LineState::new(varied.quantity, price, base.cost),
            })
        }
        Lever::Price => {
            let margin = varied.price - base.cost;
            if margin.abs() < epsilon {
                return Err(SimError::CompensationImpossible(format!(
                    "unit margin {margin} is zero at price {}",
                    varied.price
                )));
            }
            let quantity = target / margin;
            if quantity <= 0.0 {
                return Err(SimError::CompensationImpossible(format!(
                    "compensating quantity {quantity} is not positive"
                )));
            }
            Ok(Compensation {
                lever: Lever::Quantity,
                value: quantity,
                change_pct: (quantity / base.quantity - 1.0) * 100.0,
                line: LineState::new(quantity, varied.price, base.cost),
            })
        }
    }
}

/// Baseline, varied and compensated figures of one scenario.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub baseline: LineState,
    pub varied: LineState,
    pub compensation: Compensation,
    /// |profit* − P0|.
    pub error: f64,
}

/// Run the perturb-then-compensate algebra for one line.
///
/// Example: q0 = 1000, p0 = 2, c0 = 1.5 and quantity +20% give a varied
/// profit of 600 and a compensated price of 1.91666…, back to 500.
pub fn solve(
    base: &Baseline,
    lever: Lever,
    percent: f64,
    epsilon: f64,
) -> Result<Solution, SimError> {
    base.validate()?;
    check_percent(percent)?;
    let baseline = LineState::new(base.quantity, base.price, base.cost);
    let varied = apply_lever(base, lever, percent);
    let compensation = compensate(base, lever, &varied, epsilon)?;
    let error = (compensation.line.profit - baseline.profit).abs();
    debug!(
        %lever,
        percent,
        p0 = baseline.profit,
        p1 = varied.profit,
        solved = compensation.value,
        error,
        "solved scenario"
    );
    Ok(Solution {
        baseline,
        varied,
        compensation,
        error,
    })
}

/// Profit change of a line between two states: q1·(p1−c0) − q0·(p0−c0).
pub fn row_profit_delta(base: &Baseline, varied: &LineState) -> f64 {
    varied.quantity * (varied.price - base.cost) - base.quantity * (base.price - base.cost)
}

/// Sign of the premium adjustment relative to the annual premium.
///
/// The adjustment is compared with +annual and −annual and the closer one
/// wins. Ties and a zero annual premium give −1.
pub fn detect_sign(adjustment: f64, annual: f64) -> f64 {
    if annual == 0.0 {
        return -1.0;
    }
    let to_plus = (adjustment - annual).abs();
    let to_minus = (adjustment + annual).abs();
    if to_plus < to_minus {
        1.0
    } else {
        -1.0
    }
}

/// Monthly premium that absorbs `delta` so the aggregate profit is unchanged.
///
/// monthly* = (adjustment0 − delta) / (sign·months).
pub fn solve_monthly_premium(
    adjustment: f64,
    delta: f64,
    sign: f64,
    months: f64,
) -> Result<f64, SimError> {
    if !(months.is_finite() && months > 0.0) {
        return Err(SimError::InvalidValue {
            what: "premium months".into(),
            value: months,
        });
    }
    let monthly = (adjustment - delta) / (sign * months);
    if !monthly.is_finite() || monthly < 0.0 {
        return Err(SimError::CompensationImpossible(format!(
            "monthly premium would be {monthly}"
        )));
    }
    Ok(monthly)
}

/// Premium pool figures; the sign is fixed once per run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PremiumState {
    pub monthly: f64,
    pub months: f64,
    pub annual: f64,
    /// Signed aggregate adjustment, sign·annual.
    pub adjustment: f64,
    pub sign: f64,
}

impl PremiumState {
    pub fn from_monthly(monthly: f64, months: f64, sign: f64) -> Self {
        let annual = monthly * months;
        Self {
            monthly,
            months,
            annual,
            adjustment: sign * annual,
            sign,
        }
    }
}

/// One point of a percentage sweep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationPoint {
    pub percent: f64,
    /// Line profit after the variation, before compensation.
    pub profit_uncompensated: f64,
    /// Baseline profit the compensation aims for.
    pub target_profit: f64,
    /// Solved value of the compensating lever; `None` where impossible.
    pub compensated_value: Option<f64>,
}

/// Evaluate a scenario at each percentage without touching a document.
pub fn sweep(
    base: &Baseline,
    lever: Lever,
    percents: impl IntoIterator<Item = f64>,
    epsilon: f64,
) -> Result<Vec<SimulationPoint>, SimError> {
    base.validate()?;
    let target = base.profit();
    percents
        .into_iter()
        .map(|percent| {
            check_percent(percent)?;
            let varied = apply_lever(base, lever, percent);
            Ok(SimulationPoint {
                percent,
                profit_uncompensated: varied.profit,
                target_profit: target,
                compensated_value: compensate(base, lever, &varied, epsilon)
                    .ok()
                    .map(|c| c.value),
            })
        })
        .collect()
}

/// Percentages from `from` to `to` inclusive in steps of `step`.
pub fn percent_range(from: f64, to: f64, step: f64) -> Vec<f64> {
    if !(step.is_finite() && step > 0.0) || !(from.is_finite() && to.is_finite()) || from > to {
        return Vec::new();
    }
    let n = ((to - from) / step + 1e-9).floor() as usize;
    (0..=n).map(|i| from + step * i as f64).collect()
}
