#![deny(warnings)]

//! Scenario runtime: applies the margin algebra to a live document.
//!
//! [`ScenarioEngine`] perturbs and compensates one product line,
//! [`StatementReader`] reads the budget income statement and
//! [`PremiumSimulator`] offsets a change through the premium pool.

pub mod premium;
pub mod report;
pub mod sample;
pub mod scenario;
pub mod statement;

pub use premium::{PremiumResult, PremiumSimulator};
pub use report::{Reporter, ScenarioReport, StatementTriple};
pub use scenario::{CrossCheck, ScenarioEngine, SimulationResult, Stage};
pub use statement::{
    delta, propagate_variation, ExtendedLine, IncomeStatement, LineItem, LineKey, StatementReader,
};
