//! Scenario result combined with its income-statement effect.

use serde::Serialize;
use sheet_doc::Document;
use sim_core::{Catalog, EngineConfig, SimError, SimulationRequest};
use tracing::info;

use crate::scenario::{ScenarioEngine, SimulationResult};
use crate::statement::{delta, propagate_variation, IncomeStatement, StatementReader};

/// Statement before the change, after it, and the difference.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatementTriple {
    pub base: IncomeStatement,
    pub after: IncomeStatement,
    pub delta: IncomeStatement,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub scenario: SimulationResult,
    pub statement: Option<StatementTriple>,
}

/// Runs a scenario and, when asked, derives its statement effect.
#[derive(Clone, Debug, Default)]
pub struct Reporter {
    engine: ScenarioEngine,
    statement: StatementReader,
}

impl Reporter {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            statement: StatementReader::new(&config),
            engine: ScenarioEngine::new(config),
        }
    }

    /// The statement snapshot is read before the product sheet is touched,
    /// so a missing statement sheet fails the request without any write.
    pub fn run<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        catalog: &Catalog,
        request: &SimulationRequest,
        with_statement: bool,
    ) -> Result<ScenarioReport, SimError> {
        let base = if with_statement {
            Some(self.statement.read_snapshot(&*doc)?)
        } else {
            None
        };
        let scenario = self.engine.run(doc, catalog, request)?;
        let statement = base.map(|base| {
            let after = propagate_variation(
                &base,
                scenario.category,
                scenario.revenue_delta(),
                scenario.cost_delta(),
            );
            let diff = delta(&base, &after);
            StatementTriple {
                base,
                after,
                delta: diff,
            }
        });
        info!(
            article = %scenario.article,
            statement = statement.is_some(),
            "scenario report ready"
        );
        Ok(ScenarioReport {
            scenario,
            statement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use crate::statement::LineKey;
    use sim_core::{load_catalog, Category, Lever};

    fn request(category: Category, article: &str) -> SimulationRequest {
        SimulationRequest {
            category,
            article: article.into(),
            lever: Lever::Quantity,
            percent: 20.0,
        }
    }

    #[test]
    fn raw_material_report_moves_mp_lines() {
        let mut wb = sample::workbook();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        let report = Reporter::default()
            .run(&mut wb, &catalog, &request(Category::MP, "MP 1"), true)
            .unwrap();
        let triple = report.statement.unwrap();
        assert_eq!(triple.base.get(LineKey::RawMaterialRevenue), 100_000.0);
        assert!((triple.after.get(LineKey::RawMaterialRevenue) - 100_400.0).abs() < 1e-6);
        assert!((triple.after.get(LineKey::RawMaterialPurchases) - -60_300.0).abs() < 1e-6);
        assert!((triple.delta.get(LineKey::RawMaterialPurchases) - -300.0).abs() < 1e-6);
        assert_eq!(triple.delta.get(LineKey::FinishedGoodsRevenue), 0.0);
    }

    #[test]
    fn missing_statement_fails_before_writing() {
        let mut wb = sample::workbook();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        let before = wb.clone();
        let mut cfg = EngineConfig::default();
        cfg.statement.budget_year = 1999;
        let err = Reporter::new(cfg)
            .run(&mut wb, &catalog, &request(Category::PFP, "PF P 1"), true)
            .unwrap_err();
        assert!(matches!(err, SimError::SheetNotFound(_)));
        assert_eq!(wb, before);
    }

    #[test]
    fn report_without_statement() {
        let mut wb = sample::workbook();
        let catalog = load_catalog(&wb, &EngineConfig::default()).unwrap();
        let report = Reporter::default()
            .run(&mut wb, &catalog, &request(Category::PFP, "PF P 1"), false)
            .unwrap();
        assert!(report.statement.is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scenario"]["lever"], "quantity");
        assert_eq!(json["scenario"]["category"], "PFP");
    }
}
