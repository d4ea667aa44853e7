//! Perturb-then-compensate scenarios applied to the product sheet.

use serde::Serialize;
use sheet_doc::{CellAddr, Document, Grid};
use sim_core::{
    ArticleRow, Catalog, Category, EngineConfig, Lever, SimError, SimulationRequest, ValueExtractor,
};
use sim_econ::{Baseline, Compensation, LineState, SimulationPoint};
use tracing::{info, warn};

/// Point of a scenario at which the document is compared with the algebra.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Baseline,
    Varied,
    Compensated,
}

/// Row profit as computed versus as read back from the document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CrossCheck {
    pub stage: Stage,
    pub analytic: f64,
    pub document: f64,
    pub agrees: bool,
}

/// Outcome of one scenario run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    pub category: Category,
    pub article: String,
    pub row: usize,
    pub lever: Lever,
    pub percent: f64,
    pub baseline: LineState,
    /// After the lever change, before compensation.
    pub varied: LineState,
    pub compensation: Compensation,
    /// |profit* − P0|.
    pub error: f64,
    pub cross_checks: Vec<CrossCheck>,
    /// False when any document read-back disagreed with the algebra.
    pub consistent: bool,
}

impl SimulationResult {
    /// Revenue change caused by the lever, before compensation.
    pub fn revenue_delta(&self) -> f64 {
        self.varied.revenue - self.baseline.revenue
    }

    /// Cost change caused by the lever, before compensation.
    pub fn cost_delta(&self) -> f64 {
        self.varied.cost - self.baseline.cost
    }
}

/// Runs scenarios against a mutable document.
#[derive(Clone, Debug, Default)]
pub struct ScenarioEngine {
    config: EngineConfig,
    extractor: ValueExtractor,
}

impl ScenarioEngine {
    pub fn new(config: EngineConfig) -> Self {
        let extractor = ValueExtractor::new(config.numbers.clone());
        Self { config, extractor }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve the request against `catalog` and run it.
    pub fn run<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        catalog: &Catalog,
        request: &SimulationRequest,
    ) -> Result<SimulationResult, SimError> {
        let row = catalog.find(request.category, &request.article)?;
        self.simulate(doc, row, request.lever, request.percent)
    }

    /// Move `lever` by `percent` on `row`, then solve the other lever so the
    /// row keeps its baseline profit. The document ends in the compensated
    /// state; nothing is written when the request fails.
    pub fn simulate<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        row: &ArticleRow,
        lever: Lever,
        percent: f64,
    ) -> Result<SimulationResult, SimError> {
        let sheet_name = &self.config.product_sheet;
        let sheet = doc
            .sheet_mut(sheet_name)
            .ok_or_else(|| SimError::SheetNotFound(sheet_name.clone()))?;
        let cols = row.columns;
        let x = &self.extractor;

        let base = self.read_baseline(sheet, row);
        let doc_profit0 = x.read_number(sheet, row.row, cols.profit);
        let solution = sim_econ::solve(
            &base,
            lever,
            percent,
            self.config.tolerance.compensation_epsilon,
        )?;

        let quantity_at = CellAddr::new(row.row, cols.quantity);
        let price_at = CellAddr::new(row.row, cols.unit_price);
        match lever {
            Lever::Quantity => x.write_at(sheet, quantity_at, solution.varied.quantity),
            Lever::Price => x.write_at(sheet, price_at, solution.varied.price),
        }
        let doc_profit1 = x.read_number(sheet, row.row, cols.profit);

        match solution.compensation.lever {
            Lever::Price => x.write_at(sheet, price_at, solution.compensation.value),
            Lever::Quantity => x.write_at(sheet, quantity_at, solution.compensation.value),
        }
        let doc_profit2 = x.read_number(sheet, row.row, cols.profit);

        let cross_checks: Vec<CrossCheck> = [
            (Stage::Baseline, solution.baseline.profit, doc_profit0),
            (Stage::Varied, solution.varied.profit, doc_profit1),
            (Stage::Compensated, solution.compensation.line.profit, doc_profit2),
        ]
        .into_iter()
        .map(|(stage, analytic, document)| {
            let agrees = self.config.tolerance.agrees(analytic, document);
            if !agrees {
                warn!(
                    article = %row.article,
                    ?stage,
                    analytic,
                    document,
                    "document profit disagrees with computed profit"
                );
            }
            CrossCheck {
                stage,
                analytic,
                document,
                agrees,
            }
        })
        .collect();
        let consistent = cross_checks.iter().all(|c| c.agrees);

        info!(
            article = %row.article,
            %lever,
            percent,
            target = solution.baseline.profit,
            solved = solution.compensation.value,
            error = solution.error,
            consistent,
            "scenario applied"
        );

        Ok(SimulationResult {
            category: row.category,
            article: row.article.clone(),
            row: row.row,
            lever,
            percent,
            baseline: solution.baseline,
            varied: solution.varied,
            compensation: solution.compensation,
            error: solution.error,
            cross_checks,
            consistent,
        })
    }

    /// Evaluate the row at every percentage without writing to the document.
    pub fn sweep<D: Document + ?Sized>(
        &self,
        doc: &D,
        row: &ArticleRow,
        lever: Lever,
        percents: impl IntoIterator<Item = f64>,
    ) -> Result<Vec<SimulationPoint>, SimError> {
        let sheet_name = &self.config.product_sheet;
        let sheet = doc
            .sheet(sheet_name)
            .ok_or_else(|| SimError::SheetNotFound(sheet_name.clone()))?;
        let base = self.read_baseline(sheet, row);
        let points = sim_econ::sweep(
            &base,
            lever,
            percents,
            self.config.tolerance.compensation_epsilon,
        )?;
        info!(article = %row.article, %lever, points = points.len(), "sweep computed");
        Ok(points)
    }

    fn read_baseline<G: Grid + ?Sized>(&self, sheet: &G, row: &ArticleRow) -> Baseline {
        let x = &self.extractor;
        let cols = row.columns;
        Baseline {
            quantity: x.read_number(sheet, row.row, cols.quantity),
            price: x.read_number(sheet, row.row, cols.unit_price),
            cost: x.read_number(sheet, row.row, cols.unit_cost),
        }
    }
}
