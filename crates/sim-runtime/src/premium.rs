//! Compensation through the incentive premium instead of the other lever.

use serde::Serialize;
use sheet_doc::{CellAddr, Document};
use sim_core::{
    ArticleRow, Catalog, Category, EngineConfig, Lever, SimError, SimulationRequest, ValueExtractor,
};
use sim_econ::{Baseline, LineState, PremiumState};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PremiumResult {
    pub category: Category,
    pub article: String,
    pub lever: Lever,
    pub percent: f64,
    pub baseline: LineState,
    pub varied: LineState,
    /// q1·(p1−c0) − q0·(p0−c0).
    pub row_profit_delta: f64,
    pub before: PremiumState,
    pub after: PremiumState,
    pub total_profit_before: f64,
    /// Aggregate profit after the lever change, before compensation.
    pub total_profit_varied: f64,
    pub total_profit_after: f64,
    /// |document aggregate profit after the writes − total before|.
    pub residual: f64,
    /// Aggregate profit read back from the document after the writes.
    pub document_total_profit: f64,
    pub consistent: bool,
}

/// Offsets a product-line change through the monthly premium.
#[derive(Clone, Debug, Default)]
pub struct PremiumSimulator {
    config: EngineConfig,
    extractor: ValueExtractor,
}

impl PremiumSimulator {
    pub fn new(config: EngineConfig) -> Self {
        let extractor = ValueExtractor::new(config.numbers.clone());
        Self { config, extractor }
    }

    pub fn run<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        catalog: &Catalog,
        request: &SimulationRequest,
    ) -> Result<PremiumResult, SimError> {
        let row = catalog.find(request.category, &request.article)?;
        self.simulate(doc, row, request.lever, request.percent)
    }

    /// Move `lever` on `row` and solve the monthly premium that keeps the
    /// aggregate profit unchanged. Writes the lever and the premium cells.
    pub fn simulate<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        row: &ArticleRow,
        lever: Lever,
        percent: f64,
    ) -> Result<PremiumResult, SimError> {
        let sheet_name = &self.config.product_sheet;
        let sheet = doc
            .sheet_mut(sheet_name)
            .ok_or_else(|| SimError::SheetNotFound(sheet_name.clone()))?;
        let cells = &self.config.premium;
        let cols = row.columns;
        let x = &self.extractor;

        let base = Baseline {
            quantity: x.read_number(sheet, row.row, cols.quantity),
            price: x.read_number(sheet, row.row, cols.unit_price),
            cost: x.read_number(sheet, row.row, cols.unit_cost),
        };
        base.validate()?;
        if !percent.is_finite() {
            return Err(SimError::InvalidPercent(percent.to_string()));
        }
        let months = x.read_at(sheet, cells.months);
        let monthly0 = x.read_at(sheet, cells.monthly);
        let annual0 = x.read_at(sheet, cells.annual);
        let adjustment0 = x.read_at(sheet, cells.adjustment);
        let total0 = x.read_at(sheet, cells.total_profit);

        let sign = sim_econ::detect_sign(adjustment0, annual0);
        let varied = sim_econ::apply_lever(&base, lever, percent);
        let delta = sim_econ::row_profit_delta(&base, &varied);
        let monthly = sim_econ::solve_monthly_premium(adjustment0, delta, sign, months)?;
        let after = PremiumState::from_monthly(monthly, months, sign);
        let before = PremiumState {
            monthly: monthly0,
            months,
            annual: annual0,
            adjustment: adjustment0,
            sign,
        };

        match lever {
            Lever::Quantity => x.write_number(sheet, row.row, cols.quantity, varied.quantity),
            Lever::Price => x.write_number(sheet, row.row, cols.unit_price, varied.price),
        }
        x.write_at(sheet, cells.monthly, after.monthly);
        x.write_at(sheet, cells.annual, after.annual);
        x.write_at(sheet, cells.adjustment, after.adjustment);

        let total_varied = total0 + delta;
        let total_after = total_varied + (after.adjustment - adjustment0);
        let document_total = x.read_at(sheet, cells.total_profit);
        let residual = (document_total - total0).abs();
        let consistent = self.config.tolerance.agrees(total_after, document_total);
        if !consistent {
            warn!(
                cell = %cells.total_profit,
                computed = total_after,
                document = document_total,
                "document aggregate profit disagrees with computed profit"
            );
        }

        info!(
            article = %row.article,
            %lever,
            percent,
            sign,
            monthly_before = monthly0,
            monthly_after = after.monthly,
            residual,
            "premium compensation applied"
        );

        Ok(PremiumResult {
            category: row.category,
            article: row.article.clone(),
            lever,
            percent,
            baseline: LineState::new(base.quantity, base.price, base.cost),
            varied,
            row_profit_delta: delta,
            before,
            after,
            total_profit_before: total0,
            total_profit_varied: total_varied,
            total_profit_after: total_after,
            residual,
            document_total_profit: document_total,
            consistent,
        })
    }

    /// Cells the simulator writes besides the lever.
    pub fn written_cells(&self) -> [CellAddr; 3] {
        let c = &self.config.premium;
        [c.monthly, c.annual, c.adjustment]
    }
}
