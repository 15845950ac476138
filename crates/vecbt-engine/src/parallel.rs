use rayon::prelude::*;
use tracing::{info, warn};

use vecbt_core::{BarSeries, ParamGrid, ParamSet};
use vecbt_strategy::{Strategy, StrategyFactory};

use crate::engine::{BacktestEngine, BacktestResult};
use crate::error::EngineError;
use crate::metrics::Metric;
use crate::table::{ResultTable, SummaryRow};

impl BacktestEngine {
    /// Evaluate every combination of `grid` and return the rows sorted by `sort_by`.
    ///
    /// Combinations run in parallel via `par_iter`; rows are collected in
    /// combination order before the stable sort, so ties keep grid order.
    /// A combination that fails to build or run is logged and left out.
    pub fn grid_search(
        &self,
        bars: &BarSeries,
        factory: &dyn StrategyFactory,
        grid: &ParamGrid,
        sort_by: Metric,
    ) -> ResultTable {
        let combinations = grid.combinations();
        info!(
            strategy = factory.name(),
            combinations = combinations.len(),
            bars = bars.len(),
            sort_by = %sort_by,
            "grid search started"
        );

        let rows: Vec<SummaryRow> = combinations
            .par_iter()
            .filter_map(|params| match self.run_params(bars, factory, params) {
                Ok(result) => Some(result.summary()),
                Err(err) => {
                    warn!(
                        strategy = factory.name(),
                        params = %params,
                        error = %err,
                        "skipping parameter combination"
                    );
                    None
                }
            })
            .collect();

        let table = ResultTable::new(rows).sorted_by(sort_by);
        info!(
            strategy = factory.name(),
            rows = table.len(),
            skipped = combinations.len() - table.len(),
            "grid search finished"
        );
        table
    }

    /// Build one strategy from `params` and run it.
    pub fn run_params(
        &self,
        bars: &BarSeries,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
    ) -> Result<BacktestResult, EngineError> {
        let strategy = factory.create(params)?;
        self.run(bars, strategy.as_ref())
    }

    /// Run each strategy once, in parallel, keeping input order.
    ///
    /// A failing strategy is logged and omitted; the others still report.
    pub fn compare_strategies(&self, bars: &BarSeries, strategies: &[Box<dyn Strategy>]) -> ResultTable {
        let rows: Vec<SummaryRow> = strategies
            .par_iter()
            .filter_map(|strategy| match self.run(bars, strategy.as_ref()) {
                Ok(result) => Some(result.summary()),
                Err(err) => {
                    warn!(strategy = %strategy.name(), error = %err, "skipping strategy");
                    None
                }
            })
            .collect();
        ResultTable::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecbt_strategy::{EmaCross, SimpleEmaCross, StrategyKind, VwapReversal};

    fn make_bars(n: usize) -> BarSeries {
        let mut bars = BarSeries::with_capacity(n);
        let base_ts: i64 = 1_735_689_600;
        for i in 0..n {
            let ts = base_ts + (i as i64) * 3600;
            let price = 100.0 + (i as f64 * 0.05).sin() * 8.0 + (i as f64 * 0.31).cos() * 2.0;
            bars.push(ts, price, price + 0.5, price - 0.5, price, 1000.0 + (i % 7) as f64);
        }
        bars
    }

    #[test]
    fn test_grid_search_sorted_by_sharpe() {
        let bars = make_bars(300);
        let grid = ParamGrid::new()
            .axis("short_period", [3, 5, 10])
            .axis("long_period", [20, 30]);

        let table = BacktestEngine::default().grid_search(
            &bars,
            &StrategyKind::SimpleEmaCross,
            &grid,
            Metric::SharpeRatio,
        );
        assert_eq!(table.len(), 6);
        let sharpe = table.column(Metric::SharpeRatio);
        assert!(sharpe.windows(2).all(|w| w[0] >= w[1]), "{:?}", sharpe);
    }

    #[test]
    fn test_grid_search_skips_failures() {
        let bars = make_bars(60);
        // long_period 50 needs 55 bars, 80 needs 85; 0 is rejected at construction
        let grid = ParamGrid::new().axis("long_period", [50, 80, 0]);

        let table = BacktestEngine::default().grid_search(
            &bars,
            &StrategyKind::SimpleEmaCross,
            &grid,
            Metric::TotalReturn,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.best().unwrap().strategy, "simple_ema_5_50");
    }

    #[test]
    fn test_grid_search_matches_sequential_runs() {
        let bars = make_bars(250);
        let grid = ParamGrid::new()
            .axis("short_period", [4, 8])
            .axis("rsi_threshold", [40, 60])
            .axis("trend_period", [30]);
        let engine = BacktestEngine::default();

        let table = engine.grid_search(&bars, &StrategyKind::EmaCross, &grid, Metric::TotalReturn);
        for params in grid.combinations() {
            let expected = engine
                .run(&bars, &EmaCross::from_params(&params).unwrap())
                .unwrap()
                .summary();
            assert!(table.iter().any(|row| *row == expected));
        }
    }

    #[test]
    fn test_compare_strategies_keeps_order() {
        let bars = make_bars(120);
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(VwapReversal::default()),
            Box::new(EmaCross::default()),
            // needs 205 bars, skipped
            Box::new(SimpleEmaCross::new(5, 200).unwrap()),
            Box::new(SimpleEmaCross::default()),
        ];

        let table = BacktestEngine::default().compare_strategies(&bars, &strategies);
        let names: Vec<&str> = table.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, ["vwap_reversal_70_20", "ema_cross_5_20", "simple_ema_5_20"]);
    }
}
