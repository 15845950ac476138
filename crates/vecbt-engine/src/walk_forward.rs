use std::fmt;

use serde::Serialize;
use tracing::info;
use vecbt_core::{BarSeries, ConfigError, ParamGrid, ParamSet};
use vecbt_strategy::StrategyFactory;

use crate::engine::{BacktestEngine, BacktestResult};
use crate::error::EngineError;
use crate::metrics::{Metric, Metrics};

/// Outcome of one chronological train/test validation.
#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardReport {
    pub split_index: usize,
    pub train_bars: usize,
    pub test_bars: usize,
    /// First and last timestamp of each segment.
    pub train_period: Option<(i64, i64)>,
    pub test_period: Option<(i64, i64)>,
    pub sort_by: Metric,
    pub best_params: ParamSet,
    pub train_metrics: Metrics,
    /// Grid combinations that produced a training row.
    pub usable_rows: usize,
    pub combinations: usize,
    pub test_result: BacktestResult,
}

impl WalkForwardReport {
    /// Drop in Sharpe ratio from the training to the test segment.
    pub fn sharpe_decay(&self) -> f64 {
        self.train_metrics.sharpe_ratio - self.test_result.metrics.sharpe_ratio
    }
}

impl fmt::Display for WalkForwardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let period = |p: Option<(i64, i64)>| match p {
            Some((start, end)) => format!("{} ~ {}", start, end),
            None => "-".to_string(),
        };
        writeln!(f, "train: {} bars ({})", self.train_bars, period(self.train_period))?;
        writeln!(f, "test:  {} bars ({})", self.test_bars, period(self.test_period))?;
        writeln!(
            f,
            "best params ({}/{} usable, by {}): {}",
            self.usable_rows, self.combinations, self.sort_by, self.best_params
        )?;
        writeln!(f, "train: {}", self.train_metrics)?;
        writeln!(f, "{}", self.test_result)?;
        write!(f, "sharpe decay: {:.3}", self.sharpe_decay())
    }
}

impl BacktestEngine {
    /// Walk-forward validation selecting the training combination by Sharpe ratio.
    pub fn walk_forward(
        &self,
        bars: &BarSeries,
        factory: &dyn StrategyFactory,
        grid: &ParamGrid,
        train_ratio: f64,
    ) -> Result<WalkForwardReport, EngineError> {
        self.walk_forward_sorted(bars, factory, grid, train_ratio, Metric::SharpeRatio)
    }

    /// Split at `floor(len * train_ratio)`, grid-search the prefix, then run
    /// the single best combination once on the suffix.
    ///
    /// Fails with [`EngineError::NoValidResults`] when no training combination
    /// could be evaluated.
    pub fn walk_forward_sorted(
        &self,
        bars: &BarSeries,
        factory: &dyn StrategyFactory,
        grid: &ParamGrid,
        train_ratio: f64,
        sort_by: Metric,
    ) -> Result<WalkForwardReport, EngineError> {
        if !(train_ratio > 0.0 && train_ratio < 1.0) {
            return Err(ConfigError::invalid(
                "train_ratio",
                format!("must lie strictly between 0 and 1, got {}", train_ratio),
            )
            .into());
        }

        let split_index = (bars.len() as f64 * train_ratio).floor() as usize;
        let train = bars.slice(0, split_index);
        let test = bars.slice(split_index, bars.len());
        info!(
            strategy = factory.name(),
            train_bars = train.len(),
            test_bars = test.len(),
            "walk-forward split"
        );

        let table = self.grid_search(&train, factory, grid, sort_by);
        let best = table.best().ok_or(EngineError::NoValidResults {
            combinations: grid.len(),
            train_bars: train.len(),
        })?;

        let strategy = factory.create(&best.params)?;
        let test_result = self.run(&test, strategy.as_ref())?;
        info!(
            strategy = %test_result.strategy_name,
            params = %best.params,
            train_sharpe = best.metrics.sharpe_ratio,
            test_sharpe = test_result.metrics.sharpe_ratio,
            "walk-forward validated"
        );

        Ok(WalkForwardReport {
            split_index,
            train_bars: train.len(),
            test_bars: test.len(),
            train_period: train.span(),
            test_period: test.span(),
            sort_by,
            best_params: best.params.clone(),
            train_metrics: best.metrics,
            usable_rows: table.len(),
            combinations: grid.len(),
            test_result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecbt_strategy::StrategyKind;

    fn make_bars(n: usize) -> BarSeries {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + (i as f64 * 0.2).sin() * 5.0 + i as f64 * 0.05)
            .collect();
        BarSeries::from_closes(1_000, &closes)
    }

    #[test]
    fn test_split_sizes() {
        let bars = make_bars(100);
        let grid = ParamGrid::new()
            .axis("short_period", [2, 3])
            .axis("long_period", [8, 12]);

        let report = BacktestEngine::default()
            .walk_forward(&bars, &StrategyKind::SimpleEmaCross, &grid, 0.5)
            .unwrap();

        assert_eq!(report.split_index, 50);
        assert_eq!(report.train_bars, 50);
        assert_eq!(report.test_bars, 50);
        assert_eq!(report.train_period, Some((1_000, 1_049)));
        assert_eq!(report.test_period, Some((1_050, 1_099)));
        assert_eq!(report.usable_rows, 4);
        assert_eq!(report.test_result.equity_curve.len(), 50);
        assert_eq!(report.test_result.params, report.best_params);

        let decay = report.train_metrics.sharpe_ratio - report.test_result.metrics.sharpe_ratio;
        assert_eq!(report.sharpe_decay(), decay);
        assert!(report.to_string().ends_with(&format!("sharpe decay: {:.3}", decay)));
    }

    #[test]
    fn test_best_params_come_from_training_only() {
        let bars = make_bars(160);
        let grid = ParamGrid::new()
            .axis("short_period", [2, 4, 6])
            .axis("long_period", [10, 15]);
        let engine = BacktestEngine::default();
        let factory = StrategyKind::SimpleEmaCross;

        let report = engine
            .walk_forward_sorted(&bars, &factory, &grid, 0.75, Metric::TotalReturn)
            .unwrap();

        let train = bars.slice(0, 120);
        let table = engine.grid_search(&train, &factory, &grid, Metric::TotalReturn);
        let best = table.best().unwrap();
        assert_eq!(report.best_params, best.params);
        assert_eq!(report.train_metrics, best.metrics);

        let test = bars.slice(120, 160);
        let direct = engine
            .run(&test, factory.create(&best.params).unwrap().as_ref())
            .unwrap();
        assert_eq!(report.test_result.metrics, direct.metrics);
    }

    #[test]
    fn test_no_valid_results() {
        let bars = make_bars(60);
        // every combination needs more than the 30 training bars
        let grid = ParamGrid::new().axis("long_period", [40, 50]);

        let err = BacktestEngine::default()
            .walk_forward(&bars, &StrategyKind::SimpleEmaCross, &grid, 0.5)
            .unwrap_err();
        match err {
            EngineError::NoValidResults { combinations, train_bars } => {
                assert_eq!(combinations, 2);
                assert_eq!(train_bars, 30);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let bars = make_bars(60);
        let grid = ParamGrid::new();
        for ratio in [0.0, 1.0, 1.5] {
            let err = BacktestEngine::default()
                .walk_forward(&bars, &StrategyKind::SimpleEmaCross, &grid, ratio)
                .unwrap_err();
            assert!(matches!(err, EngineError::Config(_)));
        }
    }
}
