use std::fmt;

use serde::Serialize;
use tracing::debug;
use vecbt_core::{BarSeries, ConfigError, EngineConfig, ParamSet, Signal, SignalFrame};
use vecbt_strategy::Strategy;

use crate::error::EngineError;
use crate::metrics::{hodl_return, Metrics, MetricsCalculator};
use crate::returns::{CostModel, SignalConverter};
use crate::table::SummaryRow;

/// Full backtest result for a single strategy on a single bar series.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub params: ParamSet,
    pub metrics: Metrics,
    pub hodl_return: f64,
    pub equity_curve: Vec<f64>,
    pub signals: Vec<Signal>,
    pub strategy_returns: Vec<f64>,
    /// Leading bars on which some indicator was still undefined.
    pub undefined_prefix: usize,
    pub total_cost: f64,
}

impl BacktestResult {
    /// One comparison-table row: name, parameters, metrics, HODL.
    pub fn summary(&self) -> SummaryRow {
        SummaryRow {
            strategy: self.strategy_name.clone(),
            params: self.params.clone(),
            metrics: self.metrics,
            hodl_return: self.hodl_return,
        }
    }

    /// Strategy return over buy-and-hold.
    pub fn excess_return(&self) -> f64 {
        self.metrics.total_return - self.hodl_return
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().copied()
    }
}

impl fmt::Display for BacktestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.strategy_name)?;
        writeln!(f, "  {}", self.metrics)?;
        write!(
            f,
            "  HODL: {:.2}% | excess: {:+.2}%",
            self.hodl_return * 100.0,
            self.excess_return() * 100.0
        )?;
        if let Some(equity) = self.final_equity() {
            write!(f, " | final equity: {:.2}", equity)?;
        }
        Ok(())
    }
}

/// Vectorized backtesting engine.
///
/// Every run is a pure pipeline over an immutable bar series:
///   1. Strategy computes indicator columns and one signal per bar
///   2. Signals are shifted one bar and applied to close-to-close returns
///   3. Costs are charged on every change of position
///   4. Metrics and the HODL baseline are computed from the result
#[derive(Debug, Clone, Copy)]
pub struct BacktestEngine {
    cost: CostModel,
    initial_capital: f64,
}

impl BacktestEngine {
    pub fn new(fee_rate: f64, slippage: f64, initial_capital: f64) -> Result<Self, EngineError> {
        let cost = CostModel::new(fee_rate, slippage)?;
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(ConfigError::invalid(
                "initial_capital",
                format!("must be a finite value > 0, got {}", initial_capital),
            )
            .into());
        }
        Ok(Self {
            cost,
            initial_capital,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::new(config.fee_rate, config.slippage, config.initial_capital)
    }

    #[inline]
    pub fn cost_model(&self) -> CostModel {
        self.cost
    }

    #[inline]
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn converter(&self) -> SignalConverter {
        SignalConverter::new(self.cost, self.initial_capital)
    }

    /// Run a single end-to-end backtest.
    ///
    /// Rejects malformed bars and series shorter than the strategy's
    /// `min_bars` before any indicator is computed.
    pub fn run(&self, bars: &BarSeries, strategy: &dyn Strategy) -> Result<BacktestResult, EngineError> {
        bars.validate()?;
        strategy.check_bars(bars)?;
        let frame = strategy.calculate(bars)?;
        self.evaluate(&frame, strategy)
    }

    /// Score an already computed signal frame.
    pub fn evaluate(
        &self,
        frame: &SignalFrame<'_>,
        strategy: &dyn Strategy,
    ) -> Result<BacktestResult, EngineError> {
        let series = self.converter().convert(frame)?;
        let signals = frame.signals()?;
        let metrics =
            MetricsCalculator::calculate(&series.strategy_returns, &series.equity_curve, Some(signals));
        let name = strategy.name();

        debug!(
            strategy = %name,
            bars = frame.len(),
            sharpe = metrics.sharpe_ratio,
            trades = metrics.total_trades,
            "backtest evaluated"
        );

        Ok(BacktestResult {
            strategy_name: name,
            params: strategy.params(),
            metrics,
            hodl_return: hodl_return(&frame.bars().close),
            signals: signals.to_vec(),
            undefined_prefix: frame.undefined_prefix(),
            total_cost: series.total_cost_charged,
            equity_curve: series.equity_curve,
            strategy_returns: series.strategy_returns,
        })
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self {
            cost: CostModel::default(),
            initial_capital: 10_000_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecbt_strategy::{EmaCross, SimpleEmaCross, StrategyError};

    fn golden_bars() -> BarSeries {
        BarSeries::from_closes(1_700_000_000, &[100.0, 102.0, 101.0, 105.0, 110.0, 108.0])
    }

    fn make_trending_bars(n: usize) -> BarSeries {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + (i as f64) * 0.5 + ((i as f64) * 0.7).sin() * 3.0)
            .collect();
        BarSeries::from_closes(1_735_689_600, &closes)
    }

    #[test]
    fn test_golden_equity_curve() {
        let bars = golden_bars();
        let strategy = SimpleEmaCross::new(2, 3).unwrap();
        let frame = strategy.calculate(&bars).unwrap();
        let engine = BacktestEngine::new(0.001, 0.001, 10_000.0).unwrap();
        let result = engine.evaluate(&frame, &strategy).unwrap();

        let signals: Vec<i8> = result.signals.iter().map(|s| s.as_i8()).collect();
        assert_eq!(signals, [0, 1, 1, 1, 1, 1]);

        let entry: f64 = 9980.0;
        let expected = [
            10_000.0,
            entry,
            entry * 101.0 / 102.0,
            entry * 105.0 / 102.0,
            entry * 110.0 / 102.0,
            entry * 108.0 / 102.0,
        ];
        for (got, want) in result.equity_curve.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }

        assert!(result.strategy_returns[0].is_nan());
        assert!((result.strategy_returns[1] + 0.002).abs() < 1e-12);
        assert!((result.strategy_returns[3] - (105.0 / 101.0 - 1.0)).abs() < 1e-12);

        let m = &result.metrics;
        assert_eq!(m.total_trades, 1);
        assert!((m.win_rate - 0.4).abs() < 1e-10);
        assert!((m.total_return - (entry * 108.0 / 102.0 / 10_000.0 - 1.0)).abs() < 1e-10);
        let annual = (1.0 + m.total_return).powf(365.0 / 5.0) - 1.0;
        assert!((m.annual_return - annual).abs() < 1e-6 * annual.abs().max(1.0));
        assert!((result.hodl_return - 0.08).abs() < 1e-12);
        assert!((result.total_cost - 0.002).abs() < 1e-12);
        // Peak 9980 * 110 / 102, then the drop to 108
        assert!((m.max_drawdown - (108.0 / 110.0 - 1.0)).abs() < 1e-10);
    }

    #[test]
    fn test_run_rejects_short_series() {
        let bars = golden_bars();
        let engine = BacktestEngine::default();
        let err = engine.run(&bars, &SimpleEmaCross::new(2, 3).unwrap()).unwrap_err();
        assert!(err.is_insufficient_data());
        match err {
            EngineError::Strategy(StrategyError::InsufficientData { required, available }) => {
                assert_eq!(required, 8);
                assert_eq!(available, 6);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_run_rejects_malformed_bars() {
        let mut bars = make_trending_bars(40);
        bars.timestamps[10] = bars.timestamps[9];
        let err = BacktestEngine::default()
            .run(&bars, &SimpleEmaCross::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));

        let empty = BarSeries::new();
        let err = BacktestEngine::default()
            .run(&empty, &SimpleEmaCross::default())
            .unwrap_err();
        assert!(!err.is_insufficient_data());
    }

    #[test]
    fn test_run_is_deterministic() {
        let bars = make_trending_bars(200);
        let engine = BacktestEngine::default();
        let strategy = EmaCross::default();

        let a = engine.run(&bars, &strategy).unwrap();
        let b = engine.run(&bars, &strategy).unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.signals, b.signals);
        assert_eq!(a.equity_curve.len(), bars.len());
        assert!((a.equity_curve[0] - 10_000_000.0).abs() < 1e-6);
        assert_eq!(a.strategy_name, "ema_cross_5_20");
        assert_eq!(a.summary().params, strategy.params());
    }

    #[test]
    fn test_new_validates_inputs() {
        assert!(BacktestEngine::new(0.001, 0.001, 0.0).is_err());
        assert!(BacktestEngine::new(-0.001, 0.001, 1.0).is_err());
        assert!(BacktestEngine::new(0.0, 0.0, 1.0).is_ok());

        let engine = BacktestEngine::from_config(&EngineConfig::default()).unwrap();
        assert!((engine.cost_model().total_cost() - 0.002).abs() < 1e-15);
        assert!((engine.initial_capital() - 10_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_display() {
        let bars = golden_bars();
        let strategy = SimpleEmaCross::new(2, 3).unwrap();
        let frame = strategy.calculate(&bars).unwrap();
        let result = BacktestEngine::default().evaluate(&frame, &strategy).unwrap();
        let text = result.to_string();
        assert!(text.starts_with("[simple_ema_2_3]"));
        assert!(text.contains("HODL: 8.00%"));

        // 9980 * 108/102 = 10567.06, i.e. +5.67% against +8.00% held
        assert!((result.excess_return() - (result.metrics.total_return - 0.08)).abs() < 1e-12);
        assert!(text.contains("excess: -2.33%"), "{}", text);
        assert!(text.ends_with("final equity: 10567.06"), "{}", text);
        assert_eq!(result.final_equity(), result.equity_curve.last().copied());
    }
}
