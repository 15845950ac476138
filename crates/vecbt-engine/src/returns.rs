use serde::Serialize;
use vecbt_core::{ConfigError, DataError, Signal, SignalFrame};

/// Flat proportional trading costs, charged per unit of position change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostModel {
    pub fee_rate: f64,
    pub slippage: f64,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage: f64) -> Result<Self, ConfigError> {
        for (field, value) in [("fee_rate", fee_rate), ("slippage", slippage)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be a finite value >= 0, got {}", value),
                ));
            }
        }
        Ok(Self { fee_rate, slippage })
    }

    /// Fee and slippage combined additively.
    #[inline]
    pub fn total_cost(&self) -> f64 {
        self.fee_rate + self.slippage
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage: 0.001,
        }
    }
}

/// Per-bar output of the signal-to-return conversion. All vectors are
/// aligned with the input bars.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnSeries {
    /// `close[t] / close[t-1] - 1`, `NaN` at bar 0.
    pub price_returns: Vec<f64>,
    /// `|signal[t] - signal[t-1]|`, 0 at bar 0.
    pub position_changes: Vec<f64>,
    /// Cost-adjusted return of the position held into each bar, `NaN` at bar 0.
    pub strategy_returns: Vec<f64>,
    pub equity_curve: Vec<f64>,
    /// Sum of per-bar cost deductions, as a fraction of equity.
    pub total_cost_charged: f64,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.strategy_returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategy_returns.is_empty()
    }

    /// Strategy returns with the undefined entries dropped.
    pub fn realized(&self) -> impl Iterator<Item = f64> + '_ {
        self.strategy_returns.iter().copied().filter(|r| !r.is_nan())
    }
}

/// Turns a signal column into cost-adjusted returns and an equity curve.
///
/// The position held over bar `t` is the signal decided at `t - 1`.
#[derive(Debug, Clone, Copy)]
pub struct SignalConverter {
    cost: CostModel,
    initial_capital: f64,
}

impl SignalConverter {
    pub fn new(cost: CostModel, initial_capital: f64) -> Self {
        Self {
            cost,
            initial_capital,
        }
    }

    /// Convert a strategy-augmented frame. Fails if no signal column exists.
    pub fn convert(&self, frame: &SignalFrame<'_>) -> Result<ReturnSeries, DataError> {
        let signals = frame.signals()?;
        self.convert_signals(&frame.bars().close, signals)
    }

    pub fn convert_signals(&self, close: &[f64], signals: &[Signal]) -> Result<ReturnSeries, DataError> {
        if close.len() != signals.len() {
            return Err(DataError::LengthMismatch {
                name: "signal".to_string(),
                expected: close.len(),
                actual: signals.len(),
            });
        }

        let n = close.len();
        let total_cost = self.cost.total_cost();
        let mut price_returns = Vec::with_capacity(n);
        let mut position_changes = Vec::with_capacity(n);
        let mut strategy_returns = Vec::with_capacity(n);
        let mut equity_curve = Vec::with_capacity(n);
        let mut total_cost_charged = 0.0;
        let mut growth = 1.0;

        for t in 0..n {
            let (price_ret, change, strat_ret) = if t == 0 {
                (f64::NAN, 0.0, f64::NAN)
            } else {
                let held = signals[t - 1].value();
                let price_ret = close[t] / close[t - 1] - 1.0;
                let change = (signals[t].value() - held).abs();
                (price_ret, change, price_ret * held - change * total_cost)
            };

            total_cost_charged += change * total_cost;
            if !strat_ret.is_nan() {
                growth *= 1.0 + strat_ret;
            }

            price_returns.push(price_ret);
            position_changes.push(change);
            strategy_returns.push(strat_ret);
            equity_curve.push(self.initial_capital * growth);
        }

        Ok(ReturnSeries {
            price_returns,
            position_changes,
            strategy_returns,
            equity_curve,
            total_cost_charged,
        })
    }
}
