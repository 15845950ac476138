use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use vecbt_core::Signal;

use crate::error::EngineError;

/// Periods per year used for annualization, independent of the bar interval.
pub const PERIODS_PER_YEAR: f64 = 365.0;

/// Computed performance metrics.
///
/// All fractions are plain ratios (0.05 = 5%). `max_drawdown` is <= 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub profit_factor: f64,
    pub avg_trade_return: f64,
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "return {:.2}% | annual {:.2}% | sharpe {:.2} | mdd {:.2}% | win {:.2}% | trades {}",
            self.total_return * 100.0,
            self.annual_return * 100.0,
            self.sharpe_ratio,
            self.max_drawdown * 100.0,
            self.win_rate * 100.0,
            self.total_trades
        )
    }
}

/// A sortable metric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalReturn,
    AnnualReturn,
    #[default]
    SharpeRatio,
    MaxDrawdown,
    WinRate,
    TotalTrades,
    ProfitFactor,
    AvgTradeReturn,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::TotalReturn,
        Metric::AnnualReturn,
        Metric::SharpeRatio,
        Metric::MaxDrawdown,
        Metric::WinRate,
        Metric::TotalTrades,
        Metric::ProfitFactor,
        Metric::AvgTradeReturn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::TotalReturn => "total_return",
            Metric::AnnualReturn => "annual_return",
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::MaxDrawdown => "max_drawdown",
            Metric::WinRate => "win_rate",
            Metric::TotalTrades => "total_trades",
            Metric::ProfitFactor => "profit_factor",
            Metric::AvgTradeReturn => "avg_trade_return",
        }
    }

    pub fn get(self, metrics: &Metrics) -> f64 {
        match self {
            Metric::TotalReturn => metrics.total_return,
            Metric::AnnualReturn => metrics.annual_return,
            Metric::SharpeRatio => metrics.sharpe_ratio,
            Metric::MaxDrawdown => metrics.max_drawdown,
            Metric::WinRate => metrics.win_rate,
            Metric::TotalTrades => metrics.total_trades as f64,
            Metric::ProfitFactor => metrics.profit_factor,
            Metric::AvgTradeReturn => metrics.avg_trade_return,
        }
    }
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| EngineError::UnknownMetric {
                name: name.to_string(),
                available: Metric::ALL.map(Metric::as_str).join(", "),
            })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Reduce a per-bar return series to summary statistics.
    ///
    /// `NaN` returns are dropped before any count-based statistic. An empty
    /// realized series yields an all-zero record. Without a signal series,
    /// trades are approximated by the number of non-zero returns.
    pub fn calculate(returns: &[f64], equity_curve: &[f64], signals: Option<&[Signal]>) -> Metrics {
        let realized: Vec<f64> = returns.iter().copied().filter(|r| !r.is_nan()).collect();
        if realized.is_empty() {
            return Metrics::default();
        }

        let total_return = Self::total_return(&realized);
        let annual_return = Self::annual_return(total_return, realized.len());
        let sharpe_ratio = match Self::volatility(&realized) {
            Some(vol) if vol > 0.0 => annual_return / vol,
            _ => 0.0,
        };

        let total_trades = match signals {
            Some(signals) => count_transitions(signals),
            None => realized.iter().filter(|&&r| r != 0.0).count(),
        };

        Metrics {
            total_return,
            annual_return,
            sharpe_ratio,
            max_drawdown: Self::max_drawdown(equity_curve),
            win_rate: Self::win_rate(&realized),
            total_trades,
            profit_factor: Self::profit_factor(&realized),
            avg_trade_return: Self::avg_trade_return(&realized),
        }
    }

    fn total_return(returns: &[f64]) -> f64 {
        returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
    }

    /// Compounded to a 365-period year by observation count.
    fn annual_return(total_return: f64, periods: usize) -> f64 {
        if total_return <= -1.0 || periods == 0 {
            return 0.0;
        }
        (1.0 + total_return).powf(PERIODS_PER_YEAR / periods as f64) - 1.0
    }

    /// Annualized sample standard deviation; `None` below two observations.
    fn volatility(returns: &[f64]) -> Option<f64> {
        sample_std(returns).map(|std| std * PERIODS_PER_YEAR.sqrt())
    }

    /// Largest peak-to-trough decline as a non-positive fraction.
    fn max_drawdown(equity_curve: &[f64]) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut max_dd = 0.0f64;
        for &value in equity_curve {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                let dd = (value - peak) / peak;
                if dd < max_dd {
                    max_dd = dd;
                }
            }
        }
        max_dd
    }

    fn win_rate(returns: &[f64]) -> f64 {
        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let losses = returns.iter().filter(|&&r| r < 0.0).count();
        if wins + losses == 0 {
            return 0.0;
        }
        wins as f64 / (wins + losses) as f64
    }

    fn profit_factor(returns: &[f64]) -> f64 {
        let gross_profit: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
        let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();
        if gross_loss == 0.0 {
            return f64::INFINITY;
        }
        gross_profit / gross_loss
    }

    fn avg_trade_return(returns: &[f64]) -> f64 {
        let (sum, count) = returns
            .iter()
            .filter(|&&r| r != 0.0)
            .fold((0.0, 0usize), |(s, c), &r| (s + r, c + 1));
        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }
}

/// Number of bars whose signal differs from the previous bar's.
pub fn count_transitions(signals: &[Signal]) -> usize {
    signals.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Buy-and-hold return over the series: `close[last] / close[0] - 1`.
pub fn hodl_return(close: &[f64]) -> f64 {
    match (close.first(), close.last()) {
        (Some(&first), Some(&last)) if close.len() >= 2 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
