use vecbt_core::{BarSeries, DataError, ParamSet, SignalFrame, TradeSignal};

use crate::error::StrategyError;

/// Pure-function strategy interface for vectorized backtesting.
///
/// A strategy maps a bar series to a frame of indicator columns plus one
/// signal per bar. Implementations hold only their parameters, never
/// per-run state, and must be Send + Sync for Rayon parallelism.
pub trait Strategy: Send + Sync {
    /// Display name derived from the key parameters, e.g. `ema_cross_5_20`.
    fn name(&self) -> String;

    /// Complete parameter set, defaults included.
    fn params(&self) -> ParamSet;

    /// Minimum number of bars the engine requires before running this strategy.
    fn min_bars(&self) -> usize;

    /// Compute indicator columns and the signal column.
    ///
    /// Lenient on short input: bars without enough history get `NaN`
    /// indicators and neutral signals.
    fn calculate<'a>(&self, bars: &'a BarSeries) -> Result<SignalFrame<'a>, StrategyError>;

    /// Fail with `InsufficientData` when `bars` is shorter than [`Strategy::min_bars`].
    fn check_bars(&self, bars: &BarSeries) -> Result<(), StrategyError> {
        let required = self.min_bars();
        if bars.len() < required {
            return Err(StrategyError::InsufficientData {
                required,
                available: bars.len(),
            });
        }
        Ok(())
    }

    /// The actionable signal on the most recent bar.
    fn latest_signal(&self, bars: &BarSeries) -> Result<TradeSignal, StrategyError> {
        let frame = self.calculate(bars)?;
        let last = frame.signals()?.last().copied().ok_or(DataError::Empty)?;
        Ok(TradeSignal::from_signal(last, self.name()))
    }
}

/// Builds strategy instances from parameter sets.
///
/// Grid search and walk-forward go through a factory so that every parameter
/// combination gets its own fresh instance.
pub trait StrategyFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError>;
}
