use thiserror::Error;
use vecbt_core::{ConfigError, DataError};
use vecbt_strategy::StrategyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown metric `{name}` (available: {available})")]
    UnknownMetric { name: String, available: String },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Walk-forward training could not evaluate a single parameter combination.
    #[error("no valid results in training period ({combinations} combinations over {train_bars} bars)")]
    NoValidResults {
        combinations: usize,
        train_bars: usize,
    },
}

impl EngineError {
    /// True when the failure is a too-short series rather than bad input.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            EngineError::Strategy(StrategyError::InsufficientData { .. })
        )
    }
}
