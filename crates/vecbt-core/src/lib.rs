pub mod bar;
pub mod config;
pub mod error;
pub mod frame;
pub mod params;
pub mod signal;

pub use bar::BarSeries;
pub use config::{BacktestConfig, EngineConfig, GridConfig, LoggingConfig, WalkForwardConfig};
pub use error::{ConfigError, DataError};
pub use frame::{SignalFrame, SIGNAL_COLUMN};
pub use params::{ParamAxis, ParamGrid, ParamSet, ParamValue};
pub use signal::{Signal, SignalAction, TradeSignal};
