pub mod ema_cross;
pub mod error;
pub mod indicators;
mod param_reader;
pub mod registry;
pub mod traits;
pub mod vwap_reversal;

pub use ema_cross::{EmaCross, SimpleEmaCross};
pub use error::StrategyError;
pub use registry::{create, StrategyKind};
pub use traits::{Strategy, StrategyFactory};
pub use vwap_reversal::VwapReversal;
