pub mod engine;
pub mod error;
pub mod metrics;
pub mod parallel;
pub mod returns;
pub mod table;
pub mod walk_forward;

pub use engine::{BacktestEngine, BacktestResult};
pub use error::EngineError;
pub use metrics::{count_transitions, hodl_return, Metric, Metrics, MetricsCalculator};
pub use returns::{CostModel, ReturnSeries, SignalConverter};
pub use table::{ResultTable, SummaryRow};
pub use walk_forward::WalkForwardReport;
