use thiserror::Error;
use vecbt_core::{DataError, ParamValue};

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unknown strategy `{name}` (available: {available})")]
    UnknownStrategy { name: String, available: String },

    #[error("strategy `{strategy}` has no parameter `{name}`")]
    UnknownParameter { strategy: &'static str, name: String },

    #[error("parameter `{name}` expects {expected}, got {} `{actual}`", .actual.kind())]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: ParamValue,
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("insufficient data: {required} bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error(transparent)]
    Data(#[from] DataError),
}
