use thiserror::Error;

/// Input-boundary and frame precondition failures.
///
/// These are distinct from an economic outcome such as a strategy that
/// never trades: a `DataError` means the computation could not run at all.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("bar series is empty")]
    Empty,

    #[error("timestamps must be strictly increasing (index {index}: {previous} -> {current})")]
    NonMonotonic {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("invalid {field} at index {index}: {value}")]
    InvalidValue {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("column `{name}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("required column `{0}` is missing")]
    MissingColumn(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
