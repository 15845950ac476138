use vecbt_core::{ParamSet, ParamValue};

use crate::error::StrategyError;

/// Typed access to a [`ParamSet`] with per-strategy defaults.
///
/// Construction rejects names the strategy does not declare, so a typo in a
/// grid fails that combination instead of silently running defaults.
pub(crate) struct ParamReader<'a> {
    params: &'a ParamSet,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(
        strategy: &'static str,
        params: &'a ParamSet,
        known: &[&str],
    ) -> Result<Self, StrategyError> {
        if let Some(name) = params.names().find(|n| !known.contains(n)) {
            return Err(StrategyError::UnknownParameter {
                strategy,
                name: name.to_string(),
            });
        }
        Ok(Self { params })
    }

    /// A lookback window length; must be a positive integer.
    pub(crate) fn period(&self, name: &str, default: usize) -> Result<usize, StrategyError> {
        let Some(value) = self.params.get(name) else {
            return Ok(default);
        };
        let period = value.as_int().ok_or_else(|| mismatch(name, "int", value))?;
        if period < 1 {
            return Err(invalid_period(name, period));
        }
        Ok(period as usize)
    }

    pub(crate) fn float(&self, name: &str, default: f64) -> Result<f64, StrategyError> {
        let Some(value) = self.params.get(name) else {
            return Ok(default);
        };
        let v = value.as_float().ok_or_else(|| mismatch(name, "float", value))?;
        if !v.is_finite() {
            return Err(StrategyError::InvalidParameter {
                name: name.to_string(),
                reason: format!("must be finite, got {}", v),
            });
        }
        Ok(v)
    }

    pub(crate) fn flag(&self, name: &str, default: bool) -> Result<bool, StrategyError> {
        match self.params.get(name) {
            Some(value) => value.as_bool().ok_or_else(|| mismatch(name, "bool", value)),
            None => Ok(default),
        }
    }
}

pub(crate) fn check_period(name: &str, period: usize) -> Result<usize, StrategyError> {
    if period == 0 {
        return Err(invalid_period(name, 0));
    }
    Ok(period)
}

fn invalid_period(name: &str, period: i64) -> StrategyError {
    StrategyError::InvalidParameter {
        name: name.to_string(),
        reason: format!("period must be >= 1, got {}", period),
    }
}

fn mismatch(name: &str, expected: &'static str, actual: ParamValue) -> StrategyError {
    StrategyError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual,
    }
}
