use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete position intent for one bar.
///
/// Serialized as the integers `-1`, `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Short,
    #[default]
    Neutral,
    Long,
}

impl Signal {
    #[inline]
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Neutral => 0,
            Signal::Long => 1,
        }
    }

    /// Position multiplier applied to a price return.
    #[inline]
    pub fn value(self) -> f64 {
        self.as_i8() as f64
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.as_i8()
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Signal::Short),
            0 => Ok(Signal::Neutral),
            1 => Ok(Signal::Long),
            other => Err(format!("signal must be -1, 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// The actionable reading of a strategy's most recent bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: SignalAction,
    pub strength: f64,
    pub reason: String,
}

impl TradeSignal {
    pub fn from_signal(signal: Signal, reason: impl Into<String>) -> Self {
        let action = match signal {
            Signal::Long => SignalAction::Buy,
            Signal::Short => SignalAction::Sell,
            Signal::Neutral => SignalAction::Hold,
        };
        Self {
            action,
            strength: signal.value().abs(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_values() {
        assert_eq!(Signal::Short.value(), -1.0);
        assert_eq!(Signal::Neutral.value(), 0.0);
        assert_eq!(Signal::Long.value(), 1.0);
        assert_eq!(Signal::default(), Signal::Neutral);
    }

    #[test]
    fn test_signal_try_from() {
        assert_eq!(Signal::try_from(-1i8), Ok(Signal::Short));
        assert!(Signal::try_from(2i8).is_err());
    }

    #[test]
    fn test_trade_signal_mapping() {
        let buy = TradeSignal::from_signal(Signal::Long, "ema_cross_5_20");
        assert_eq!(buy.action, SignalAction::Buy);
        assert_eq!(buy.strength, 1.0);

        let hold = TradeSignal::from_signal(Signal::Neutral, "ema_cross_5_20");
        assert_eq!(hold.action, SignalAction::Hold);
        assert_eq!(hold.strength, 0.0);

        let sell = TradeSignal::from_signal(Signal::Short, "x");
        assert_eq!(sell.action, SignalAction::Sell);
    }
}
