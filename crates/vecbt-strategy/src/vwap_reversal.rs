use vecbt_core::{BarSeries, ParamSet, Signal, SignalFrame};

use crate::error::StrategyError;
use crate::indicators::{rsi, vwap_rolling};
use crate::param_reader::ParamReader;
use crate::traits::Strategy;

/// Long-only stateful strategy trading turns of the rolling VWAP.
///
/// Enters when the VWAP turns up while RSI is above the threshold, exits
/// when the VWAP turns down, and otherwise holds the previous position.
#[derive(Debug, Clone, PartialEq)]
pub struct VwapReversal {
    rsi_threshold: f64,
    vwap_period: usize,
    rsi_period: usize,
}

impl VwapReversal {
    pub const ID: &'static str = "vwap_reversal";
    const PARAMS: &'static [&'static str] = &["rsi_threshold", "vwap_period", "rsi_period"];

    pub fn from_params(params: &ParamSet) -> Result<Self, StrategyError> {
        let reader = ParamReader::new(Self::ID, params, Self::PARAMS)?;
        Ok(Self {
            rsi_threshold: reader.float("rsi_threshold", 70.0)?,
            vwap_period: reader.period("vwap_period", 20)?,
            rsi_period: reader.period("rsi_period", 14)?,
        })
    }
}

impl Default for VwapReversal {
    fn default() -> Self {
        Self {
            rsi_threshold: 70.0,
            vwap_period: 20,
            rsi_period: 14,
        }
    }
}

/// Carry-forward position driven by VWAP turning points.
fn reversal_signals(vwap: &[f64], rsi: &[f64], threshold: f64) -> Vec<Signal> {
    let mut signals = Vec::with_capacity(vwap.len());
    let mut held = Signal::Neutral;

    for i in 0..vwap.len() {
        if i >= 2 {
            let (now, prev, prev2) = (vwap[i], vwap[i - 1], vwap[i - 2]);
            let turned_up = now > prev && prev <= prev2;
            let turned_down = now < prev && prev >= prev2;

            if turned_up && rsi[i] > threshold {
                held = Signal::Long;
            }
            // Exit wins over entry on the same bar.
            if turned_down {
                held = Signal::Neutral;
            }
        }
        signals.push(held);
    }
    signals
}

impl Strategy for VwapReversal {
    fn name(&self) -> String {
        format!("vwap_reversal_{}_{}", self.rsi_threshold, self.vwap_period)
    }

    fn params(&self) -> ParamSet {
        ParamSet::new()
            .with("rsi_threshold", self.rsi_threshold)
            .with("vwap_period", self.vwap_period)
            .with("rsi_period", self.rsi_period)
    }

    fn min_bars(&self) -> usize {
        (self.vwap_period + 2).max(self.rsi_period) + 10
    }

    fn calculate<'a>(&self, bars: &'a BarSeries) -> Result<SignalFrame<'a>, StrategyError> {
        let rsi = rsi(&bars.close, self.rsi_period);
        let vwap = vwap_rolling(bars, self.vwap_period);
        let signals = reversal_signals(&vwap, &rsi, self.rsi_threshold);

        Ok(SignalFrame::new(bars)
            .with_column("rsi", rsi)?
            .with_column("vwap", vwap)?
            .with_signals(signals)?)
    }
}
