use vecbt_core::{BarSeries, ParamSet, Signal, SignalFrame};

use crate::error::StrategyError;
use crate::indicators::{ema, rsi};
use crate::param_reader::{check_period, ParamReader};
use crate::traits::Strategy;

/// Long while the short EMA is above the long EMA, short while below.
///
/// Equal or undefined averages give a neutral bar.
pub(crate) fn crossover(short: &[f64], long: &[f64]) -> Vec<Signal> {
    short
        .iter()
        .zip(long)
        .map(|(&s, &l)| {
            if s > l {
                Signal::Long
            } else if s < l {
                Signal::Short
            } else {
                Signal::Neutral
            }
        })
        .collect()
}

/// Unfiltered two-EMA crossover.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleEmaCross {
    short_period: usize,
    long_period: usize,
}

impl SimpleEmaCross {
    pub const ID: &'static str = "simple_ema_cross";
    const PARAMS: &'static [&'static str] = &["short_period", "long_period"];

    pub fn new(short_period: usize, long_period: usize) -> Result<Self, StrategyError> {
        Ok(Self {
            short_period: check_period("short_period", short_period)?,
            long_period: check_period("long_period", long_period)?,
        })
    }

    pub fn from_params(params: &ParamSet) -> Result<Self, StrategyError> {
        let reader = ParamReader::new(Self::ID, params, Self::PARAMS)?;
        Ok(Self {
            short_period: reader.period("short_period", 5)?,
            long_period: reader.period("long_period", 20)?,
        })
    }
}

impl Default for SimpleEmaCross {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
        }
    }
}

impl Strategy for SimpleEmaCross {
    fn name(&self) -> String {
        format!("simple_ema_{}_{}", self.short_period, self.long_period)
    }

    fn params(&self) -> ParamSet {
        ParamSet::new()
            .with("short_period", self.short_period)
            .with("long_period", self.long_period)
    }

    fn min_bars(&self) -> usize {
        self.long_period + 5
    }

    fn calculate<'a>(&self, bars: &'a BarSeries) -> Result<SignalFrame<'a>, StrategyError> {
        let ema_short = ema(&bars.close, self.short_period)?;
        let ema_long = ema(&bars.close, self.long_period)?;
        let signals = crossover(&ema_short, &ema_long);

        Ok(SignalFrame::new(bars)
            .with_column("ema_short", ema_short)?
            .with_column("ema_long", ema_long)?
            .with_signals(signals)?)
    }
}

/// EMA crossover whose long entries must pass a trend and a momentum filter.
///
/// The filters only veto `Long` bars. Short bars from the crossover are
/// always kept, so a bearish cross trades regardless of trend or RSI.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaCross {
    short_period: usize,
    long_period: usize,
    trend_period: usize,
    rsi_period: usize,
    rsi_threshold: f64,
    use_trend_filter: bool,
    use_rsi_filter: bool,
}

impl EmaCross {
    pub const ID: &'static str = "ema_cross";
    const PARAMS: &'static [&'static str] = &[
        "short_period",
        "long_period",
        "trend_period",
        "rsi_period",
        "rsi_threshold",
        "use_trend_filter",
        "use_rsi_filter",
    ];

    pub fn from_params(params: &ParamSet) -> Result<Self, StrategyError> {
        let reader = ParamReader::new(Self::ID, params, Self::PARAMS)?;
        let defaults = Self::default();
        Ok(Self {
            short_period: reader.period("short_period", defaults.short_period)?,
            long_period: reader.period("long_period", defaults.long_period)?,
            trend_period: reader.period("trend_period", defaults.trend_period)?,
            rsi_period: reader.period("rsi_period", defaults.rsi_period)?,
            rsi_threshold: reader.float("rsi_threshold", defaults.rsi_threshold)?,
            use_trend_filter: reader.flag("use_trend_filter", defaults.use_trend_filter)?,
            use_rsi_filter: reader.flag("use_rsi_filter", defaults.use_rsi_filter)?,
        })
    }
}

impl Default for EmaCross {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
            trend_period: 60,
            rsi_period: 14,
            rsi_threshold: 50.0,
            use_trend_filter: true,
            use_rsi_filter: true,
        }
    }
}

impl Strategy for EmaCross {
    fn name(&self) -> String {
        format!("ema_cross_{}_{}", self.short_period, self.long_period)
    }

    fn params(&self) -> ParamSet {
        ParamSet::new()
            .with("short_period", self.short_period)
            .with("long_period", self.long_period)
            .with("trend_period", self.trend_period)
            .with("rsi_period", self.rsi_period)
            .with("rsi_threshold", self.rsi_threshold)
            .with("use_trend_filter", self.use_trend_filter)
            .with("use_rsi_filter", self.use_rsi_filter)
    }

    fn min_bars(&self) -> usize {
        self.short_period.max(self.long_period).max(self.trend_period) + 10
    }

    fn calculate<'a>(&self, bars: &'a BarSeries) -> Result<SignalFrame<'a>, StrategyError> {
        let close = &bars.close;
        let ema_short = ema(close, self.short_period)?;
        let ema_long = ema(close, self.long_period)?;
        let mut signals = crossover(&ema_short, &ema_long);

        let mut frame = SignalFrame::new(bars)
            .with_column("ema_short", ema_short)?
            .with_column("ema_long", ema_long)?;

        if self.use_trend_filter {
            let trend = ema(close, self.trend_period)?;
            for (i, signal) in signals.iter_mut().enumerate() {
                let uptrend = close[i] > trend[i];
                if *signal == Signal::Long && !uptrend {
                    *signal = Signal::Neutral;
                }
            }
            frame = frame.with_column("ema_trend", trend)?;
        }

        if self.use_rsi_filter {
            let rsi = rsi(close, self.rsi_period);
            for (i, signal) in signals.iter_mut().enumerate() {
                // NaN fails the comparison, so warm-up bars are vetoed.
                let strong = rsi[i] > self.rsi_threshold;
                if *signal == Signal::Long && !strong {
                    *signal = Signal::Neutral;
                }
            }
            frame = frame.with_column("rsi", rsi)?;
        }

        Ok(frame.with_signals(signals)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecbt_core::ParamValue;

    fn golden_bars() -> BarSeries {
        BarSeries::from_closes(1_700_000_000, &[100.0, 102.0, 101.0, 105.0, 110.0, 108.0])
    }

    #[test]
    fn test_simple_golden_signals() {
        let bars = golden_bars();
        let strategy = SimpleEmaCross::new(2, 3).unwrap();
        let frame = strategy.calculate(&bars).unwrap();

        let signals: Vec<i8> = frame.signals().unwrap().iter().map(|s| s.as_i8()).collect();
        assert_eq!(signals, [0, 1, 1, 1, 1, 1]);

        let long = frame.column("ema_long").unwrap();
        assert!((long[4] - 106.5).abs() < 1e-9);
        assert_eq!(frame.undefined_prefix(), 0);
        assert_eq!(strategy.name(), "simple_ema_2_3");
        assert_eq!(strategy.min_bars(), 8);
    }

    #[test]
    fn test_crossover_neutral_on_nan_and_ties() {
        let short = [1.0, 2.0, f64::NAN, 3.0];
        let long = [2.0, 1.0, 1.0, 3.0];
        assert_eq!(
            crossover(&short, &long),
            [Signal::Short, Signal::Long, Signal::Neutral, Signal::Neutral]
        );
    }

    #[test]
    fn test_filters_never_suppress_shorts() {
        // Steady decline: short EMA below long EMA, trend filter fails everywhere.
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let bars = BarSeries::from_closes(0, &closes);

        let filtered = EmaCross::from_params(&ParamSet::new().with("trend_period", 10)).unwrap();
        let signals = filtered.calculate(&bars).unwrap().into_signals().unwrap();
        assert!(signals[1..].iter().all(|&s| s == Signal::Short));
    }

    #[test]
    fn test_filters_veto_longs() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = BarSeries::from_closes(0, &closes);

        let plain = SimpleEmaCross::default().calculate(&bars).unwrap().into_signals().unwrap();
        assert!(plain[1..].iter().all(|&s| s == Signal::Long));

        // RSI on a strict uptrend is 100 once defined, NaN before that.
        let params = ParamSet::new()
            .with("rsi_period", 14)
            .with("use_trend_filter", false);
        let strategy = EmaCross::from_params(&params).unwrap();
        let frame = strategy.calculate(&bars).unwrap();
        let signals = frame.signals().unwrap();
        assert!(signals[..13].iter().all(|&s| s == Signal::Neutral));
        assert!(signals[13..].iter().all(|&s| s == Signal::Long));
        assert_eq!(frame.undefined_prefix(), 13);
        assert!(frame.column("ema_trend").is_none());

        let strict = EmaCross::from_params(&params.clone().with("rsi_threshold", 100)).unwrap();
        let signals = strict.calculate(&bars).unwrap().into_signals().unwrap();
        assert!(signals.iter().all(|&s| s == Signal::Neutral));
    }

    #[test]
    fn test_trend_filter_vetoes_longs_below_trend() {
        // Decline then recovery: EMA(3) crosses EMA(8) at bar 32 while the
        // close is still under EMA(40) until bar 36.
        let closes: Vec<f64> = (0..30)
            .map(|i| 200.0 - i as f64)
            .chain((1..=30).map(|i| 171.0 + 2.0 * i as f64))
            .collect();
        let bars = BarSeries::from_closes(0, &closes);
        let params = ParamSet::new()
            .with("short_period", 3)
            .with("long_period", 8)
            .with("trend_period", 40)
            .with("use_rsi_filter", false);

        let unfiltered = EmaCross::from_params(&params.clone().with("use_trend_filter", false))
            .unwrap()
            .calculate(&bars)
            .unwrap()
            .into_signals()
            .unwrap();
        assert!(unfiltered[1..32].iter().all(|&s| s == Signal::Short));
        assert!(unfiltered[32..].iter().all(|&s| s == Signal::Long));

        let frame = EmaCross::from_params(&params).unwrap().calculate(&bars).unwrap();
        let trend = frame.column("ema_trend").unwrap();
        let signals = frame.signals().unwrap();
        for i in 32..36 {
            assert!(closes[i] <= trend[i], "bar {} above trend", i);
            assert_eq!(signals[i], Signal::Neutral, "bar {}", i);
        }
        assert!(signals[36..].iter().all(|&s| s == Signal::Long));
        assert!(signals[1..32].iter().all(|&s| s == Signal::Short));
    }

    #[test]
    fn test_params_defaults_and_validation() {
        let strategy = EmaCross::from_params(&ParamSet::new().with("short_period", 3)).unwrap();
        assert_eq!(strategy.name(), "ema_cross_3_20");
        assert_eq!(strategy.min_bars(), 70);
        assert_eq!(strategy.params().get("rsi_threshold"), Some(ParamValue::Float(50.0)));
        assert_eq!(strategy.params().len(), 7);

        let err = EmaCross::from_params(&ParamSet::new().with("fast", 3)).unwrap_err();
        assert!(matches!(err, StrategyError::UnknownParameter { .. }));

        let err = EmaCross::from_params(&ParamSet::new().with("long_period", 0)).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParameter { .. }));

        let err = EmaCross::from_params(&ParamSet::new().with("use_rsi_filter", 1)).unwrap_err();
        assert!(matches!(err, StrategyError::TypeMismatch { .. }));

        assert!(SimpleEmaCross::new(0, 5).is_err());
    }

    #[test]
    fn test_latest_signal() {
        let bars = golden_bars();
        let signal = SimpleEmaCross::new(2, 3).unwrap().latest_signal(&bars).unwrap();
        assert_eq!(signal.action, vecbt_core::SignalAction::Buy);
        assert_eq!(signal.reason, "simple_ema_2_3");

        let empty = BarSeries::new();
        assert!(SimpleEmaCross::default().latest_signal(&empty).is_err());
    }
}
