//! Column-wise technical indicators.
//!
//! Every function returns a vector aligned with its input. Bars inside the
//! warm-up window are `NaN`, which downstream comparisons treat as "no signal".

use ta::indicators::ExponentialMovingAverage;
use ta::Next;
use vecbt_core::BarSeries;

use crate::error::StrategyError;

/// Exponential moving average with smoothing `2 / (span + 1)`.
///
/// The recursion is seeded with the first value, so the output has no
/// warm-up gap.
pub fn ema(values: &[f64], span: usize) -> Result<Vec<f64>, StrategyError> {
    let mut indicator =
        ExponentialMovingAverage::new(span).map_err(|e| StrategyError::InvalidParameter {
            name: "span".to_string(),
            reason: format!("{:?}", e),
        })?;
    Ok(values.iter().map(|&v| indicator.next(v)).collect())
}

/// Relative strength index over simple rolling means of gains and losses.
///
/// The first bar contributes a zero change, so the first defined value sits
/// at index `period - 1`. A window with losses of zero reads 100 when it has
/// gains and `NaN` when it is completely flat.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = close[i] - close[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else if delta < 0.0 {
            losses[i] = -delta;
        }
    }

    let scale = period as f64;
    for i in (period - 1)..n {
        let start = i + 1 - period;
        let avg_gain = gains[start..=i].iter().sum::<f64>() / scale;
        let avg_loss = losses[start..=i].iter().sum::<f64>() / scale;
        out[i] = if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                f64::NAN
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }
    out
}

/// Rolling volume-weighted average of the typical price `(h + l + c) / 3`.
///
/// `NaN` during the warm-up window and wherever the window's volume is zero.
pub fn vwap_rolling(bars: &BarSeries, period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let weighted: Vec<f64> = (0..n)
        .map(|i| (bars.high[i] + bars.low[i] + bars.close[i]) / 3.0 * bars.volume[i])
        .collect();

    for i in (period - 1)..n {
        let start = i + 1 - period;
        let volume: f64 = bars.volume[start..=i].iter().sum();
        if volume == 0.0 {
            continue;
        }
        out[i] = weighted[start..=i].iter().sum::<f64>() / volume;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let closes = [100.0, 102.0, 101.0, 105.0, 110.0, 108.0];
        let long = ema(&closes, 3).unwrap();
        let expected = [100.0, 101.0, 101.0, 103.0, 106.5, 107.25];
        for (got, want) in long.iter().zip(expected) {
            assert!(close_enough(*got, want), "{} != {}", got, want);
        }

        let short = ema(&closes, 2).unwrap();
        assert!(close_enough(short[1], 304.0 / 3.0));
        assert!(close_enough(short[2], 910.0 / 9.0));
    }

    #[test]
    fn test_ema_rejects_zero_span() {
        assert!(matches!(
            ema(&[1.0, 2.0], 0),
            Err(StrategyError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rsi_warmup_and_values() {
        let closes = [10.0, 11.0, 10.0, 12.0, 12.0];
        let out = rsi(&closes, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        // gains [0,1,0], losses [0,0,1] -> rs = 1
        assert!(close_enough(out[2], 50.0));
        // gains [1,0,2], losses [0,1,0] -> rs = 3
        assert!(close_enough(out[3], 75.0));
        // gains [0,2,0], losses [1,0,0] -> rs = 2
        assert!(close_enough(out[4], 100.0 - 100.0 / 3.0));
    }

    #[test]
    fn test_rsi_degenerate_windows() {
        let rising = rsi(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(rising[3], 100.0);

        let flat = rsi(&[5.0; 4], 2);
        assert!(flat.iter().all(|v| v.is_nan()));

        assert!(rsi(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_vwap_rolling() {
        let mut bars = BarSeries::with_capacity(4);
        bars.push(0, 10.0, 12.0, 9.0, 9.0, 1.0); // tp 10
        bars.push(1, 10.0, 21.0, 19.0, 20.0, 3.0); // tp 20
        bars.push(2, 10.0, 30.0, 30.0, 30.0, 0.0); // tp 30
        bars.push(3, 10.0, 30.0, 30.0, 30.0, 0.0);

        let out = vwap_rolling(&bars, 2);
        assert!(out[0].is_nan());
        assert!(close_enough(out[1], (10.0 + 60.0) / 4.0));
        assert!(close_enough(out[2], 20.0));
        assert!(out[3].is_nan());
    }
}
