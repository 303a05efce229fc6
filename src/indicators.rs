//! Technical indicators powered by the `ta` crate
//!
//! Every series function returns a vector aligned with its input, holding `None`
//! until the indicator has seen enough values to be meaningful.
//!
//! Available indicators:
//! - Moving Averages: SMA, EMA
//! - Momentum: RSI, MACD
//! - Volatility: Bollinger Bands
//! - Channels: rolling high / low

use std::collections::BTreeMap;
use ta::indicators::{
    BollingerBands as TaBB, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    SimpleMovingAverage,
};
use ta::Next;

use crate::Candle;

/// Type alias for three-line indicators (upper/middle/lower or macd/signal/histogram)
pub type BandOutput = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let v = indicator.next(value);
            (i + 1 >= period).then_some(v)
        })
        .collect()
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let v = indicator.next(value);
            (i + 1 >= period).then_some(v)
        })
        .collect()
}

// =============================================================================
// Momentum
// =============================================================================

/// Calculate Relative Strength Index (0-100)
///
/// Gains and losses are smoothed with Wilder's average (alpha = 1/period),
/// both starting from zero at the first value.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut rsi_values = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        let change = if i == 0 { 0.0 } else { values[i] - values[i - 1] };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain += (gain - avg_gain) * alpha;
        avg_loss += (loss - avg_loss) * alpha;

        if i + 1 < period {
            rsi_values.push(None);
        } else if avg_loss == 0.0 {
            rsi_values.push(Some(100.0));
        } else {
            let rs = avg_gain / avg_loss;
            rsi_values.push(Some(100.0 - (100.0 / (1.0 + rs))));
        }
    }

    rsi_values
}

/// Calculate MACD
/// Returns (macd_line, signal_line, histogram)
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> BandOutput {
    if values.is_empty() {
        return (vec![], vec![], vec![]);
    }

    let mut indicator =
        match MovingAverageConvergenceDivergence::new(fast_period, slow_period, signal_period) {
            Ok(i) => i,
            Err(_) => {
                return (
                    vec![None; values.len()],
                    vec![None; values.len()],
                    vec![None; values.len()],
                )
            }
        };

    let mut macd_line = Vec::with_capacity(values.len());
    let mut signal_line = Vec::with_capacity(values.len());
    let mut histogram = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let out = indicator.next(value);
        let ready = i + 1 >= slow_period;
        macd_line.push(ready.then_some(out.macd));
        signal_line.push(ready.then_some(out.signal));
        histogram.push(ready.then_some(out.histogram));
    }

    (macd_line, signal_line, histogram)
}

// =============================================================================
// Volatility
// =============================================================================

/// Calculate Bollinger Bands
/// Returns (upper, middle, lower)
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BandOutput {
    if values.is_empty() || period == 0 {
        return (vec![], vec![], vec![]);
    }

    let mut indicator = match TaBB::new(period, num_std) {
        Ok(i) => i,
        Err(_) => {
            return (
                vec![None; values.len()],
                vec![None; values.len()],
                vec![None; values.len()],
            )
        }
    };

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let bb = indicator.next(value);
        let ready = i + 1 >= period;
        upper.push(ready.then_some(bb.upper));
        middle.push(ready.then_some(bb.average));
        lower.push(ready.then_some(bb.lower));
    }

    (upper, middle, lower)
}

// =============================================================================
// Channels (manual - not in ta crate as series helpers)
// =============================================================================

/// Highest value over the trailing window ending at each index
pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::max)
}

/// Lowest value over the trailing window ending at each index
pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::min)
}

fn rolling(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                values[i + 1 - period..=i].iter().copied().reduce(pick)
            }
        })
        .collect()
}

// =============================================================================
// Helpers
// =============================================================================

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Last computed value of a series
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Value `back` positions before the end of a series (0 = last)
pub fn value_back(series: &[Option<f64>], back: usize) -> Option<f64> {
    series
        .len()
        .checked_sub(back + 1)
        .and_then(|idx| series[idx])
}

/// Closing prices of a candle window
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Latest values of the chart indicators shown next to an analysis
pub fn snapshot(candles: &[Candle]) -> BTreeMap<String, f64> {
    let close = closes(candles);
    let mut out = BTreeMap::new();

    let mut put = |key: &str, value: Option<f64>| {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            out.insert(key.to_string(), v);
        }
    };

    put("sma_20", last_value(&sma(&close, 20)));
    put("sma_50", last_value(&sma(&close, 50)));
    put("ema_12", last_value(&ema(&close, 12)));
    put("ema_26", last_value(&ema(&close, 26)));
    put("rsi_14", last_value(&rsi(&close, 14)));

    let (macd_line, signal, hist) = macd(&close, 12, 26, 9);
    put("macd", last_value(&macd_line));
    put("macd_signal", last_value(&signal));
    put("macd_histogram", last_value(&hist));

    let (upper, middle, lower) = bollinger_bands(&close, 20, 2.0);
    put("bb_upper", last_value(&upper));
    put("bb_middle", last_value(&middle));
    put("bb_lower", last_value(&lower));

    out
}
