//! Oscillators: RSI, MACD, rate of change, momentum.

use crate::domain::Series;
use crate::indicators::moving::ema;

/// Wilder's Relative Strength Index.
///
/// First valid value at index `period`. A NaN input resets the smoothing.
pub fn rsi(series: &Series, period: usize) -> Series {
    assert!(period >= 1, "RSI period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];

    let mut avg_gain: Option<f64> = None;
    let mut avg_loss: Option<f64> = None;
    let mut seed_gain = 0.0;
    let mut seed_loss = 0.0;
    let mut seed_count = 0usize;

    for i in 1..n {
        let prev = series.at(i - 1);
        let cur = series.at(i);
        if prev.is_nan() || cur.is_nan() {
            avg_gain = None;
            avg_loss = None;
            seed_gain = 0.0;
            seed_loss = 0.0;
            seed_count = 0;
            continue;
        }
        let delta = cur - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        match (avg_gain, avg_loss) {
            (Some(g), Some(l)) => {
                let g = (g * (period as f64 - 1.0) + gain) / period as f64;
                let l = (l * (period as f64 - 1.0) + loss) / period as f64;
                avg_gain = Some(g);
                avg_loss = Some(l);
                out[i] = rsi_value(g, l);
            }
            _ => {
                seed_gain += gain;
                seed_loss += loss;
                seed_count += 1;
                if seed_count == period {
                    let g = seed_gain / period as f64;
                    let l = seed_loss / period as f64;
                    avg_gain = Some(g);
                    avg_loss = Some(l);
                    out[i] = rsi_value(g, l);
                    seed_gain = 0.0;
                    seed_loss = 0.0;
                    seed_count = 0;
                }
            }
        }
    }
    Series::from_vec(out)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// MACD line: EMA(fast) − EMA(slow).
pub fn macd(series: &Series, fast: usize, slow: usize) -> Series {
    let f = ema(series, fast);
    let s = ema(series, slow);
    // Same length by construction; sub cannot fail.
    f.sub(&s).unwrap_or_else(|_| {
        Series::from_vec(vec![f64::NAN; series.len()])
    })
}

/// MACD signal line: EMA(signal) of the MACD line.
pub fn macd_signal(series: &Series, fast: usize, slow: usize, signal: usize) -> Series {
    ema(&macd(series, fast, slow), signal)
}

/// MACD histogram: MACD − signal.
pub fn macd_histogram(series: &Series, fast: usize, slow: usize, signal: usize) -> Series {
    let line = macd(series, fast, slow);
    let sig = ema(&line, signal);
    line.sub(&sig)
        .unwrap_or_else(|_| Series::from_vec(vec![f64::NAN; series.len()]))
}

/// Rate of change over `period`, in percent.
pub fn roc(series: &Series, period: usize) -> Series {
    assert!(period >= 1, "ROC period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];
    for i in period..n {
        let base = series.at(i - period);
        let cur = series.at(i);
        if base.is_nan() || cur.is_nan() || base == 0.0 {
            continue;
        }
        out[i] = (cur / base - 1.0) * 100.0;
    }
    Series::from_vec(out)
}

/// Price difference over `period`.
pub fn momentum(series: &Series, period: usize) -> Series {
    assert!(period >= 1, "momentum period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];
    for i in period..n {
        out[i] = series.at(i) - series.at(i - period);
    }
    Series::from_vec(out)
}
