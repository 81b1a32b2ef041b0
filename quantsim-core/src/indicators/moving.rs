//! Moving averages: simple, exponential, Wilder-smoothed.

use crate::domain::Series;

/// Simple moving average over `period` values.
///
/// First valid value at index `period - 1`.
pub fn sma(series: &Series, period: usize) -> Series {
    assert!(period >= 1, "SMA period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];
    if n < period {
        return Series::from_vec(out);
    }

    for i in (period - 1)..n {
        let mut sum = 0.0;
        let mut nan = false;
        for j in (i + 1 - period)..=i {
            let v = series.at(j);
            if v.is_nan() {
                nan = true;
                break;
            }
            sum += v;
        }
        if !nan {
            out[i] = sum / period as f64;
        }
    }
    Series::from_vec(out)
}

/// Exponential moving average, seeded with the SMA of the first clean
/// `period` values. A NaN input resets the state and re-seeds.
pub fn ema(series: &Series, period: usize) -> Series {
    smoothed(series, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder's smoothing (EMA with alpha = 1/period); used by RSI and ATR-style
/// indicators.
pub fn wilder_smooth(series: &Series, period: usize) -> Series {
    smoothed(series, period, 1.0 / period as f64)
}

fn smoothed(series: &Series, period: usize, alpha: f64) -> Series {
    assert!(period >= 1, "smoothing period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];

    let mut prev: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;

    for i in 0..n {
        let v = series.at(i);
        if v.is_nan() {
            prev = None;
            seed_sum = 0.0;
            seed_count = 0;
            continue;
        }
        match prev {
            Some(p) => {
                let next = alpha * v + (1.0 - alpha) * p;
                out[i] = next;
                prev = Some(next);
            }
            None => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    out[i] = seed;
                    prev = Some(seed);
                    seed_sum = 0.0;
                    seed_count = 0;
                }
            }
        }
    }
    Series::from_vec(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests_support::{assert_approx, series, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let s = series(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = sma(&s, 5);
        assert_eq!(result.len(), 7);
        for i in 0..4 {
            assert!(result.at(i).is_nan(), "expected NaN at index {i}");
        }
        assert_approx(result.at(4), 12.0, DEFAULT_EPSILON);
        assert_approx(result.at(5), 13.0, DEFAULT_EPSILON);
        assert_approx(result.at(6), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_identity() {
        let s = series(&[100.0, 200.0, 300.0]);
        let result = sma(&s, 1);
        assert_approx(result.at(0), 100.0, DEFAULT_EPSILON);
        assert_approx(result.at(2), 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_propagation() {
        let s = series(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0]);
        let result = sma(&s, 3);
        assert!(result.at(2).is_nan());
        assert!(result.at(3).is_nan());
        assert!(result.at(4).is_nan());
        assert_approx(result.at(5), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_bars() {
        let s = series(&[10.0, 11.0]);
        let result = sma(&s, 5);
        assert!((0..2).all(|i| result.at(i).is_nan()));
    }

    #[test]
    fn ema_seeds_with_sma() {
        let s = series(&[10.0, 12.0, 14.0, 16.0]);
        let result = ema(&s, 3);
        assert!(result.at(0).is_nan());
        assert!(result.at(1).is_nan());
        // Seed = mean(10,12,14) = 12; alpha = 0.5
        assert_approx(result.at(2), 12.0, DEFAULT_EPSILON);
        assert_approx(result.at(3), 0.5 * 16.0 + 0.5 * 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_reseeds_after_nan() {
        let s = series(&[10.0, 12.0, 14.0, f64::NAN, 20.0, 22.0, 24.0]);
        let result = ema(&s, 3);
        assert!(result.at(3).is_nan());
        assert!(result.at(4).is_nan());
        assert!(result.at(5).is_nan());
        // Re-seeded with mean(20,22,24).
        assert_approx(result.at(6), 22.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_alpha_differs_from_ema() {
        let s = series(&[10.0, 10.0, 10.0, 20.0]);
        let e = ema(&s, 3);
        let w = wilder_smooth(&s, 3);
        // EMA moves faster (alpha 0.5 vs 1/3).
        assert!(e.at(3) > w.at(3));
        assert_approx(w.at(3), 10.0 + (20.0 - 10.0) / 3.0, DEFAULT_EPSILON);
    }
}
