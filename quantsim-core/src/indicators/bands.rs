//! Rolling extremes, deviation, and Bollinger bands.

use crate::domain::Series;
use crate::indicators::moving::sma;

/// Rolling population standard deviation over `period`.
pub fn std_dev(series: &Series, period: usize) -> Series {
    assert!(period >= 1, "stddev period must be >= 1");
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
        if nan {
            continue;
        }
        let mean = sum / period as f64;
        let var = ((i + 1 - period)..=i)
            .map(|j| {
                let d = series.at(j) - mean;
                d * d
            })
            .sum::<f64>()
            / period as f64;
        out[i] = var.sqrt();
    }
    Series::from_vec(out)
}

/// Bollinger middle band (SMA).
pub fn bollinger_middle(series: &Series, period: usize) -> Series {
    sma(series, period)
}

/// Bollinger upper band: SMA + `mult` standard deviations.
pub fn bollinger_upper(series: &Series, period: usize, mult: f64) -> Series {
    let mid = sma(series, period);
    let sd = std_dev(series, period);
    let n = series.len();
    Series::from_vec((0..n).map(|i| mid.at(i) + mult * sd.at(i)).collect())
}

/// Bollinger lower band: SMA − `mult` standard deviations.
pub fn bollinger_lower(series: &Series, period: usize, mult: f64) -> Series {
    let mid = sma(series, period);
    let sd = std_dev(series, period);
    let n = series.len();
    Series::from_vec((0..n).map(|i| mid.at(i) - mult * sd.at(i)).collect())
}

/// Rolling maximum over `period`.
pub fn highest(series: &Series, period: usize) -> Series {
    rolling_extreme(series, period, f64::max)
}

/// Rolling minimum over `period`.
pub fn lowest(series: &Series, period: usize) -> Series {
    rolling_extreme(series, period, f64::min)
}

fn rolling_extreme(series: &Series, period: usize, pick: fn(f64, f64) -> f64) -> Series {
    assert!(period >= 1, "extreme period must be >= 1");
    let n = series.len();
    let mut out = vec![f64::NAN; n];
    if n < period {
        return Series::from_vec(out);
    }
    for i in (period - 1)..n {
        let mut acc: Option<f64> = None;
        let mut nan = false;
        for j in (i + 1 - period)..=i {
            let v = series.at(j);
            if v.is_nan() {
                nan = true;
                break;
            }
            acc = Some(match acc {
                Some(a) => pick(a, v),
                None => v,
            });
        }
        if let (false, Some(v)) = (nan, acc) {
            out[i] = v;
        }
    }
    Series::from_vec(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests_support::{assert_approx, series, DEFAULT_EPSILON};

    #[test]
    fn std_dev_constant_is_zero() {
        let s = series(&[5.0, 5.0, 5.0, 5.0]);
        let result = std_dev(&s, 3);
        assert!(result.at(1).is_nan());
        assert_approx(result.at(2), 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn std_dev_known_window() {
        let s = series(&[2.0, 4.0, 6.0]);
        // mean 4, var = (4+0+4)/3
        let result = std_dev(&s, 3);
        assert_approx(result.at(2), (8.0f64 / 3.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_bracket_sma() {
        let s = series(&[10.0, 12.0, 11.0, 13.0, 12.0]);
        let mid = bollinger_middle(&s, 3);
        let up = bollinger_upper(&s, 3, 2.0);
        let lo = bollinger_lower(&s, 3, 2.0);
        for i in 2..5 {
            assert!(up.at(i) >= mid.at(i));
            assert!(lo.at(i) <= mid.at(i));
        }
    }

    #[test]
    fn highest_lowest() {
        let s = series(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        let hi = highest(&s, 3);
        let lo = lowest(&s, 3);
        assert_approx(hi.at(2), 4.0, DEFAULT_EPSILON);
        assert_approx(hi.at(4), 5.0, DEFAULT_EPSILON);
        assert_approx(lo.at(2), 1.0, DEFAULT_EPSILON);
        assert_approx(lo.at(3), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn extremes_nan_window() {
        let s = series(&[3.0, f64::NAN, 4.0]);
        let hi = highest(&s, 2);
        assert!(hi.at(1).is_nan());
        assert!(hi.at(2).is_nan());
    }
}
