//! Drawdown curve and the Ulcer index.
//!
//! Walks an equity array tracking the last peak: each point is either a new
//! peak (drawdown 0, day counter resets) or a retracement, recorded in
//! absolute and percent terms. Running maxima keep the deepest drawdown, the
//! deepest percent drawdown (with dates), and the longest time under water.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Drawdown series derived from one side of an equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownCurve {
    dd: Vec<f64>,
    dd_pct: Vec<f64>,
    dd_days: Vec<u32>,
    max_drawdown: f64,
    max_drawdown_date: Option<NaiveDate>,
    max_drawdown_pct: f64,
    max_drawdown_pct_date: Option<NaiveDate>,
    max_drawdown_days: u32,
    retracement_sq_sum: f64,
    retracement_count: u64,
}

impl DrawdownCurve {
    /// Build from matching date/value arrays.
    pub fn from_values(dates: &[NaiveDate], values: &[f64]) -> Self {
        let mut curve = Self {
            dd: Vec::with_capacity(values.len()),
            dd_pct: Vec::with_capacity(values.len()),
            dd_days: Vec::with_capacity(values.len()),
            max_drawdown: 0.0,
            max_drawdown_date: None,
            max_drawdown_pct: 0.0,
            max_drawdown_pct_date: None,
            max_drawdown_days: 0,
            retracement_sq_sum: 0.0,
            retracement_count: 0,
        };

        let mut last_peak = f64::MIN;
        let mut days = 0u32;

        for (i, &value) in values.iter().enumerate() {
            let date = dates.get(i).copied();
            if value >= last_peak {
                last_peak = value;
                days = 0;
                curve.dd.push(0.0);
                curve.dd_pct.push(0.0);
                curve.dd_days.push(0);
            } else {
                let dd = value - last_peak;
                let dd_pct = if last_peak == 0.0 {
                    0.0
                } else {
                    dd / last_peak * 100.0
                };

                if dd < curve.max_drawdown {
                    curve.max_drawdown = dd;
                    curve.max_drawdown_date = date;
                }
                if dd_pct < curve.max_drawdown_pct {
                    curve.max_drawdown_pct = dd_pct;
                    curve.max_drawdown_pct_date = date;
                }
                if days > curve.max_drawdown_days {
                    curve.max_drawdown_days = days;
                }

                curve.dd.push(dd);
                curve.dd_pct.push(dd_pct);
                curve.dd_days.push(days);

                let retracement = dd / last_peak;
                curve.retracement_sq_sum += retracement * retracement;
                curve.retracement_count += 1;

                days += 1;
            }
        }
        curve
    }

    pub fn drawdown(&self) -> &[f64] {
        &self.dd
    }

    pub fn drawdown_pct(&self) -> &[f64] {
        &self.dd_pct
    }

    pub fn days_in_drawdown(&self) -> &[u32] {
        &self.dd_days
    }

    /// Deepest drawdown (most negative), 0 if equity never retraced.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn max_drawdown_date(&self) -> Option<NaiveDate> {
        self.max_drawdown_date
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown_pct
    }

    pub fn max_drawdown_pct_date(&self) -> Option<NaiveDate> {
        self.max_drawdown_pct_date
    }

    /// Longest run of consecutive non-peak days.
    pub fn max_drawdown_days(&self) -> u32 {
        self.max_drawdown_days
    }

    /// Root-mean-square retracement over non-peak points, ×100.
    pub fn ulcer_index(&self) -> f64 {
        if self.retracement_count == 0 {
            0.0
        } else {
            (self.retracement_sq_sum / self.retracement_count as f64).sqrt() * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect()
    }

    #[test]
    fn monotone_rise_has_no_drawdown() {
        let values: Vec<f64> = (0..10).map(|i| 10_000.0 + i as f64 * 100.0).collect();
        let curve = DrawdownCurve::from_values(&dates(10), &values);
        assert!(curve.drawdown().iter().all(|&d| d == 0.0));
        assert_eq!(curve.max_drawdown(), 0.0);
        assert_eq!(curve.ulcer_index(), 0.0);
        assert_eq!(curve.max_drawdown_days(), 0);
    }

    #[test]
    fn known_drawdown() {
        let values = vec![10_000.0, 11_000.0, 9_000.0, 9_500.0, 11_500.0];
        let curve = DrawdownCurve::from_values(&dates(5), &values);
        assert_eq!(curve.max_drawdown(), -2_000.0);
        assert_eq!(
            curve.max_drawdown_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        let expected_pct = -2_000.0 / 11_000.0 * 100.0;
        assert!((curve.max_drawdown_pct() - expected_pct).abs() < 1e-9);
        // Points 2 and 3 are under water; point 4 is a new peak.
        assert_eq!(curve.drawdown()[3], -1_500.0);
        assert_eq!(curve.drawdown()[4], 0.0);
    }

    #[test]
    fn days_in_drawdown_counts_up() {
        let values = vec![100.0, 90.0, 80.0, 85.0, 110.0];
        let curve = DrawdownCurve::from_values(&dates(5), &values);
        assert_eq!(curve.days_in_drawdown(), &[0, 0, 1, 2, 0]);
        assert_eq!(curve.max_drawdown_days(), 2);
    }

    #[test]
    fn ulcer_index_known_value() {
        let values = vec![100.0, 90.0];
        let curve = DrawdownCurve::from_values(&dates(2), &values);
        // Single retracement of 10% → sqrt(0.01/1)*100 = 10.
        assert!((curve.ulcer_index() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn flat_curve_first_point_is_peak() {
        let values = vec![100.0, 100.0, 100.0];
        let curve = DrawdownCurve::from_values(&dates(3), &values);
        assert!(curve.drawdown().iter().all(|&d| d == 0.0));
    }
}
