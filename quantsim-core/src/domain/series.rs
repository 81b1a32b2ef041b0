//! Series — an ordered sequence of f64 with optional cross-symbol alignment.
//!
//! A series either owns its storage or shares a column owned by a `Bars`
//! collection (both through `Arc`). A synchronized series maps aligned
//! indexes through its `Synchronizer` before touching storage; positions with
//! no source bar at the reference time read as NaN.
//!
//! NaN propagates through every element-wise operation, and any comparison
//! involving NaN is false.

use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::bar::Bars;

/// Errors from series construction and arithmetic.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("series index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("operation on series of unequal lengths ({left} vs {right})")]
    UnequalLength { left: usize, right: usize },

    #[error("operation on series synced to different synchronizers")]
    MismatchedSynchronizers,

    #[error("bars for '{0}' are already synchronized to a different reference")]
    AlreadySynchronized(String),
}

/// Mapping from aligned (reference) index to source index.
///
/// Built from two `Bars` collections on different calendars: for each
/// reference timestamp, the position of the latest source bar at or before
/// that timestamp, or `None` before the first source bar. The reference time
/// vector is held strongly so a synchronized series may outlive the `Bars`
/// it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronizer {
    ref_symbol: String,
    map: Vec<Option<usize>>,
    ref_times: Arc<Vec<NaiveDateTime>>,
}

impl Synchronizer {
    /// Build the alignment of `synced` onto the calendar of `reference`.
    pub fn create(reference: &Bars, synced: &Bars) -> Arc<Self> {
        let ref_times = reference.times();
        let mut map = Vec::with_capacity(ref_times.len());
        let mut src = 0usize;
        for &t in ref_times.iter() {
            while src < synced.len() && synced.raw_time(src) <= t {
                src += 1;
            }
            map.push(if src == 0 { None } else { Some(src - 1) });
        }
        Arc::new(Self {
            ref_symbol: reference.symbol().to_string(),
            map,
            ref_times,
        })
    }

    /// Number of aligned (reference) positions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Source index for aligned index `i`, or `None` if no source bar exists
    /// at or before the reference time.
    pub fn source_index(&self, i: usize) -> Option<usize> {
        self.map.get(i).copied().flatten()
    }

    /// True if the mapping is anything other than the identity.
    pub fn modified(&self) -> bool {
        self.map
            .iter()
            .enumerate()
            .any(|(i, &m)| m != Some(i))
    }

    pub fn ref_symbol(&self) -> &str {
        &self.ref_symbol
    }

    /// The reference calendar this synchronizer aligns to.
    pub fn ref_times(&self) -> &Arc<Vec<NaiveDateTime>> {
        &self.ref_times
    }
}

/// An ordered sequence of f64, optionally synchronized to another symbol's
/// calendar.
#[derive(Debug, Clone)]
pub struct Series {
    values: Arc<Vec<f64>>,
    synchronizer: Option<Arc<Synchronizer>>,
}

impl Series {
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self {
            values: Arc::new(values),
            synchronizer: None,
        }
    }

    /// Wrap a shared column (typically owned by a `Bars`) without copying.
    pub fn from_shared(values: Arc<Vec<f64>>, synchronizer: Option<Arc<Synchronizer>>) -> Self {
        Self {
            values,
            synchronizer,
        }
    }

    /// Effective length: the reference calendar's length when synchronized,
    /// otherwise the storage length.
    pub fn len(&self) -> usize {
        match &self.synchronizer {
            Some(s) => s.len(),
            None => self.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn synchronizer(&self) -> Option<&Arc<Synchronizer>> {
        self.synchronizer.as_ref()
    }

    /// Value at `i` in aligned space. NaN when synchronized and no source bar
    /// exists at the reference time.
    ///
    /// Panics if `i >= len()`; use [`Series::get`] for a checked read.
    pub fn at(&self, i: usize) -> f64 {
        match &self.synchronizer {
            Some(s) => {
                assert!(i < s.len(), "series index {i} out of range");
                match s.source_index(i) {
                    Some(j) => self.values[j],
                    None => f64::NAN,
                }
            }
            None => self.values[i],
        }
    }

    /// Checked value access.
    pub fn get(&self, i: usize) -> Result<f64, SeriesError> {
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        Ok(self.at(i))
    }

    /// Materialize the aligned values into a plain vector.
    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.at(i)).collect()
    }

    fn check_compatible(&self, other: &Series) -> Result<(), SeriesError> {
        match (&self.synchronizer, &other.synchronizer) {
            (Some(a), Some(b)) => {
                if !Arc::ptr_eq(a, b) && **a != **b {
                    return Err(SeriesError::MismatchedSynchronizers);
                }
            }
            _ => {
                if self.len() != other.len() {
                    return Err(SeriesError::UnequalLength {
                        left: self.len(),
                        right: other.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn zip_with(
        &self,
        other: &Series,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Series, SeriesError> {
        self.check_compatible(other)?;
        let n = self.len().min(other.len());
        let values = (0..n).map(|i| f(self.at(i), other.at(i))).collect();
        Ok(Series::from_vec(values))
    }

    pub fn add(&self, other: &Series) -> Result<Series, SeriesError> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Series) -> Result<Series, SeriesError> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Series) -> Result<Series, SeriesError> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Series) -> Result<Series, SeriesError> {
        self.zip_with(other, |a, b| a / b)
    }

    // ── Reference inspectors ────────────────────────────────────────────
    //
    // All look at [i] and [i-1] (and [i-2] for turns); any NaN involved
    // makes the answer false.

    /// True if `self` closes above `other` at `i` having been at or below it
    /// at `i-1`.
    pub fn crosses_over(&self, other: &Series, i: usize) -> Result<bool, SeriesError> {
        self.check_compatible(other)?;
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i == 0 {
            return Ok(false);
        }
        let (a0, a1) = (self.at(i - 1), self.at(i));
        let (b0, b1) = (other.at(i - 1), other.at(i));
        Ok(a0 <= b0 && a1 > b1)
    }

    pub fn crosses_under(&self, other: &Series, i: usize) -> Result<bool, SeriesError> {
        self.check_compatible(other)?;
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i == 0 {
            return Ok(false);
        }
        let (a0, a1) = (self.at(i - 1), self.at(i));
        let (b0, b1) = (other.at(i - 1), other.at(i));
        Ok(a0 >= b0 && a1 < b1)
    }

    /// True if the series crosses above a constant level at `i`.
    pub fn crosses_above(&self, level: f64, i: usize) -> Result<bool, SeriesError> {
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i == 0 {
            return Ok(false);
        }
        Ok(self.at(i - 1) <= level && self.at(i) > level)
    }

    pub fn crosses_below(&self, level: f64, i: usize) -> Result<bool, SeriesError> {
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i == 0 {
            return Ok(false);
        }
        Ok(self.at(i - 1) >= level && self.at(i) < level)
    }

    /// True if the series was falling into `i-1` and rises at `i`.
    pub fn turns_up(&self, i: usize) -> Result<bool, SeriesError> {
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i < 2 {
            return Ok(false);
        }
        Ok(self.at(i - 2) > self.at(i - 1) && self.at(i) > self.at(i - 1))
    }

    pub fn turns_down(&self, i: usize) -> Result<bool, SeriesError> {
        if i >= self.len() {
            return Err(SeriesError::IndexOutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if i < 2 {
            return Ok(false);
        }
        Ok(self.at(i - 2) < self.at(i - 1) && self.at(i) < self.at(i - 1))
    }
}

// Scalar arithmetic is infallible and keeps alignment out of the picture:
// the result is an owned series in the same aligned space.

impl Add<f64> for &Series {
    type Output = Series;
    fn add(self, rhs: f64) -> Series {
        Series::from_vec((0..self.len()).map(|i| self.at(i) + rhs).collect())
    }
}

impl Sub<f64> for &Series {
    type Output = Series;
    fn sub(self, rhs: f64) -> Series {
        Series::from_vec((0..self.len()).map(|i| self.at(i) - rhs).collect())
    }
}

impl Mul<f64> for &Series {
    type Output = Series;
    fn mul(self, rhs: f64) -> Series {
        Series::from_vec((0..self.len()).map(|i| self.at(i) * rhs).collect())
    }
}

impl Div<f64> for &Series {
    type Output = Series;
    fn div(self, rhs: f64) -> Series {
        Series::from_vec((0..self.len()).map(|i| self.at(i) / rhs).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::tests_support::bars_with_times;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn scalar_ops() {
        let s = Series::from_vec(vec![1.0, 2.0, 3.0]);
        let t = &s * 2.0;
        assert_eq!(t.to_vec(), vec![2.0, 4.0, 6.0]);
        let u = &s + 1.0;
        assert_eq!(u.to_vec(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn series_ops_require_equal_length() {
        let a = Series::from_vec(vec![1.0, 2.0]);
        let b = Series::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            a.add(&b),
            Err(SeriesError::UnequalLength { left: 2, right: 3 })
        ));
    }

    #[test]
    fn nan_propagates() {
        let a = Series::from_vec(vec![1.0, f64::NAN]);
        let b = Series::from_vec(vec![2.0, 2.0]);
        let c = a.add(&b).unwrap();
        assert_eq!(c.at(0), 3.0);
        assert!(c.at(1).is_nan());
    }

    #[test]
    fn crosses_over_basic() {
        let a = Series::from_vec(vec![1.0, 3.0]);
        let b = Series::from_vec(vec![2.0, 2.0]);
        assert!(a.crosses_over(&b, 1).unwrap());
        assert!(!b.crosses_over(&a, 1).unwrap());
        assert!(!a.crosses_over(&b, 0).unwrap());
    }

    #[test]
    fn crosses_with_nan_is_false() {
        let a = Series::from_vec(vec![f64::NAN, 3.0]);
        let b = Series::from_vec(vec![2.0, 2.0]);
        assert!(!a.crosses_over(&b, 1).unwrap());
    }

    #[test]
    fn turns_up_and_down() {
        let s = Series::from_vec(vec![3.0, 1.0, 2.0, 3.0]);
        assert!(s.turns_up(2).unwrap());
        assert!(!s.turns_up(3).unwrap());
        let t = Series::from_vec(vec![1.0, 3.0, 2.0]);
        assert!(t.turns_down(2).unwrap());
    }

    #[test]
    fn synchronizer_maps_missing_bars_to_nan() {
        // Reference trades on days 1..=4; synced symbol misses day 2.
        let reference = bars_with_times("REF", &[dt(1, 16), dt(2, 16), dt(3, 16), dt(4, 16)]);
        let synced = bars_with_times("SYN", &[dt(1, 16), dt(3, 16), dt(4, 16)]);

        let sync = Synchronizer::create(&reference, &synced);
        assert_eq!(sync.len(), 4);
        assert_eq!(sync.source_index(0), Some(0));
        // Day 2: latest synced bar at or before is day 1.
        assert_eq!(sync.source_index(1), Some(0));
        assert_eq!(sync.source_index(2), Some(1));
        assert_eq!(sync.source_index(3), Some(2));
        assert!(sync.modified());

        let closes = Series::from_shared(synced.close_column(), Some(sync));
        assert_eq!(closes.len(), 4);
        assert_eq!(closes.at(1), closes.at(0));
    }

    #[test]
    fn synchronizer_before_first_source_bar() {
        let reference = bars_with_times("REF", &[dt(1, 16), dt(2, 16)]);
        let synced = bars_with_times("SYN", &[dt(2, 16)]);
        let sync = Synchronizer::create(&reference, &synced);
        assert_eq!(sync.source_index(0), None);
        let closes = Series::from_shared(synced.close_column(), Some(sync));
        assert!(closes.at(0).is_nan());
    }

    #[test]
    fn mismatched_synchronizers_rejected() {
        let ref_a = bars_with_times("A", &[dt(1, 16), dt(2, 16)]);
        let ref_b = bars_with_times("B", &[dt(1, 16), dt(3, 16)]);
        let synced = bars_with_times("SYN", &[dt(1, 16), dt(2, 16)]);

        let sa = Synchronizer::create(&ref_a, &synced);
        let sb = Synchronizer::create(&ref_b, &synced);
        let left = Series::from_shared(synced.close_column(), Some(sa));
        let right = Series::from_shared(synced.close_column(), Some(sb));
        assert!(matches!(
            left.add(&right),
            Err(SeriesError::MismatchedSynchronizers)
        ));
    }
}
