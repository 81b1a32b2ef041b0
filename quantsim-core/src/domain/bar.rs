//! Bar and Bars — the fundamental market data units.
//!
//! `Bars` stores a symbol's history as shared columns so that series views
//! (`open_series()` etc.) reference the same storage without copying.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::data::DataError;
use crate::domain::series::{Series, SeriesError, Synchronizer};

/// One time-indexed OHLCV record for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_interest: f64,
    /// Opaque per-bar payload carried through from the data source.
    pub extra: Option<String>,
}

impl Bar {
    /// OHLCV sanity check: low ≤ open, close ≤ high, volume ≥ 0, all finite.
    ///
    /// Returns a human-readable description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(format!("{name} is not finite at {}", self.time));
            }
        }
        if self.low > self.open || self.low > self.close {
            return Err(format!(
                "low {} above open/close at {}",
                self.low, self.time
            ));
        }
        if self.high < self.open || self.high < self.close {
            return Err(format!(
                "high {} below open/close at {}",
                self.high, self.time
            ));
        }
        if self.volume < 0.0 {
            return Err(format!("negative volume {} at {}", self.volume, self.time));
        }
        Ok(())
    }
}

/// How bar-integrity violations are treated when a `Bars` is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingMode {
    /// Reject the whole collection on the first bad bar.
    #[default]
    Fatal,
    /// Accept, collecting a message per bad bar.
    Warning,
    /// Accept silently.
    Ignore,
}

/// A symbol-tagged ordered sequence of bars, stored column-wise.
#[derive(Debug, Clone)]
pub struct Bars {
    symbol: String,
    times: Arc<Vec<NaiveDateTime>>,
    open: Arc<Vec<f64>>,
    high: Arc<Vec<f64>>,
    low: Arc<Vec<f64>>,
    close: Arc<Vec<f64>>,
    volume: Arc<Vec<f64>>,
    open_interest: Arc<Vec<f64>>,
    extra: Arc<Vec<Option<String>>>,
    synchronizer: Option<Arc<Synchronizer>>,
    quality_warnings: Vec<String>,
}

impl Bars {
    /// Build a collection from row bars, validating per `mode`.
    pub fn new(
        symbol: impl Into<String>,
        bars: Vec<Bar>,
        mode: ErrorHandlingMode,
    ) -> Result<Self, DataError> {
        let symbol = symbol.into();
        let mut warnings = Vec::new();
        for (index, bar) in bars.iter().enumerate() {
            if let Err(reason) = bar.validate() {
                match mode {
                    ErrorHandlingMode::Fatal => {
                        return Err(DataError::InvalidBar {
                            symbol,
                            index,
                            reason,
                        })
                    }
                    ErrorHandlingMode::Warning => {
                        warnings.push(format!("{symbol} bar {index}: {reason}"));
                    }
                    ErrorHandlingMode::Ignore => {}
                }
            }
        }

        let n = bars.len();
        let mut times = Vec::with_capacity(n);
        let mut open = Vec::with_capacity(n);
        let mut high = Vec::with_capacity(n);
        let mut low = Vec::with_capacity(n);
        let mut close = Vec::with_capacity(n);
        let mut volume = Vec::with_capacity(n);
        let mut open_interest = Vec::with_capacity(n);
        let mut extra = Vec::with_capacity(n);
        for bar in bars {
            times.push(bar.time);
            open.push(bar.open);
            high.push(bar.high);
            low.push(bar.low);
            close.push(bar.close);
            volume.push(bar.volume);
            open_interest.push(bar.open_interest);
            extra.push(bar.extra);
        }

        Ok(Self {
            symbol,
            times: Arc::new(times),
            open: Arc::new(open),
            high: Arc::new(high),
            low: Arc::new(low),
            close: Arc::new(close),
            volume: Arc::new(volume),
            open_interest: Arc::new(open_interest),
            extra: Arc::new(extra),
            synchronizer: None,
            quality_warnings: warnings,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Messages collected under `ErrorHandlingMode::Warning`.
    pub fn quality_warnings(&self) -> &[String] {
        &self.quality_warnings
    }

    /// Synchronize this collection onto another symbol's calendar.
    ///
    /// A collection may be synchronized to at most one reference; attaching a
    /// second, different reference is an error.
    pub fn set_synchronizer(&mut self, sync: Arc<Synchronizer>) -> Result<(), SeriesError> {
        if let Some(existing) = &self.synchronizer {
            if !Arc::ptr_eq(existing, &sync) && **existing != *sync {
                return Err(SeriesError::AlreadySynchronized(self.symbol.clone()));
            }
        }
        self.synchronizer = Some(sync);
        Ok(())
    }

    pub fn synchronizer(&self) -> Option<&Arc<Synchronizer>> {
        self.synchronizer.as_ref()
    }

    fn check_index(&self, bar: usize) -> Result<(), DataError> {
        if bar >= self.len() {
            return Err(DataError::BarIndexOutOfRange {
                symbol: self.symbol.clone(),
                index: bar,
                len: self.len(),
            });
        }
        Ok(())
    }

    // ── O(1) scalar accessors ───────────────────────────────────────────

    pub fn time(&self, bar: usize) -> Result<NaiveDateTime, DataError> {
        self.check_index(bar)?;
        Ok(self.times[bar])
    }

    pub fn date(&self, bar: usize) -> Result<NaiveDate, DataError> {
        Ok(self.time(bar)?.date())
    }

    pub fn open(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.open[bar])
    }

    pub fn high(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.high[bar])
    }

    pub fn low(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.low[bar])
    }

    pub fn close(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.close[bar])
    }

    pub fn volume(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.volume[bar])
    }

    pub fn open_interest(&self, bar: usize) -> Result<f64, DataError> {
        self.check_index(bar)?;
        Ok(self.open_interest[bar])
    }

    pub fn extra(&self, bar: usize) -> Result<Option<&str>, DataError> {
        self.check_index(bar)?;
        Ok(self.extra[bar].as_deref())
    }

    /// Assemble a row view of bar `bar`.
    pub fn bar(&self, bar: usize) -> Result<Bar, DataError> {
        self.check_index(bar)?;
        Ok(Bar {
            time: self.times[bar],
            open: self.open[bar],
            high: self.high[bar],
            low: self.low[bar],
            close: self.close[bar],
            volume: self.volume[bar],
            open_interest: self.open_interest[bar],
            extra: self.extra[bar].clone(),
        })
    }

    /// Timestamp without the bounds check; callers must hold `bar < len()`.
    pub(crate) fn raw_time(&self, bar: usize) -> NaiveDateTime {
        self.times[bar]
    }

    /// Shared handle to the time column.
    pub fn times(&self) -> Arc<Vec<NaiveDateTime>> {
        Arc::clone(&self.times)
    }

    // ── Series views (zero-copy) ────────────────────────────────────────

    pub fn open_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.open), self.synchronizer.clone())
    }

    pub fn high_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.high), self.synchronizer.clone())
    }

    pub fn low_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.low), self.synchronizer.clone())
    }

    pub fn close_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.close), self.synchronizer.clone())
    }

    pub fn volume_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.volume), self.synchronizer.clone())
    }

    pub fn open_interest_series(&self) -> Series {
        Series::from_shared(Arc::clone(&self.open_interest), self.synchronizer.clone())
    }

    /// Shared handle to the close column (unsynchronized).
    pub fn close_column(&self) -> Arc<Vec<f64>> {
        Arc::clone(&self.close)
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Bars with the given timestamps and synthetic prices 100, 101, ...
    pub(crate) fn bars_with_times(symbol: &str, times: &[NaiveDateTime]) -> Bars {
        let bars = times
            .iter()
            .enumerate()
            .map(|(i, &time)| {
                let px = 100.0 + i as f64;
                Bar {
                    time,
                    open: px,
                    high: px + 1.0,
                    low: px - 1.0,
                    close: px + 0.5,
                    volume: 1000.0,
                    open_interest: 0.0,
                    extra: None,
                }
            })
            .collect();
        Bars::new(symbol, bars, ErrorHandlingMode::Fatal).unwrap()
    }
}
