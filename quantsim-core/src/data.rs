//! Data provider and symbols-source abstractions.
//!
//! The engine consumes `Bars` from a provider and symbols from an iterator;
//! file formats, caches, and networks live behind these traits, outside the
//! core. Providers must be deterministic: within a session the same
//! `(symbol, range)` returns identical bars.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::Bars;
use crate::params::DateTimeRange;

/// Structured errors for data access and bar integrity.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for symbol '{symbol}' in the requested range")]
    NoData { symbol: String },

    #[error("bad bar for {symbol} at index {index}: {reason}")]
    InvalidBar {
        symbol: String,
        index: usize,
        reason: String,
    },

    #[error("bar index {index} out of range for {symbol} ({len} bars)")]
    BarIndexOutOfRange {
        symbol: String,
        index: usize,
        len: usize,
    },

    #[error("data provider unusable: {0}")]
    ProviderUnusable(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of historical bars.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for a symbol, optionally restricted to a time range.
    fn get_data(
        &self,
        symbol: &str,
        range: Option<&DateTimeRange>,
    ) -> Result<Arc<Bars>, DataError>;
}

/// Thread-safe forward iterator over a symbol list.
///
/// `next()` hands each symbol to exactly one caller; concurrent workers pull
/// without replaying. `reset()` rewinds for another scheduler pass.
#[derive(Debug)]
pub struct SymbolsIterator {
    symbols: Arc<Vec<String>>,
    cursor: AtomicUsize,
}

impl SymbolsIterator {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols: Arc::new(symbols),
            cursor: AtomicUsize::new(0),
        }
    }

    /// The first symbol, without consuming anything.
    pub fn first(&self) -> Option<&str> {
        self.symbols.first().map(String::as_str)
    }

    /// Claim the next symbol. Each symbol is returned to exactly one caller.
    pub fn next(&self) -> Option<&str> {
        let ix = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.symbols.get(ix).map(String::as_str)
    }

    pub fn has_more(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) < self.symbols.len()
    }

    /// Rewind for another pass.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// A detached copy of the underlying list (for strategy contexts).
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.as_ref().clone()
    }

    /// Position of a symbol in the list; drives deterministic id blocks.
    pub fn ordinal(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterator_hands_out_each_symbol_once() {
        let it = SymbolsIterator::new(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(it.first(), Some("A"));
        assert_eq!(it.next(), Some("A"));
        assert_eq!(it.next(), Some("B"));
        assert!(it.has_more());
        assert_eq!(it.next(), Some("C"));
        assert_eq!(it.next(), None);
        assert!(!it.has_more());
    }

    #[test]
    fn reset_rewinds() {
        let it = SymbolsIterator::new(vec!["A".into()]);
        assert_eq!(it.next(), Some("A"));
        it.reset();
        assert_eq!(it.next(), Some("A"));
    }

    #[test]
    fn concurrent_pull_never_replays() {
        use std::collections::HashSet;
        use std::sync::Mutex;

        let symbols: Vec<String> = (0..64).map(|i| format!("S{i}")).collect();
        let it = Arc::new(SymbolsIterator::new(symbols));
        let seen = Arc::new(Mutex::new(HashSet::new()));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let it = Arc::clone(&it);
                let seen = Arc::clone(&seen);
                scope.spawn(move || {
                    while let Some(sym) = it.next() {
                        assert!(seen.lock().unwrap().insert(sym.to_string()));
                    }
                });
            }
        });

        assert_eq!(seen.lock().unwrap().len(), 64);
    }
}
