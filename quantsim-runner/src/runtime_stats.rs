//! RuntimeStats — live progress counters shared across scheduler workers.
//!
//! Workers bump atomic counters as symbols complete; anyone holding the
//! `Arc` can take a consistent-enough snapshot at any time and serialize it
//! to JSON for status endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use quantsim_core::params::RuntimeParams;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Ready,
    Running,
    Canceling,
    Ended,
    Canceled,
}

/// Shared live counters for one session.
#[derive(Debug)]
pub struct RuntimeStats {
    session_id: String,
    started: Instant,
    total_symbol_count: AtomicU64,
    processed_symbol_count: AtomicU64,
    symbol_errors_count: AtomicU64,
    system_count: AtomicU64,
    raw_trade_count: AtomicU64,
    processed_trade_count: AtomicU64,
    signal_count: AtomicU64,
    processed_signal_count: AtomicU64,
    total_bar_count: AtomicU64,
    total_runs: AtomicU64,
    error_count: AtomicU64,
    current_symbol: Mutex<String>,
    status: Mutex<SessionStatus>,
    message: Mutex<String>,
}

impl RuntimeStats {
    pub fn new(session_id: String, total_symbols: u64, systems: u64) -> Self {
        Self {
            session_id,
            started: Instant::now(),
            total_symbol_count: AtomicU64::new(total_symbols),
            processed_symbol_count: AtomicU64::new(0),
            symbol_errors_count: AtomicU64::new(0),
            system_count: AtomicU64::new(systems),
            raw_trade_count: AtomicU64::new(0),
            processed_trade_count: AtomicU64::new(0),
            signal_count: AtomicU64::new(0),
            processed_signal_count: AtomicU64::new(0),
            total_bar_count: AtomicU64::new(0),
            total_runs: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            current_symbol: Mutex::new(String::new()),
            status: Mutex::new(SessionStatus::Ready),
            message: Mutex::new(String::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap() = message.into();
    }

    pub fn set_current_symbol(&self, symbol: &str) {
        *self.current_symbol.lock().unwrap() = symbol.to_string();
    }

    /// A new pass over the symbol list began; the total grows accordingly.
    pub fn pass_started(&self, symbols: u64) {
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        if self.total_runs.load(Ordering::Relaxed) > 1 {
            self.total_symbol_count.fetch_add(symbols, Ordering::Relaxed);
        }
    }

    pub fn symbol_processed(&self, bars: u64, raw_trades: u64, signals: u64) {
        self.processed_symbol_count.fetch_add(1, Ordering::Relaxed);
        self.total_bar_count.fetch_add(bars, Ordering::Relaxed);
        self.raw_trade_count.fetch_add(raw_trades, Ordering::Relaxed);
        self.signal_count.fetch_add(signals, Ordering::Relaxed);
        self.processed_signal_count
            .fetch_add(signals, Ordering::Relaxed);
    }

    pub fn symbol_errored(&self) {
        self.processed_symbol_count.fetch_add(1, Ordering::Relaxed);
        self.symbol_errors_count.fetch_add(1, Ordering::Relaxed);
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Enabled-position count after the sizing pass.
    pub fn set_processed_trade_count(&self, count: u64) {
        self.processed_trade_count.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeStatsSnapshot {
        let total = self.total_symbol_count.load(Ordering::Relaxed);
        let processed = self.processed_symbol_count.load(Ordering::Relaxed);
        let pct = if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        RuntimeStatsSnapshot {
            session_id: self.session_id.clone(),
            duration: self.started.elapsed().as_secs_f64(),
            processed_symbol_count: processed,
            symbol_processed_with_errors_count: self.symbol_errors_count.load(Ordering::Relaxed),
            total_symbol_count: total,
            system_count: self.system_count.load(Ordering::Relaxed),
            raw_trade_count: self.raw_trade_count.load(Ordering::Relaxed),
            processed_trade_count: self.processed_trade_count.load(Ordering::Relaxed),
            signal_count: self.signal_count.load(Ordering::Relaxed),
            processed_signal_count: self.processed_signal_count.load(Ordering::Relaxed),
            total_bar_count: self.total_bar_count.load(Ordering::Relaxed),
            total_runs: self.total_runs.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            percentage_done: pct,
            current_symbol: self.current_symbol.lock().unwrap().clone(),
            status: self.status(),
            message: self.message.lock().unwrap().clone(),
        }
    }
}

/// Serializable point-in-time view of the live counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatsSnapshot {
    pub session_id: String,
    /// Seconds since the session started.
    pub duration: f64,
    pub processed_symbol_count: u64,
    pub symbol_processed_with_errors_count: u64,
    pub total_symbol_count: u64,
    pub system_count: u64,
    pub raw_trade_count: u64,
    pub processed_trade_count: u64,
    pub signal_count: u64,
    pub processed_signal_count: u64,
    pub total_bar_count: u64,
    pub total_runs: u64,
    pub error_count: u64,
    pub percentage_done: f64,
    pub current_symbol: String,
    pub status: SessionStatus,
    pub message: String,
}

/// Deterministic session id from the run's identity.
pub fn make_session_id(system_name: &str, symbols: &[String], params: &RuntimeParams) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(system_name.as_bytes());
    for symbol in symbols {
        hasher.update(symbol.as_bytes());
        hasher.update(b"\n");
    }
    if let Ok(encoded) = serde_json::to_vec(params) {
        hasher.update(&encoded);
    }
    hasher.finalize().to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RuntimeStats::new("abc".into(), 3, 1);
        stats.pass_started(3);
        stats.symbol_processed(100, 5, 1);
        stats.symbol_processed(200, 2, 0);
        stats.symbol_errored();

        let snap = stats.snapshot();
        assert_eq!(snap.processed_symbol_count, 3);
        assert_eq!(snap.symbol_processed_with_errors_count, 1);
        assert_eq!(snap.total_bar_count, 300);
        assert_eq!(snap.raw_trade_count, 7);
        assert_eq!(snap.signal_count, 1);
        assert_eq!(snap.total_runs, 1);
        assert!((snap.percentage_done - 100.0).abs() < 1e-9);
    }

    #[test]
    fn second_pass_grows_total() {
        let stats = RuntimeStats::new("abc".into(), 2, 1);
        stats.pass_started(2);
        stats.pass_started(2);
        assert_eq!(stats.snapshot().total_symbol_count, 4);
        assert_eq!(stats.snapshot().total_runs, 2);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let stats = RuntimeStats::new("abc".into(), 1, 1);
        stats.set_status(SessionStatus::Running);
        stats.set_current_symbol("SPY");
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"sessionId\":\"abc\""));
        assert!(json.contains("\"processedSymbolCount\""));
        assert!(json.contains("\"percentageDone\""));
        assert!(json.contains("\"status\":\"RUNNING\""));
        assert!(json.contains("\"currentSymbol\":\"SPY\""));
    }

    #[test]
    fn session_id_is_deterministic() {
        let params = RuntimeParams::default();
        let a = make_session_id("sys", &["SPY".into()], &params);
        let b = make_session_id("sys", &["SPY".into()], &params);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        let c = make_session_id("sys", &["QQQ".into()], &params);
        assert_ne!(a, c);
    }
}
