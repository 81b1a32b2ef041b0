//! Signals — orders that would have fired on the bar after the last one.
//!
//! When a strategy places an order at `bar == bars.len()`, no position is
//! created; instead a `Signal` describing the would-be order goes to every
//! registered handler. This is how a backtested system hands tomorrow's
//! orders to a live executor.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::PositionId;

/// Which order method produced the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    BuyAtMarket,
    BuyAtClose,
    BuyAtStop,
    BuyAtLimit,
    SellAtMarket,
    SellAtClose,
    SellAtStop,
    SellAtLimit,
    ShortAtMarket,
    ShortAtClose,
    ShortAtStop,
    ShortAtLimit,
    CoverAtMarket,
    CoverAtClose,
    CoverAtStop,
    CoverAtLimit,
}

impl SignalKind {
    /// True for kinds that open a new position.
    pub fn is_entry(self) -> bool {
        matches!(
            self,
            SignalKind::BuyAtMarket
                | SignalKind::BuyAtClose
                | SignalKind::BuyAtStop
                | SignalKind::BuyAtLimit
                | SignalKind::ShortAtMarket
                | SignalKind::ShortAtClose
                | SignalKind::ShortAtStop
                | SignalKind::ShortAtLimit
        )
    }
}

/// A would-be order on the bar following the last available bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub symbol: String,
    /// Timestamp of the last available bar; there is no bar at `bar`.
    pub time: NaiveDateTime,
    pub bar: usize,
    pub shares: u64,
    /// Stop/limit price; None for market and close orders.
    pub price: Option<f64>,
    /// The position an exit signal would close.
    pub position_id: Option<PositionId>,
    pub system_name: String,
    /// Whether a live executor should run position sizing on this signal.
    pub apply_sizing: bool,
}

/// Receiver for signals. Handlers are shared across scheduler workers and
/// must synchronize internally.
pub trait SignalHandler: Send + Sync {
    fn on_signal(&self, signal: &Signal);
}

/// Handler that simply accumulates signals; useful in tests and sessions.
#[derive(Debug, Default)]
pub struct CollectingSignalHandler {
    signals: std::sync::Mutex<Vec<Signal>>,
}

impl CollectingSignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.signals.lock().expect("signal handler poisoned"))
    }

    pub fn len(&self) -> usize {
        self.signals.lock().expect("signal handler poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalHandler for CollectingSignalHandler {
    fn on_signal(&self, signal: &Signal) {
        self.signals
            .lock()
            .expect("signal handler poisoned")
            .push(signal.clone());
    }
}
