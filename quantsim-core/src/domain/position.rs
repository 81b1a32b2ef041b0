//! Position — one simulated trade, long or short, open or closed.
//!
//! The entry half is immutable after creation; the close half is written
//! exactly once; `shares` and `enabled` may be rewritten later by the
//! position-sizing pass. Auto-stop arming state lives on the position so the
//! manager's policy can evaluate each open position independently.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique 64-bit position id, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PositionId({})", self.0)
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for longs, −1 for shorts; multiplies raw price moves into gains.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Order mechanism that produced an entry or exit fill.
///
/// The priority ordering (market < limit/stop < close) breaks ties between
/// same-timestamp events in the equity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Close,
    Limit,
    Stop,
    /// Declared by the explicit-trades format but never given semantics.
    Price,
}

impl OrderType {
    pub fn priority(self) -> u8 {
        match self {
            OrderType::Market => 0,
            OrderType::Limit | OrderType::Stop | OrderType::Price => 1,
            OrderType::Close => 2,
        }
    }
}

/// The close half of a position, written once on exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedLeg {
    pub bar: usize,
    pub time: NaiveDateTime,
    pub price: f64,
    pub order_type: OrderType,
    /// Per-share slippage applied to the exit fill.
    pub slippage: f64,
    /// Absolute commission applied to the exit fill.
    pub commission: f64,
    pub name: String,
}

/// Arming state for the per-position auto-stops.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AutoStopState {
    pub trailing_active: bool,
    /// Ratcheted trailing stop level; only moves in the position's favor.
    pub trailing_level: f64,
    pub break_even_active: bool,
    pub break_even_long_active: bool,
    pub break_even_short_active: bool,
    pub reverse_break_even_active: bool,
    pub reverse_break_even_long_active: bool,
    pub reverse_break_even_short_active: bool,
}

/// Errors from direct position mutation.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("position {0} is already closed")]
    AlreadyClosed(PositionId),

    #[error("operation requires a closed position ({0} is open)")]
    StillOpen(PositionId),
}

/// One simulated trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    symbol: String,
    side: PositionSide,
    entry_bar: usize,
    entry_time: NaiveDateTime,
    entry_price: f64,
    entry_order_type: OrderType,
    /// Per-share slippage applied to the entry fill.
    entry_slippage: f64,
    /// Absolute commission applied to the entry fill.
    entry_commission: f64,
    entry_name: String,
    shares: u64,
    closed: Option<ClosedLeg>,
    enabled: bool,
    /// False for explicit trades: the sizing pass leaves them untouched.
    apply_sizing: bool,
    auto_stop: AutoStopState,
    user_data: Option<serde_json::Value>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PositionId,
        symbol: impl Into<String>,
        side: PositionSide,
        entry_bar: usize,
        entry_time: NaiveDateTime,
        entry_price: f64,
        entry_order_type: OrderType,
        entry_slippage: f64,
        entry_commission: f64,
        entry_name: impl Into<String>,
        shares: u64,
        apply_sizing: bool,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            entry_bar,
            entry_time,
            entry_price,
            entry_order_type,
            entry_slippage,
            entry_commission,
            entry_name: entry_name.into(),
            shares,
            closed: None,
            enabled: true,
            apply_sizing,
            auto_stop: AutoStopState::default(),
            user_data: None,
        }
    }

    // ── Identity & entry half ───────────────────────────────────────────

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    pub fn entry_bar(&self) -> usize {
        self.entry_bar
    }

    pub fn entry_time(&self) -> NaiveDateTime {
        self.entry_time
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_time.date()
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_order_type(&self) -> OrderType {
        self.entry_order_type
    }

    pub fn entry_slippage(&self) -> f64 {
        self.entry_slippage
    }

    pub fn entry_commission(&self) -> f64 {
        self.entry_commission
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    // ── Close half ──────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn closed_leg(&self) -> Option<&ClosedLeg> {
        self.closed.as_ref()
    }

    pub fn close_bar(&self) -> Option<usize> {
        self.closed.as_ref().map(|c| c.bar)
    }

    pub fn close_time(&self) -> Option<NaiveDateTime> {
        self.closed.as_ref().map(|c| c.time)
    }

    pub fn close_date(&self) -> Option<NaiveDate> {
        self.closed.as_ref().map(|c| c.time.date())
    }

    pub fn close_price(&self) -> Option<f64> {
        self.closed.as_ref().map(|c| c.price)
    }

    /// Bars between entry and exit (0 for a same-bar round trip).
    pub fn duration(&self) -> Option<usize> {
        self.closed.as_ref().map(|c| c.bar - self.entry_bar)
    }

    /// Write the close half. Fails if the position is already closed.
    pub fn close(&mut self, leg: ClosedLeg) -> Result<(), PositionError> {
        if self.closed.is_some() {
            return Err(PositionError::AlreadyClosed(self.id));
        }
        self.closed = Some(leg);
        Ok(())
    }

    // ── Sizing-mutable state ────────────────────────────────────────────

    pub fn shares(&self) -> u64 {
        self.shares
    }

    pub fn set_shares(&mut self, shares: u64) {
        self.shares = shares;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn applies_sizing(&self) -> bool {
        self.apply_sizing
    }

    pub fn auto_stop(&self) -> &AutoStopState {
        &self.auto_stop
    }

    pub fn auto_stop_mut(&mut self) -> &mut AutoStopState {
        &mut self.auto_stop
    }

    pub fn user_data(&self) -> Option<&serde_json::Value> {
        self.user_data.as_ref()
    }

    pub fn set_user_data(&mut self, data: serde_json::Value) {
        self.user_data = Some(data);
    }

    // ── Cost model ──────────────────────────────────────────────────────
    //
    // Entry cost is positive for both sides: for longs it is the cash paid,
    // for shorts the margin reserved against the sale proceeds. Cash loses
    // the entry cost at entry and receives entry_cost + gain at exit, so
    // close_income ≡ entry_cost + gain uniformly across sides.

    /// Cash committed at entry for an arbitrary share count.
    pub fn entry_cost_with(&self, shares: u64) -> f64 {
        let sh = shares as f64;
        match self.side {
            PositionSide::Long => {
                sh * (self.entry_price + self.entry_slippage) + self.entry_commission
            }
            PositionSide::Short => {
                sh * (self.entry_price - self.entry_slippage) - self.entry_commission
            }
        }
    }

    /// Cash committed at entry for the recorded share count.
    pub fn entry_cost(&self) -> f64 {
        self.entry_cost_with(self.shares)
    }

    /// Realized gain of a closed position, both legs' costs included.
    pub fn gain(&self) -> Option<f64> {
        let c = self.closed.as_ref()?;
        let sh = self.shares as f64;
        Some(match self.side {
            PositionSide::Long => {
                let income = sh * (c.price - c.slippage) - c.commission;
                income - self.entry_cost()
            }
            PositionSide::Short => {
                let buyback = sh * (c.price + c.slippage) + c.commission;
                self.entry_cost() - buyback
            }
        })
    }

    /// Realized gain as a percentage of the entry cost.
    pub fn pct_gain(&self) -> Option<f64> {
        let gain = self.gain()?;
        let cost = self.entry_cost();
        if cost == 0.0 {
            return Some(0.0);
        }
        Some(gain / cost * 100.0)
    }

    /// Exit-leg cash amount: sale proceeds for longs, buyback cost for
    /// shorts. For longs this equals `entry_cost() + gain()`.
    pub fn close_income(&self) -> Option<f64> {
        let c = self.closed.as_ref()?;
        let sh = self.shares as f64;
        Some(match self.side {
            PositionSide::Long => sh * (c.price - c.slippage) - c.commission,
            PositionSide::Short => sh * (c.price + c.slippage) + c.commission,
        })
    }

    /// Cash returned to the account at exit: `entry_cost() + gain()` for
    /// both sides (a short gets its margin back plus the realized gain).
    pub fn exit_cash(&self) -> Option<f64> {
        Some(self.entry_cost() + self.gain()?)
    }

    /// Pure price move since entry, marked at `price`. No exit costs.
    pub fn mark_gain(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.shares as f64
    }

    /// Pure price move between two marks.
    pub fn mark_gain_delta(&self, from: f64, to: f64) -> f64 {
        self.side.sign() * (to - from) * self.shares as f64
    }

    /// Mark-gain as a percentage of the entry cost (open positions).
    pub fn pct_mark_gain(&self, price: f64) -> f64 {
        let cost = self.entry_cost();
        if cost == 0.0 {
            return 0.0;
        }
        self.mark_gain(price) / cost * 100.0
    }

    /// Exit-day equity delta: the exit leg's cash amount relative to the
    /// last mark at `price`. Requires a closed position.
    pub fn close_income_at_mark(&self, price: f64) -> Option<f64> {
        let income = self.close_income()?;
        let raw = income - self.shares as f64 * price;
        Some(match self.side {
            PositionSide::Long => raw,
            PositionSide::Short => -raw,
        })
    }

    /// Total slippage paid over the position's life, in cash.
    pub fn total_slippage(&self) -> f64 {
        let sh = self.shares as f64;
        let entry = sh * self.entry_slippage;
        let exit = self.closed.as_ref().map_or(0.0, |c| sh * c.slippage);
        entry + exit
    }

    /// Total commission paid over the position's life.
    pub fn total_commission(&self) -> f64 {
        let exit = self.closed.as_ref().map_or(0.0, |c| c.commission);
        self.entry_commission + exit
    }
}
