//! PositionsManager — translates order calls into positions with fill prices
//! determined from bar OHLC.
//!
//! Entry orders return `EntryOutcome`; exits return `ExitOutcome`. An order
//! placed at `bar == bars.len()` (one past the last historical bar) becomes
//! a `Signal` instead of a position. All exits route through the same four
//! mechanisms (market/close/stop/limit), so auto-stops and explicit trades
//! see identical fill semantics and order filters apply everywhere.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::domain::{
    Bars, ClosedLeg, OrderType, Position, PositionId, PositionSide, PositionsContainer,
};
use crate::engine::auto_stops::AutoStops;
use crate::engine::costs::{Commission, NullCommission, NullSlippage, Slippage};
use crate::engine::filter::OrderFilter;
use crate::engine::signal::{Signal, SignalHandler, SignalKind};
use crate::engine::EngineError;

/// Result of an entry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Filled(PositionId),
    /// Order was past the last bar; a signal was emitted instead.
    Signaled,
    /// No fill on this bar, the filter refused it, or the entry predates the
    /// start-trades cutoff.
    Rejected,
}

impl EntryOutcome {
    pub fn position_id(self) -> Option<PositionId> {
        match self {
            EntryOutcome::Filled(id) => Some(id),
            _ => None,
        }
    }
}

/// Result of an exit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Closed,
    Signaled,
    /// Price never traded on this bar or the filter suppressed the exit.
    NoFill,
}

/// The per-symbol order engine. Owns its container for the duration of a
/// strategy run; the scheduler takes it back with [`into_container`].
///
/// [`into_container`]: PositionsManager::into_container
pub struct PositionsManager {
    container: PositionsContainer,
    slippage: Arc<dyn Slippage>,
    commission: Arc<dyn Commission>,
    order_filter: Option<Arc<dyn OrderFilter>>,
    signal_handlers: Vec<Arc<dyn SignalHandler>>,
    pub(crate) auto_stops: AutoStops,
    start_trades: Option<NaiveDateTime>,
    system_name: String,
    next_id: u64,
    signal_count: u64,
}

impl PositionsManager {
    pub fn new(system_name: impl Into<String>) -> Self {
        Self {
            container: PositionsContainer::new(),
            slippage: Arc::new(NullSlippage),
            commission: Arc::new(NullCommission),
            order_filter: None,
            signal_handlers: Vec::new(),
            auto_stops: AutoStops::default(),
            start_trades: None,
            system_name: system_name.into(),
            next_id: 1,
            signal_count: 0,
        }
    }

    /// Start id allocation at `base + 1`; the scheduler hands each symbol a
    /// disjoint block so ids are deterministic under any thread interleaving.
    pub fn with_id_base(mut self, base: u64) -> Self {
        self.next_id = base + 1;
        self
    }

    pub fn set_slippage(&mut self, slippage: Arc<dyn Slippage>) {
        self.slippage = slippage;
    }

    pub fn set_commission(&mut self, commission: Arc<dyn Commission>) {
        self.commission = commission;
    }

    pub fn set_order_filter(&mut self, filter: Arc<dyn OrderFilter>) {
        self.order_filter = Some(filter);
    }

    pub fn add_signal_handler(&mut self, handler: Arc<dyn SignalHandler>) {
        self.signal_handlers.push(handler);
    }

    /// Entries with an earlier fill time are rejected outright.
    pub fn set_start_trades(&mut self, cutoff: Option<NaiveDateTime>) {
        self.start_trades = cutoff;
    }

    pub fn container(&self) -> &PositionsContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut PositionsContainer {
        &mut self.container
    }

    pub fn into_container(self) -> PositionsContainer {
        self.container
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Signals emitted so far (orders placed past the last bar).
    pub fn signal_count(&self) -> u64 {
        self.signal_count
    }

    // ── Entry orders ────────────────────────────────────────────────────

    /// Buy at next open: order assumed placed before the bar opens.
    pub fn buy_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Long,
            SignalKind::BuyAtMarket,
            OrderType::Market,
            None,
            shares,
            name,
            true,
        )
    }

    pub fn buy_at_close(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Long,
            SignalKind::BuyAtClose,
            OrderType::Close,
            None,
            shares,
            name,
            true,
        )
    }

    pub fn buy_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        stop: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Long,
            SignalKind::BuyAtStop,
            OrderType::Stop,
            Some(stop),
            shares,
            name,
            true,
        )
    }

    pub fn buy_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        limit: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Long,
            SignalKind::BuyAtLimit,
            OrderType::Limit,
            Some(limit),
            shares,
            name,
            true,
        )
    }

    pub fn short_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Short,
            SignalKind::ShortAtMarket,
            OrderType::Market,
            None,
            shares,
            name,
            true,
        )
    }

    pub fn short_at_close(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Short,
            SignalKind::ShortAtClose,
            OrderType::Close,
            None,
            shares,
            name,
            true,
        )
    }

    pub fn short_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        stop: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Short,
            SignalKind::ShortAtStop,
            OrderType::Stop,
            Some(stop),
            shares,
            name,
            true,
        )
    }

    pub fn short_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        limit: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(
            bars,
            bar,
            PositionSide::Short,
            SignalKind::ShortAtLimit,
            OrderType::Limit,
            Some(limit),
            shares,
            name,
            true,
        )
    }

    /// Entry with sizing disabled; explicit trades come through here.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn enter_unsized(
        &mut self,
        bars: &Bars,
        bar: usize,
        side: PositionSide,
        kind: SignalKind,
        order_type: OrderType,
        trigger: Option<f64>,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(bars, bar, side, kind, order_type, trigger, shares, name, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn enter(
        &mut self,
        bars: &Bars,
        bar: usize,
        side: PositionSide,
        kind: SignalKind,
        order_type: OrderType,
        trigger: Option<f64>,
        shares: u64,
        name: &str,
        apply_sizing: bool,
    ) -> Result<EntryOutcome, EngineError> {
        validate_trigger(order_type, trigger)?;

        if bar == bars.len() && !bars.is_empty() {
            self.emit_signal(bars, bar, kind, shares, trigger, None, apply_sizing)?;
            return Ok(EntryOutcome::Signaled);
        }

        let open = bars.open(bar)?;
        let high = bars.high(bar)?;
        let low = bars.low(bar)?;
        let close = bars.close(bar)?;

        let fill = match (order_type, side) {
            (OrderType::Market, _) => Some(open),
            (OrderType::Close, _) => Some(close),
            (OrderType::Stop, PositionSide::Long) => buy_stop_fill(open, high, trigger_val(trigger)),
            (OrderType::Stop, PositionSide::Short) => {
                sell_stop_fill(open, low, trigger_val(trigger))
            }
            (OrderType::Limit, PositionSide::Long) => {
                buy_limit_fill(open, low, trigger_val(trigger))
            }
            (OrderType::Limit, PositionSide::Short) => {
                sell_limit_fill(open, high, trigger_val(trigger))
            }
            (OrderType::Price, _) => return Err(EngineError::PriceTypeUnsupported),
        };
        let Some(price) = fill else {
            return Ok(EntryOutcome::Rejected);
        };

        let shares = match &self.order_filter {
            Some(filter) => filter.on_entry(kind, bars, bar, shares, trigger, name),
            None => shares,
        };
        if shares == 0 {
            return Ok(EntryOutcome::Rejected);
        }

        let time = bars.time(bar)?;
        if let Some(cutoff) = self.start_trades {
            if time < cutoff {
                return Ok(EntryOutcome::Rejected);
            }
        }

        let volume = bars.volume(bar)?;
        let slippage = self.slippage.amount(shares, volume, price);
        let commission = self.commission.amount(shares, price);

        let id = PositionId(self.next_id);
        self.next_id += 1;
        self.container.push(Position::new(
            id,
            bars.symbol(),
            side,
            bar,
            time,
            price,
            order_type,
            slippage,
            commission,
            name,
            shares,
            apply_sizing,
        ));
        Ok(EntryOutcome::Filled(id))
    }

    // ── Exit orders ─────────────────────────────────────────────────────

    pub fn sell_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(bars, bar, pos, SignalKind::SellAtMarket, OrderType::Market, None, name)
    }

    pub fn sell_at_close(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(bars, bar, pos, SignalKind::SellAtClose, OrderType::Close, None, name)
    }

    pub fn sell_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        stop: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(
            bars,
            bar,
            pos,
            SignalKind::SellAtStop,
            OrderType::Stop,
            Some(stop),
            name,
        )
    }

    pub fn sell_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        limit: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(
            bars,
            bar,
            pos,
            SignalKind::SellAtLimit,
            OrderType::Limit,
            Some(limit),
            name,
        )
    }

    pub fn cover_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(bars, bar, pos, SignalKind::CoverAtMarket, OrderType::Market, None, name)
    }

    pub fn cover_at_close(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(bars, bar, pos, SignalKind::CoverAtClose, OrderType::Close, None, name)
    }

    pub fn cover_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        stop: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(
            bars,
            bar,
            pos,
            SignalKind::CoverAtStop,
            OrderType::Stop,
            Some(stop),
            name,
        )
    }

    pub fn cover_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        pos: PositionId,
        limit: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        self.exit(
            bars,
            bar,
            pos,
            SignalKind::CoverAtLimit,
            OrderType::Limit,
            Some(limit),
            name,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        bars: &Bars,
        bar: usize,
        id: PositionId,
        kind: SignalKind,
        order_type: OrderType,
        trigger: Option<f64>,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        validate_trigger(order_type, trigger)?;

        let (side, shares) = {
            let pos = self
                .container
                .get(id)
                .ok_or(EngineError::UnknownPosition(id))?;
            if pos.is_closed() {
                return Err(EngineError::ClosingAlreadyClosedPosition(id));
            }
            if pos.symbol() != bars.symbol() {
                return Err(EngineError::ClosingPositionOnDifferentSymbol {
                    id,
                    position_symbol: pos.symbol().to_string(),
                    bars_symbol: bars.symbol().to_string(),
                });
            }
            let selling = matches!(
                kind,
                SignalKind::SellAtMarket
                    | SignalKind::SellAtClose
                    | SignalKind::SellAtStop
                    | SignalKind::SellAtLimit
            );
            if selling && pos.is_short() {
                return Err(EngineError::SellingShortPosition(id));
            }
            if !selling && pos.is_long() {
                return Err(EngineError::CoveringLongPosition(id));
            }
            (pos.side(), pos.shares())
        };

        if bar == bars.len() && !bars.is_empty() {
            self.emit_signal(bars, bar, kind, shares, trigger, Some(id), false)?;
            return Ok(ExitOutcome::Signaled);
        }

        let open = bars.open(bar)?;
        let high = bars.high(bar)?;
        let low = bars.low(bar)?;
        let close = bars.close(bar)?;

        // Exit direction: selling a long hits the sell side of the book,
        // covering a short hits the buy side.
        let fill = match (order_type, side) {
            (OrderType::Market, _) => Some(open),
            (OrderType::Close, _) => Some(close),
            (OrderType::Stop, PositionSide::Long) => {
                sell_stop_fill(open, low, trigger_val(trigger))
            }
            (OrderType::Stop, PositionSide::Short) => {
                buy_stop_fill(open, high, trigger_val(trigger))
            }
            (OrderType::Limit, PositionSide::Long) => {
                sell_limit_fill(open, high, trigger_val(trigger))
            }
            (OrderType::Limit, PositionSide::Short) => {
                buy_limit_fill(open, low, trigger_val(trigger))
            }
            (OrderType::Price, _) => return Err(EngineError::PriceTypeUnsupported),
        };
        let Some(price) = fill else {
            return Ok(ExitOutcome::NoFill);
        };

        if let Some(filter) = &self.order_filter {
            if !filter.on_exit(kind, bars, bar, id, trigger, name) {
                return Ok(ExitOutcome::NoFill);
            }
        }

        let volume = bars.volume(bar)?;
        let slippage = self.slippage.amount(shares, volume, price);
        let commission = self.commission.amount(shares, price);
        let time = bars.time(bar)?;

        self.container
            .close_position(
                id,
                ClosedLeg {
                    bar,
                    time,
                    price,
                    order_type,
                    slippage,
                    commission,
                    name: name.to_string(),
                },
            )
            .map_err(|_| EngineError::ClosingAlreadyClosedPosition(id))?;
        Ok(ExitOutcome::Closed)
    }

    // ── Bulk closers ────────────────────────────────────────────────────

    pub fn close_all_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(bars, bar, name, None, OrderType::Market, None)
    }

    pub fn close_all_at_close(
        &mut self,
        bars: &Bars,
        bar: usize,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(bars, bar, name, None, OrderType::Close, None)
    }

    pub fn close_all_long_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Long),
            OrderType::Market,
            None,
        )
    }

    pub fn close_all_short_at_market(
        &mut self,
        bars: &Bars,
        bar: usize,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Short),
            OrderType::Market,
            None,
        )
    }

    pub fn close_all_long_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        limit: f64,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Long),
            OrderType::Limit,
            Some(limit),
        )
    }

    pub fn close_all_short_at_limit(
        &mut self,
        bars: &Bars,
        bar: usize,
        limit: f64,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Short),
            OrderType::Limit,
            Some(limit),
        )
    }

    pub fn close_all_long_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        stop: f64,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Long),
            OrderType::Stop,
            Some(stop),
        )
    }

    pub fn close_all_short_at_stop(
        &mut self,
        bars: &Bars,
        bar: usize,
        stop: f64,
        name: &str,
    ) -> Result<(), EngineError> {
        self.close_matching(
            bars,
            bar,
            name,
            Some(PositionSide::Short),
            OrderType::Stop,
            Some(stop),
        )
    }

    fn close_matching(
        &mut self,
        bars: &Bars,
        bar: usize,
        name: &str,
        side: Option<PositionSide>,
        order_type: OrderType,
        trigger: Option<f64>,
    ) -> Result<(), EngineError> {
        for id in self.container.open_ids() {
            let Some(pos) = self.container.get(id) else {
                continue;
            };
            if pos.symbol() != bars.symbol() {
                continue;
            }
            if let Some(want) = side {
                if pos.side() != want {
                    continue;
                }
            }
            let is_long = pos.is_long();
            let outcome = match (order_type, is_long) {
                (OrderType::Market, true) => self.sell_at_market(bars, bar, id, name)?,
                (OrderType::Market, false) => self.cover_at_market(bars, bar, id, name)?,
                (OrderType::Close, true) => self.sell_at_close(bars, bar, id, name)?,
                (OrderType::Close, false) => self.cover_at_close(bars, bar, id, name)?,
                (OrderType::Stop, true) => {
                    self.sell_at_stop(bars, bar, id, trigger_val(trigger), name)?
                }
                (OrderType::Stop, false) => {
                    self.cover_at_stop(bars, bar, id, trigger_val(trigger), name)?
                }
                (OrderType::Limit, true) => {
                    self.sell_at_limit(bars, bar, id, trigger_val(trigger), name)?
                }
                (OrderType::Limit, false) => {
                    self.cover_at_limit(bars, bar, id, trigger_val(trigger), name)?
                }
                (OrderType::Price, _) => return Err(EngineError::PriceTypeUnsupported),
            };
            let _ = outcome;
        }
        Ok(())
    }

    /// Close whole long positions in open order until at least `shares`
    /// shares are closed. No partial-position splits.
    pub fn close_first_long_at_market_by_shares(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<u64, EngineError> {
        self.close_first_by_shares(bars, bar, shares, name, PositionSide::Long)
    }

    /// Short-side counterpart of
    /// [`close_first_long_at_market_by_shares`](Self::close_first_long_at_market_by_shares).
    pub fn close_first_short_at_market_by_shares(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<u64, EngineError> {
        self.close_first_by_shares(bars, bar, shares, name, PositionSide::Short)
    }

    fn close_first_by_shares(
        &mut self,
        bars: &Bars,
        bar: usize,
        shares: u64,
        name: &str,
        side: PositionSide,
    ) -> Result<u64, EngineError> {
        let mut closed = 0u64;
        for id in self.container.open_ids() {
            if closed >= shares {
                break;
            }
            let Some(pos) = self.container.get(id) else {
                continue;
            };
            if pos.side() != side || pos.symbol() != bars.symbol() {
                continue;
            }
            let pos_shares = pos.shares();
            let outcome = match side {
                PositionSide::Long => self.sell_at_market(bars, bar, id, name)?,
                PositionSide::Short => self.cover_at_market(bars, bar, id, name)?,
            };
            if outcome == ExitOutcome::Closed {
                closed += pos_shares;
            }
        }
        Ok(closed)
    }

    // ── Signals ─────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn emit_signal(
        &mut self,
        bars: &Bars,
        bar: usize,
        kind: SignalKind,
        shares: u64,
        price: Option<f64>,
        position_id: Option<PositionId>,
        apply_sizing: bool,
    ) -> Result<(), EngineError> {
        if self.signal_handlers.is_empty() {
            return Err(EngineError::NoSignalHandler(bar));
        }
        let signal = Signal {
            kind,
            symbol: bars.symbol().to_string(),
            time: bars.time(bars.len() - 1)?,
            bar,
            shares,
            price,
            position_id,
            system_name: self.system_name.clone(),
            apply_sizing,
        };
        for handler in &self.signal_handlers {
            handler.on_signal(&signal);
        }
        self.signal_count += 1;
        Ok(())
    }
}

// ── Fill rules ──────────────────────────────────────────────────────────
//
// Buy-side orders (buy entries, cover exits) and sell-side orders (short
// entries, sell exits) mirror each other. A stop fills at the open when the
// bar gaps through it; a limit fills at the open when the bar opens through
// it; otherwise at the trigger price if the bar's range touched it.

fn buy_stop_fill(open: f64, high: f64, stop: f64) -> Option<f64> {
    if open >= stop {
        Some(open)
    } else if high >= stop {
        Some(stop)
    } else {
        None
    }
}

fn sell_stop_fill(open: f64, low: f64, stop: f64) -> Option<f64> {
    if open <= stop {
        Some(open)
    } else if low <= stop {
        Some(stop)
    } else {
        None
    }
}

fn buy_limit_fill(open: f64, low: f64, limit: f64) -> Option<f64> {
    if open <= limit {
        Some(open)
    } else if low <= limit {
        Some(limit)
    } else {
        None
    }
}

fn sell_limit_fill(open: f64, high: f64, limit: f64) -> Option<f64> {
    if open >= limit {
        Some(open)
    } else if high >= limit {
        Some(limit)
    } else {
        None
    }
}

fn trigger_val(trigger: Option<f64>) -> f64 {
    trigger.unwrap_or(f64::NAN)
}

fn validate_trigger(order_type: OrderType, trigger: Option<f64>) -> Result<(), EngineError> {
    let Some(price) = trigger else {
        return Ok(());
    };
    if price.is_nan() || price <= 0.0 {
        return Err(match order_type {
            OrderType::Limit => EngineError::InvalidLimitPrice(price),
            _ => EngineError::InvalidStopPrice(price),
        });
    }
    Ok(())
}
