//! Auto-stops — engine-owned exit rules evaluated each bar against every
//! open position.
//!
//! Six categories, applied in a fixed order: time-based → stop-loss →
//! trailing → break-even → reverse-break-even → profit-target. The first
//! category that produces an exit wins for that position on that bar. Every
//! exit routes through the ordinary exit order methods, so order filters and
//! cost models apply.

use crate::domain::{Bars, PositionId, PositionSide};
use crate::engine::manager::{ExitOutcome, PositionsManager};
use crate::engine::EngineError;

/// Exit mechanism for the time-based stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeExitMechanism {
    #[default]
    Market,
    Close,
}

/// Exit after holding for at least `bars` bars.
#[derive(Debug, Clone, Copy)]
pub struct TimeBasedExit {
    pub bars: usize,
    pub mechanism: TimeExitMechanism,
}

/// Trailing stop: arms once profit reaches `trigger` percent, then trails
/// the favorable extreme by `level` percent, ratcheting only in the
/// position's favor.
#[derive(Debug, Clone, Copy)]
pub struct TrailingStop {
    pub trigger: f64,
    pub level: f64,
}

/// Which sides a stop category applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideSelect {
    #[default]
    Both,
    LongOnly,
    ShortOnly,
}

impl SideSelect {
    pub fn applies(self, side: PositionSide) -> bool {
        match self {
            SideSelect::Both => true,
            SideSelect::LongOnly => side == PositionSide::Long,
            SideSelect::ShortOnly => side == PositionSide::Short,
        }
    }
}

/// A percent level with a side selector; used by break-even, reverse
/// break-even, and profit-target stops.
#[derive(Debug, Clone, Copy)]
pub struct LevelStop {
    pub level: f64,
    pub sides: SideSelect,
}

/// Per-manager auto-stop policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoStops {
    pub time_based: Option<TimeBasedExit>,
    /// Stop-loss distance in percent of the entry price.
    pub stop_loss: Option<f64>,
    pub trailing: Option<TrailingStop>,
    pub break_even: Option<LevelStop>,
    pub reverse_break_even: Option<LevelStop>,
    pub profit_target: Option<LevelStop>,
}

impl PositionsManager {
    // ── Policy installers ───────────────────────────────────────────────

    pub fn install_time_based_exit(&mut self, bars: usize) {
        self.install_time_based_exit_at_market(bars);
    }

    pub fn install_time_based_exit_at_market(&mut self, bars: usize) {
        self.auto_stops.time_based = Some(TimeBasedExit {
            bars,
            mechanism: TimeExitMechanism::Market,
        });
    }

    pub fn install_time_based_exit_at_close(&mut self, bars: usize) {
        self.auto_stops.time_based = Some(TimeBasedExit {
            bars,
            mechanism: TimeExitMechanism::Close,
        });
    }

    pub fn install_stop_loss(&mut self, level: f64) {
        self.auto_stops.stop_loss = Some(level);
    }

    pub fn install_trailing_stop(&mut self, trigger: f64, level: f64) {
        self.auto_stops.trailing = Some(TrailingStop { trigger, level });
    }

    pub fn install_break_even_stop(&mut self, level: f64) {
        self.auto_stops.break_even = Some(LevelStop {
            level,
            sides: SideSelect::Both,
        });
    }

    pub fn install_break_even_stop_long(&mut self, level: f64) {
        self.auto_stops.break_even = Some(LevelStop {
            level,
            sides: SideSelect::LongOnly,
        });
    }

    pub fn install_break_even_stop_short(&mut self, level: f64) {
        self.auto_stops.break_even = Some(LevelStop {
            level,
            sides: SideSelect::ShortOnly,
        });
    }

    pub fn install_reverse_break_even_stop(&mut self, level: f64) {
        self.auto_stops.reverse_break_even = Some(LevelStop {
            level,
            sides: SideSelect::Both,
        });
    }

    pub fn install_reverse_break_even_stop_long(&mut self, level: f64) {
        self.auto_stops.reverse_break_even = Some(LevelStop {
            level,
            sides: SideSelect::LongOnly,
        });
    }

    pub fn install_reverse_break_even_stop_short(&mut self, level: f64) {
        self.auto_stops.reverse_break_even = Some(LevelStop {
            level,
            sides: SideSelect::ShortOnly,
        });
    }

    pub fn install_profit_target(&mut self, level: f64) {
        self.auto_stops.profit_target = Some(LevelStop {
            level,
            sides: SideSelect::Both,
        });
    }

    pub fn install_profit_target_long(&mut self, level: f64) {
        self.auto_stops.profit_target = Some(LevelStop {
            level,
            sides: SideSelect::LongOnly,
        });
    }

    pub fn install_profit_target_short(&mut self, level: f64) {
        self.auto_stops.profit_target = Some(LevelStop {
            level,
            sides: SideSelect::ShortOnly,
        });
    }

    // ── Application ─────────────────────────────────────────────────────

    /// Apply every enabled stop category to every open position on `bar`.
    pub fn apply_auto_stops(&mut self, bars: &Bars, bar: usize) -> Result<(), EngineError> {
        let stops = self.auto_stops;
        for id in self.container().open_ids() {
            let matches_symbol = self
                .container()
                .get(id)
                .map(|p| p.symbol() == bars.symbol())
                .unwrap_or(false);
            if !matches_symbol {
                continue;
            }
            self.apply_stops_to_position(&stops, bars, bar, id)?;
        }
        Ok(())
    }

    fn apply_stops_to_position(
        &mut self,
        stops: &AutoStops,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<(), EngineError> {
        if let Some(tb) = stops.time_based {
            if self.time_based_stop(&tb, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        if let Some(level) = stops.stop_loss {
            if self.stop_loss_stop(level, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        if let Some(ts) = stops.trailing {
            if self.trailing_stop(&ts, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        if let Some(be) = stops.break_even {
            if self.break_even_stop(&be, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        if let Some(rbe) = stops.reverse_break_even {
            if self.reverse_break_even_stop(&rbe, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        if let Some(pt) = stops.profit_target {
            if self.profit_target_stop(&pt, bars, bar, id)? == ExitOutcome::Closed {
                return Ok(());
            }
        }
        Ok(())
    }

    fn time_based_stop(
        &mut self,
        tb: &TimeBasedExit,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let (side, entry_bar) = match self.container().get(id) {
            Some(p) => (p.side(), p.entry_bar()),
            None => return Ok(ExitOutcome::NoFill),
        };
        if bar.saturating_sub(entry_bar) < tb.bars {
            return Ok(ExitOutcome::NoFill);
        }
        match (tb.mechanism, side) {
            (TimeExitMechanism::Market, PositionSide::Long) => {
                self.sell_at_market(bars, bar, id, "Time based exit")
            }
            (TimeExitMechanism::Market, PositionSide::Short) => {
                self.cover_at_market(bars, bar, id, "Time based exit")
            }
            (TimeExitMechanism::Close, PositionSide::Long) => {
                self.sell_at_close(bars, bar, id, "Time based exit")
            }
            (TimeExitMechanism::Close, PositionSide::Short) => {
                self.cover_at_close(bars, bar, id, "Time based exit")
            }
        }
    }

    fn stop_loss_stop(
        &mut self,
        level: f64,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let (side, entry_price) = match self.container().get(id) {
            Some(p) => (p.side(), p.entry_price()),
            None => return Ok(ExitOutcome::NoFill),
        };
        match side {
            PositionSide::Long => {
                let stop = entry_price * (1.0 - level / 100.0);
                self.sell_at_stop(bars, bar, id, stop, "Stop loss")
            }
            PositionSide::Short => {
                let stop = entry_price * (1.0 + level / 100.0);
                self.cover_at_stop(bars, bar, id, stop, "Stop loss")
            }
        }
    }

    fn trailing_stop(
        &mut self,
        ts: &TrailingStop,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let high = bars.high(bar)?;
        let low = bars.low(bar)?;

        let (side, entry_price, active, old_level) = match self.container().get(id) {
            Some(p) => (
                p.side(),
                p.entry_price(),
                p.auto_stop().trailing_active,
                p.auto_stop().trailing_level,
            ),
            None => return Ok(ExitOutcome::NoFill),
        };

        let level = match side {
            PositionSide::Long => {
                let profit_pct = (high - entry_price) / entry_price * 100.0;
                let candidate = high * (1.0 - ts.level / 100.0);
                if !active {
                    if profit_pct < ts.trigger {
                        return Ok(ExitOutcome::NoFill);
                    }
                    candidate
                } else {
                    old_level.max(candidate)
                }
            }
            PositionSide::Short => {
                let profit_pct = (entry_price - low) / entry_price * 100.0;
                let candidate = low * (1.0 + ts.level / 100.0);
                if !active {
                    if profit_pct < ts.trigger {
                        return Ok(ExitOutcome::NoFill);
                    }
                    candidate
                } else {
                    old_level.min(candidate)
                }
            }
        };

        if let Some(pos) = self.container_mut().get_mut(id) {
            let state = pos.auto_stop_mut();
            state.trailing_active = true;
            state.trailing_level = level;
        }

        match side {
            PositionSide::Long => self.sell_at_stop(bars, bar, id, level, "Trailing stop"),
            PositionSide::Short => self.cover_at_stop(bars, bar, id, level, "Trailing stop"),
        }
    }

    fn break_even_stop(
        &mut self,
        be: &LevelStop,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let high = bars.high(bar)?;
        let low = bars.low(bar)?;

        let (side, entry_price, armed) = match self.container().get(id) {
            Some(p) => (p.side(), p.entry_price(), p.auto_stop().break_even_active),
            None => return Ok(ExitOutcome::NoFill),
        };
        if !be.sides.applies(side) {
            return Ok(ExitOutcome::NoFill);
        }

        if !armed {
            let profit_pct = match side {
                PositionSide::Long => (high - entry_price) / entry_price * 100.0,
                PositionSide::Short => (entry_price - low) / entry_price * 100.0,
            };
            if profit_pct < be.level {
                return Ok(ExitOutcome::NoFill);
            }
            if let Some(pos) = self.container_mut().get_mut(id) {
                let state = pos.auto_stop_mut();
                state.break_even_active = true;
                match side {
                    PositionSide::Long => state.break_even_long_active = true,
                    PositionSide::Short => state.break_even_short_active = true,
                }
            }
        }

        match side {
            PositionSide::Long => {
                self.sell_at_stop(bars, bar, id, entry_price, "Break even stop")
            }
            PositionSide::Short => {
                self.cover_at_stop(bars, bar, id, entry_price, "Break even stop")
            }
        }
    }

    fn reverse_break_even_stop(
        &mut self,
        rbe: &LevelStop,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let high = bars.high(bar)?;
        let low = bars.low(bar)?;

        let (side, entry_price, armed) = match self.container().get(id) {
            Some(p) => (
                p.side(),
                p.entry_price(),
                p.auto_stop().reverse_break_even_active,
            ),
            None => return Ok(ExitOutcome::NoFill),
        };
        if !rbe.sides.applies(side) {
            return Ok(ExitOutcome::NoFill);
        }

        if !armed {
            let loss_pct = match side {
                PositionSide::Long => (entry_price - low) / entry_price * 100.0,
                PositionSide::Short => (high - entry_price) / entry_price * 100.0,
            };
            if loss_pct < rbe.level {
                return Ok(ExitOutcome::NoFill);
            }
            if let Some(pos) = self.container_mut().get_mut(id) {
                let state = pos.auto_stop_mut();
                state.reverse_break_even_active = true;
                match side {
                    PositionSide::Long => state.reverse_break_even_long_active = true,
                    PositionSide::Short => state.reverse_break_even_short_active = true,
                }
            }
        }

        match side {
            PositionSide::Long => {
                self.sell_at_limit(bars, bar, id, entry_price, "Reverse break even stop")
            }
            PositionSide::Short => {
                self.cover_at_limit(bars, bar, id, entry_price, "Reverse break even stop")
            }
        }
    }

    fn profit_target_stop(
        &mut self,
        pt: &LevelStop,
        bars: &Bars,
        bar: usize,
        id: PositionId,
    ) -> Result<ExitOutcome, EngineError> {
        let (side, entry_price) = match self.container().get(id) {
            Some(p) => (p.side(), p.entry_price()),
            None => return Ok(ExitOutcome::NoFill),
        };
        if !pt.sides.applies(side) {
            return Ok(ExitOutcome::NoFill);
        }
        match side {
            PositionSide::Long => {
                let target = entry_price * (1.0 + pt.level / 100.0);
                self.sell_at_limit(bars, bar, id, target, "Profit target")
            }
            PositionSide::Short => {
                let target = entry_price * (1.0 - pt.level / 100.0);
                self.cover_at_limit(bars, bar, id, target, "Profit target")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests_support::make_bars;

    #[test]
    fn stop_loss_triggers_at_stop_price() {
        // S2: entry 100, 10% stop → stop 90; bar 1 low 80 → exit at 90.
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 105.0, 95.0, 100.0, 1000.0),
                (100.0, 110.0, 80.0, 85.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_stop_loss(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();

        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.close_price().unwrap(), 90.0);
        assert_eq!(pos.gain().unwrap(), -100.0);
        assert_eq!(pos.closed_leg().unwrap().name, "Stop loss");
    }

    #[test]
    fn stop_loss_does_not_trigger_above_stop() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 105.0, 95.0, 100.0, 1000.0),
                (100.0, 104.0, 96.0, 102.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_stop_loss(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        assert!(mgr.container().get(id).unwrap().is_open());
    }

    #[test]
    fn short_stop_loss_mirrors() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 105.0, 95.0, 100.0, 1000.0),
                (100.0, 115.0, 98.0, 112.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .short_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_stop_loss(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        // Stop at 110; bar high 115 crosses → fill at 110.
        assert_eq!(pos.close_price().unwrap(), 110.0);
    }

    #[test]
    fn time_based_exit_after_n_bars() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (100.0, 101.0, 99.0, 100.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_time_based_exit(2);

        mgr.apply_auto_stops(&bars, 1).unwrap();
        assert!(mgr.container().get(id).unwrap().is_open());

        mgr.apply_auto_stops(&bars, 2).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.close_price().unwrap(), 100.0); // at market = open
    }

    #[test]
    fn time_based_exit_at_close_uses_close() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (100.0, 103.0, 99.0, 102.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_time_based_exit_at_close(1);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        assert_eq!(
            mgr.container().get(id).unwrap().close_price().unwrap(),
            102.0
        );
    }

    #[test]
    fn trailing_stop_arms_and_ratchets() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                // +10% high → arms; stop = 110 * 0.95 = 104.5
                (105.0, 110.0, 104.8, 109.0, 1000.0),
                // higher high 120 → stop ratchets to 114; low 113 hits it
                (115.0, 120.0, 113.0, 118.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_trailing_stop(10.0, 5.0);

        mgr.apply_auto_stops(&bars, 1).unwrap();
        {
            let pos = mgr.container().get(id).unwrap();
            assert!(pos.is_open());
            assert!(pos.auto_stop().trailing_active);
            assert!((pos.auto_stop().trailing_level - 104.5).abs() < 1e-9);
        }

        mgr.apply_auto_stops(&bars, 2).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert!((pos.close_price().unwrap() - 114.0).abs() < 1e-9);
        assert_eq!(pos.closed_leg().unwrap().name, "Trailing stop");
    }

    #[test]
    fn trailing_stop_can_arm_and_exit_same_bar() {
        let bars = make_bars("SPY", &[(100.0, 112.0, 99.0, 110.0, 1000.0)]);
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_trailing_stop(10.0, 5.0);
        // Bar 0: high 112 → +12%, arms at 112*0.95 = 106.4; low 99 < 106.4
        // → exits same bar at open (100 <= 106.4 → fill at open 100).
        mgr.apply_auto_stops(&bars, 0).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.close_price().unwrap(), 100.0);
    }

    #[test]
    fn break_even_arms_then_exits_at_entry() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                // +6% high arms the 5% break-even; low stays above entry
                (104.0, 106.0, 102.0, 105.0, 1000.0),
                // price returns to entry
                (101.0, 102.0, 99.0, 100.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_break_even_stop(5.0);

        mgr.apply_auto_stops(&bars, 1).unwrap();
        {
            let pos = mgr.container().get(id).unwrap();
            assert!(pos.is_open());
            assert!(pos.auto_stop().break_even_active);
            assert!(pos.auto_stop().break_even_long_active);
        }

        mgr.apply_auto_stops(&bars, 2).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.close_price().unwrap(), 100.0);
        assert_eq!(pos.gain().unwrap(), 0.0);
    }

    #[test]
    fn reverse_break_even_arms_on_loss_exits_at_limit() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                // -6% low arms the 5% reverse break-even
                (96.0, 97.0, 94.0, 95.0, 1000.0),
                // recovery to entry: high 101 >= 100 → limit fill at 100
                (98.0, 101.0, 97.0, 100.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_reverse_break_even_stop(5.0);

        mgr.apply_auto_stops(&bars, 1).unwrap();
        assert!(mgr.container().get(id).unwrap().is_open());
        assert!(mgr
            .container()
            .get(id)
            .unwrap()
            .auto_stop()
            .reverse_break_even_active);

        mgr.apply_auto_stops(&bars, 2).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.close_price().unwrap(), 100.0);
        assert_eq!(pos.closed_leg().unwrap().name, "Reverse break even stop");
    }

    #[test]
    fn profit_target_exits_at_limit() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (104.0, 111.0, 103.0, 108.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_profit_target(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert!(pos.is_closed());
        // Target 110; high 111 reaches it.
        assert_eq!(pos.close_price().unwrap(), 110.0);
        assert_eq!(pos.gain().unwrap(), 100.0);
    }

    #[test]
    fn first_trigger_wins() {
        // Both stop-loss and profit target could fire; stop-loss is applied
        // first in category order.
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (100.0, 115.0, 85.0, 100.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_stop_loss(10.0);
        mgr.install_profit_target(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        let pos = mgr.container().get(id).unwrap();
        assert_eq!(pos.closed_leg().unwrap().name, "Stop loss");
    }

    #[test]
    fn side_selector_limits_category() {
        let bars = make_bars(
            "SPY",
            &[
                (100.0, 101.0, 99.0, 100.0, 1000.0),
                (104.0, 111.0, 103.0, 108.0, 1000.0),
            ],
        );
        let mut mgr = PositionsManager::new("test");
        let id = mgr
            .buy_at_market(&bars, 0, 10, "entry")
            .unwrap()
            .position_id()
            .unwrap();
        mgr.install_profit_target_short(10.0);
        mgr.apply_auto_stops(&bars, 1).unwrap();
        assert!(mgr.container().get(id).unwrap().is_open());
    }
}
