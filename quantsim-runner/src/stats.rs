//! Performance statistics over the post-sizing position set.
//!
//! `PosStats` aggregates one subset of positions (all, long-only,
//! short-only, open-only, closed-only, buy-and-hold). Closed positions use
//! realized gain (both legs' costs included); open positions are marked at
//! the latest available close. Disabled positions are excluded everywhere.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quantsim_core::domain::{
    Bars, ClosedLeg, OrderType, Position, PositionId, PositionSide, PositionsContainer,
};

use crate::equity::EquityDateRange;

/// Errors from statistics computation.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("no bars available for symbol '{0}' referenced by a position")]
    MissingBars(String),

    #[error(transparent)]
    Data(#[from] quantsim_core::data::DataError),
}

/// Aggregate figures for one subset of positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosStats {
    count: usize,
    winning_count: usize,
    losing_count: usize,
    neutral_count: usize,
    gain: f64,
    total_pct_gain: f64,
    max_gain_per_pos: f64,
    max_loss_per_pos: f64,
    max_pct_gain_per_pos: f64,
    max_pct_loss_per_pos: f64,
    /// Sum of winners' gains.
    total_gain: f64,
    /// Sum of losers' (negative) gains.
    total_loss: f64,
    total_commission: f64,
    total_slippage: f64,
    initial_capital: f64,
    ending_capital: f64,
    annualized_pct_gain: f64,
}

impl PosStats {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            count: 0,
            winning_count: 0,
            losing_count: 0,
            neutral_count: 0,
            gain: 0.0,
            total_pct_gain: 0.0,
            max_gain_per_pos: 0.0,
            max_loss_per_pos: 0.0,
            max_pct_gain_per_pos: 0.0,
            max_pct_loss_per_pos: 0.0,
            total_gain: 0.0,
            total_loss: 0.0,
            total_commission: 0.0,
            total_slippage: 0.0,
            initial_capital,
            ending_capital: initial_capital,
            annualized_pct_gain: 0.0,
        }
    }

    fn record(&mut self, gain: f64, pct_gain: f64, commission: f64, slippage: f64) {
        self.count += 1;
        self.gain += gain;
        self.total_pct_gain += pct_gain;
        self.total_commission += commission;
        self.total_slippage += slippage;

        if gain > 0.0 {
            self.winning_count += 1;
            self.total_gain += gain;
            self.max_gain_per_pos = self.max_gain_per_pos.max(gain);
            self.max_pct_gain_per_pos = self.max_pct_gain_per_pos.max(pct_gain);
        } else if gain < 0.0 {
            self.losing_count += 1;
            self.total_loss += gain;
            self.max_loss_per_pos = self.max_loss_per_pos.min(gain);
            self.max_pct_loss_per_pos = self.max_pct_loss_per_pos.min(pct_gain);
        } else {
            self.neutral_count += 1;
        }
    }

    fn finish(&mut self, ending_capital: f64, years: f64) {
        self.ending_capital = ending_capital;
        self.annualized_pct_gain = if years > 0.0
            && self.initial_capital > 0.0
            && self.ending_capital > 0.0
        {
            ((self.ending_capital / self.initial_capital).powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn winning_count(&self) -> usize {
        self.winning_count
    }

    pub fn losing_count(&self) -> usize {
        self.losing_count
    }

    pub fn neutral_count(&self) -> usize {
        self.neutral_count
    }

    pub fn pct_winning(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.winning_count as f64 / self.count as f64 * 100.0
        }
    }

    pub fn pct_losing(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.losing_count as f64 / self.count as f64 * 100.0
        }
    }

    pub fn pct_neutral(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.neutral_count as f64 / self.count as f64 * 100.0
        }
    }

    /// Σ gains: realized for closed, marked at the latest close for open.
    pub fn gain_loss(&self) -> f64 {
        self.gain
    }

    pub fn pct_gain_loss(&self) -> f64 {
        if self.initial_capital == 0.0 {
            0.0
        } else {
            self.gain / self.initial_capital * 100.0
        }
    }

    pub fn max_gain_per_pos(&self) -> f64 {
        self.max_gain_per_pos
    }

    pub fn max_loss_per_pos(&self) -> f64 {
        self.max_loss_per_pos
    }

    pub fn max_pct_gain_per_pos(&self) -> f64 {
        self.max_pct_gain_per_pos
    }

    pub fn max_pct_loss_per_pos(&self) -> f64 {
        self.max_pct_loss_per_pos
    }

    pub fn average_gain_loss_per_pos(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.gain / self.count as f64
        }
    }

    pub fn average_pct_gain_loss_per_pos(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_pct_gain / self.count as f64
        }
    }

    pub fn average_commission_per_pos(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_commission / self.count as f64
        }
    }

    pub fn average_slippage_per_pos(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_slippage / self.count as f64
        }
    }

    pub fn average_gain_per_winning_pos(&self) -> f64 {
        if self.winning_count == 0 {
            0.0
        } else {
            self.total_gain / self.winning_count as f64
        }
    }

    pub fn average_loss_per_losing_pos(&self) -> f64 {
        if self.losing_count == 0 {
            0.0
        } else {
            self.total_loss / self.losing_count as f64
        }
    }

    /// pctWin × avgWin + pctLose × avgLoss, percentages in fractional form.
    /// The loss term is negative, so the sum nets the two out.
    pub fn expectancy(&self) -> f64 {
        self.pct_winning() / 100.0 * self.average_gain_per_winning_pos()
            + self.pct_losing() / 100.0 * self.average_loss_per_losing_pos()
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn ending_capital(&self) -> f64 {
        self.ending_capital
    }

    /// `(ending/initial)^(1/years) − 1`, in percent.
    pub fn annualized_pct_gain(&self) -> f64 {
        self.annualized_pct_gain
    }

    /// Fold another subset into this one (initial capital must match).
    pub fn merge(&mut self, other: &PosStats) {
        self.count += other.count;
        self.winning_count += other.winning_count;
        self.losing_count += other.losing_count;
        self.neutral_count += other.neutral_count;
        self.gain += other.gain;
        self.total_pct_gain += other.total_pct_gain;
        self.max_gain_per_pos = self.max_gain_per_pos.max(other.max_gain_per_pos);
        self.max_loss_per_pos = self.max_loss_per_pos.min(other.max_loss_per_pos);
        self.max_pct_gain_per_pos = self.max_pct_gain_per_pos.max(other.max_pct_gain_per_pos);
        self.max_pct_loss_per_pos = self.max_pct_loss_per_pos.min(other.max_pct_loss_per_pos);
        self.total_gain += other.total_gain;
        self.total_loss += other.total_loss;
        self.total_commission += other.total_commission;
        self.total_slippage += other.total_slippage;
    }
}

/// The full statistics bundle for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub all: PosStats,
    pub long: PosStats,
    pub short: PosStats,
    pub open: PosStats,
    pub closed: PosStats,
    pub buy_hold: PosStats,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub score: f64,
}

/// `apg × (1 − sign·exposure/100) × (1 − sign·min(ulcer, 20)/20)` with
/// `sign = +1` for positive annualized gain, −1 otherwise.
pub fn score(annualized_pct_gain: f64, pct_exposure: f64, ulcer_index: f64) -> f64 {
    let sign = if annualized_pct_gain > 0.0 { 1.0 } else { -1.0 };
    annualized_pct_gain
        * (1.0 - sign * pct_exposure / 100.0)
        * (1.0 - sign * ulcer_index.min(20.0) / 20.0)
}

/// Compute the all/long/short/open/closed/buy-and-hold breakdowns.
///
/// `ending_total_equity` is the equity curve's ending value (sized equity);
/// the other subsets end at `initial + subset gain`.
#[allow(clippy::too_many_arguments)]
pub fn compute_stats(
    positions: &PositionsContainer,
    bars_by_symbol: &HashMap<String, Arc<Bars>>,
    range: &EquityDateRange,
    initial_capital: f64,
    ending_total_equity: f64,
    pct_exposure: f64,
    ulcer_index: f64,
) -> Result<Stats, StatsError> {
    let years = range.years();
    let mut all = PosStats::new(initial_capital);
    let mut long = PosStats::new(initial_capital);
    let mut short = PosStats::new(initial_capital);
    let mut open = PosStats::new(initial_capital);
    let mut closed = PosStats::new(initial_capital);

    for pos in positions.iter().filter(|p| p.is_enabled()) {
        let (gain, pct_gain) = position_gain(pos, bars_by_symbol)?;
        let commission = pos.total_commission();
        let slippage = pos.total_slippage();

        all.record(gain, pct_gain, commission, slippage);
        match pos.side() {
            PositionSide::Long => long.record(gain, pct_gain, commission, slippage),
            PositionSide::Short => short.record(gain, pct_gain, commission, slippage),
        }
        if pos.is_closed() {
            closed.record(gain, pct_gain, commission, slippage);
        } else {
            open.record(gain, pct_gain, commission, slippage);
        }
    }

    all.finish(ending_total_equity, years);
    for subset in [&mut long, &mut short, &mut open, &mut closed] {
        let ending = initial_capital + subset.gain_loss();
        subset.finish(ending, years);
    }

    let buy_hold = buy_and_hold(bars_by_symbol, initial_capital, years)?;

    let score = score(all.annualized_pct_gain(), pct_exposure, ulcer_index);

    Ok(Stats {
        all,
        long,
        short,
        open,
        closed,
        buy_hold,
        from: range.from,
        to: range.to,
        score,
    })
}

fn position_gain(
    pos: &Position,
    bars_by_symbol: &HashMap<String, Arc<Bars>>,
) -> Result<(f64, f64), StatsError> {
    if pos.is_closed() {
        let gain = pos.gain().unwrap_or(0.0);
        let pct = pos.pct_gain().unwrap_or(0.0);
        Ok((gain, pct))
    } else {
        let bars = bars_by_symbol
            .get(pos.symbol())
            .ok_or_else(|| StatsError::MissingBars(pos.symbol().to_string()))?;
        let last_close = bars.close(bars.len() - 1)?;
        Ok((pos.mark_gain(last_close), pos.pct_mark_gain(last_close)))
    }
}

/// Synthetic baseline: per symbol, `floor(initial / first open)` shares held
/// from the first bar to the last.
fn buy_and_hold(
    bars_by_symbol: &HashMap<String, Arc<Bars>>,
    initial_capital: f64,
    years: f64,
) -> Result<PosStats, StatsError> {
    let mut stats = PosStats::new(initial_capital);

    let mut symbols: Vec<&String> = bars_by_symbol.keys().collect();
    symbols.sort_unstable();

    for (i, symbol) in symbols.into_iter().enumerate() {
        let bars = &bars_by_symbol[symbol];
        if bars.is_empty() {
            continue;
        }
        let first_open = bars.open(0)?;
        if !(first_open > 0.0) {
            continue;
        }
        let shares = (initial_capital / first_open).floor() as u64;
        if shares == 0 {
            continue;
        }

        let last = bars.len() - 1;
        let mut pos = Position::new(
            PositionId(i as u64 + 1),
            symbol.clone(),
            PositionSide::Long,
            0,
            bars.time(0)?,
            first_open,
            OrderType::Market,
            0.0,
            0.0,
            "Buy and hold",
            shares,
            false,
        );
        // Same-bar histories close on the entry bar.
        let _ = pos.close(ClosedLeg {
            bar: last,
            time: bars.time(last)?,
            price: bars.close(last)?,
            order_type: OrderType::Close,
            slippage: 0.0,
            commission: 0.0,
            name: "Buy and hold".into(),
        });
        let gain = pos.gain().unwrap_or(0.0);
        let pct = pos.pct_gain().unwrap_or(0.0);
        stats.record(gain, pct, 0.0, 0.0);
    }

    let ending = initial_capital + stats.gain_loss();
    stats.finish(ending, years);
    Ok(stats)
}
