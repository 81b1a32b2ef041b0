//! Session — end-to-end assembly of a backtest run.
//!
//! Raw scheduler pass(es) → merged positions → equity & sizing pass →
//! drawdown curves → statistics → result bundle.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use quantsim_core::chart::ChartSink;
use quantsim_core::data::DataProvider;
use quantsim_core::domain::PositionsContainer;
use quantsim_core::engine::costs::{Commission, Slippage};
use quantsim_core::engine::filter::OrderFilter;
use quantsim_core::engine::signal::{Signal, SignalHandler};
use quantsim_core::engine::ExplicitTrades;
use quantsim_core::params::RuntimeParams;
use quantsim_core::strategy::Strategy;

use crate::drawdown::DrawdownCurve;
use crate::equity::{run_equity_pass, EquityCurve, EquityDateRange, EquityError};
use crate::runtime_stats::{RuntimeStats, RuntimeStatsSnapshot};
use crate::scheduler::{RawRunOutput, Scheduler, SchedulerError};
use crate::stats::{compute_stats, Stats, StatsError};

/// Errors that abort a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Equity(#[from] EquityError),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Drawdown curves for the three equity sides.
#[derive(Debug, Clone)]
pub struct DrawdownSet {
    pub total: DrawdownCurve,
    pub long: DrawdownCurve,
    pub short: DrawdownCurve,
}

/// Everything a finished session produces.
#[derive(Debug)]
pub struct SessionResult {
    /// Merged positions after sizing (shares rewritten, violators disabled).
    pub positions: PositionsContainer,
    pub equity: EquityCurve,
    pub drawdown: DrawdownSet,
    pub stats: Stats,
    pub runtime: RuntimeStatsSnapshot,
    pub signals: Vec<Signal>,
}

/// One configured backtest session.
pub struct Session {
    scheduler: Scheduler,
    params: RuntimeParams,
}

impl Session {
    pub fn new(
        strategy: Box<dyn Strategy>,
        provider: Arc<dyn DataProvider>,
        symbols: Vec<String>,
        params: RuntimeParams,
    ) -> Self {
        let scheduler = Scheduler::new(strategy, provider, symbols, params.clone());
        Self { scheduler, params }
    }

    pub fn set_explicit_trades(&mut self, trades: Arc<ExplicitTrades>) {
        self.scheduler.set_explicit_trades(trades);
    }

    pub fn set_slippage(&mut self, slippage: Arc<dyn Slippage>) {
        self.scheduler.set_slippage(slippage);
    }

    pub fn set_commission(&mut self, commission: Arc<dyn Commission>) {
        self.scheduler.set_commission(commission);
    }

    pub fn set_order_filter(&mut self, filter: Arc<dyn OrderFilter>) {
        self.scheduler.set_order_filter(filter);
    }

    pub fn add_signal_handler(&mut self, handler: Arc<dyn SignalHandler>) {
        self.scheduler.add_signal_handler(handler);
    }

    pub fn set_chart(&mut self, chart: Arc<dyn ChartSink>) {
        self.scheduler.set_chart(chart);
    }

    pub fn stats(&self) -> Arc<RuntimeStats> {
        self.scheduler.stats()
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.scheduler.cancel_flag()
    }

    pub fn request_cancel(&self) {
        self.scheduler.request_cancel();
    }

    /// Run the whole pipeline.
    pub fn run(mut self) -> Result<SessionResult, SessionError> {
        let RawRunOutput {
            mut positions,
            bars_by_symbol,
            signals,
        } = self.scheduler.run()?;

        // Deterministic container order regardless of worker merge timing.
        positions.sort_by(|a, b| {
            a.entry_time()
                .cmp(&b.entry_time())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let equity = run_equity_pass(
            &mut positions,
            &bars_by_symbol,
            &self.params.range,
            &self.params.position_sizing,
            true,
        )?;

        let runtime_stats = self.scheduler.stats();
        runtime_stats.set_processed_trade_count(positions.enabled_count() as u64);

        let drawdown = DrawdownSet {
            total: DrawdownCurve::from_values(equity.dates(), equity.total()),
            long: DrawdownCurve::from_values(equity.dates(), equity.long()),
            short: DrawdownCurve::from_values(equity.dates(), equity.short()),
        };

        let range = match (equity.dates().first(), equity.dates().last()) {
            (Some(&from), Some(&to)) => EquityDateRange { from, to },
            _ => {
                let today = Utc::now().date_naive();
                EquityDateRange {
                    from: today,
                    to: today,
                }
            }
        };

        let stats = compute_stats(
            &positions,
            &bars_by_symbol,
            &range,
            self.params.position_sizing.initial_capital,
            equity.ending_total(),
            equity.total_pct_exposure(),
            drawdown.total.ulcer_index(),
        )?;

        Ok(SessionResult {
            positions,
            equity,
            drawdown,
            stats,
            runtime: runtime_stats.snapshot(),
            signals,
        })
    }
}
