//! The parallel scheduler: one strategy, many symbols, a pool of workers.
//!
//! Each worker repeatedly claims the next symbol from the shared iterator,
//! fetches its bars, clones the strategy, pre-applies any explicit trades,
//! and runs `init → run → cleanup`. Per-symbol containers merge into the
//! session container as symbols complete. Cancellation is cooperative: the
//! flag is polled between symbols, never mid-bar, and partially processed
//! passes keep only fully completed symbols.
//!
//! After a full pass the strategy's `again()` may request another; `begin()`
//! gates every pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use quantsim_core::chart::{ChartSink, NullChart};
use quantsim_core::data::{DataProvider, SymbolsIterator};
use quantsim_core::domain::{Bars, PositionsContainer};
use quantsim_core::engine::costs::{Commission, NullCommission, NullSlippage, Slippage};
use quantsim_core::engine::filter::OrderFilter;
use quantsim_core::engine::manager::PositionsManager;
use quantsim_core::engine::signal::{CollectingSignalHandler, Signal, SignalHandler};
use quantsim_core::engine::ExplicitTrades;
use quantsim_core::params::RuntimeParams;
use quantsim_core::strategy::{Strategy, StrategyContext, StrategyError};

use crate::runtime_stats::{make_session_id, RuntimeStats, SessionStatus};

/// Errors that abort the whole scheduler (per-symbol failures only count).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Everything a raw simulation pass produces.
#[derive(Debug)]
pub struct RawRunOutput {
    /// All symbols' positions merged, unsized.
    pub positions: PositionsContainer,
    /// Bars fetched during the run, keyed by symbol.
    pub bars_by_symbol: HashMap<String, Arc<Bars>>,
    /// Signals emitted for orders past the last bar.
    pub signals: Vec<Signal>,
}

/// Drives one strategy over a symbol list with a worker pool.
pub struct Scheduler {
    strategy: Box<dyn Strategy>,
    provider: Arc<dyn DataProvider>,
    symbols: Arc<SymbolsIterator>,
    params: RuntimeParams,
    explicit_trades: Option<Arc<ExplicitTrades>>,
    slippage: Arc<dyn Slippage>,
    commission: Arc<dyn Commission>,
    order_filter: Option<Arc<dyn OrderFilter>>,
    signal_handlers: Vec<Arc<dyn SignalHandler>>,
    chart: Arc<dyn ChartSink>,
    stats: Arc<RuntimeStats>,
    cancel: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        strategy: Box<dyn Strategy>,
        provider: Arc<dyn DataProvider>,
        symbols: Vec<String>,
        params: RuntimeParams,
    ) -> Self {
        let session_id = make_session_id(strategy.name(), &symbols, &params);
        let total = symbols.len() as u64;
        Self {
            strategy,
            provider,
            symbols: Arc::new(SymbolsIterator::new(symbols)),
            params,
            explicit_trades: None,
            slippage: Arc::new(NullSlippage),
            commission: Arc::new(NullCommission),
            order_filter: None,
            signal_handlers: Vec::new(),
            chart: Arc::new(NullChart),
            stats: Arc::new(RuntimeStats::new(session_id, total, 1)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_explicit_trades(&mut self, trades: Arc<ExplicitTrades>) {
        self.explicit_trades = Some(trades);
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

    pub fn set_chart(&mut self, chart: Arc<dyn ChartSink>) {
        self.chart = chart;
    }

    /// Live progress counters; safe to read from any thread.
    pub fn stats(&self) -> Arc<RuntimeStats> {
        Arc::clone(&self.stats)
    }

    /// Cooperative cancel flag; setting it stops the run between symbols.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn request_cancel(&self) {
        self.stats.set_status(SessionStatus::Canceling);
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn thread_count(&self) -> usize {
        let symbols = self.symbols.len().max(1);
        if self.params.threads > 0 {
            (self.params.threads as usize).min(symbols).max(1)
        } else {
            let hw = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            hw.min(symbols).max(1)
        }
    }

    /// Run every pass to completion (or cancellation) and return the merged
    /// raw output.
    pub fn run(&mut self) -> Result<RawRunOutput, SchedulerError> {
        let threads = self.thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SchedulerError::Pool(e.to_string()))?;

        let core_ids = if self.params.cpu_affinity {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        // Internal collector so the session always sees emitted signals,
        // alongside any user handlers.
        let collector = Arc::new(CollectingSignalHandler::new());
        let mut handlers = self.signal_handlers.clone();
        handlers.push(collector.clone() as Arc<dyn SignalHandler>);

        let merged: Mutex<PositionsContainer> = Mutex::new(PositionsContainer::new());
        let fetched: Mutex<HashMap<String, Arc<Bars>>> = Mutex::new(HashMap::new());

        self.stats.set_status(SessionStatus::Running);

        let symbol_count = self.symbols.len() as u64;
        let mut pass = 0u64;
        loop {
            if !self.strategy.begin() {
                debug!(pass, "strategy declined the pass");
                break;
            }
            self.symbols.reset();
            self.stats.pass_started(symbol_count);

            // Strategies are Send but not necessarily Sync, so a shared
            // reference must not cross threads: each worker takes an owned
            // prototype out of its slot and clones per symbol from that.
            let prototypes: Vec<Mutex<Option<Box<dyn Strategy>>>> = (0..threads)
                .map(|_| Mutex::new(Some(self.strategy.clone_strategy())))
                .collect();

            let worker = Worker {
                prototypes: &prototypes,
                provider: &self.provider,
                symbols: &self.symbols,
                params: &self.params,
                explicit_trades: self.explicit_trades.as_ref(),
                slippage: &self.slippage,
                commission: &self.commission,
                order_filter: self.order_filter.as_ref(),
                signal_handlers: &handlers,
                chart: &self.chart,
                stats: &self.stats,
                cancel: &self.cancel,
                merged: &merged,
                fetched: &fetched,
                pass,
                symbol_count,
                core_ids: &core_ids,
            };
            pool.broadcast(|ctx| worker.run(ctx.index()));

            if self.cancel.load(Ordering::Relaxed) {
                self.stats.set_status(SessionStatus::Canceled);
                self.stats.set_message("canceled");
                break;
            }
            if !self.strategy.again() {
                break;
            }
            pass += 1;
        }

        if self.stats.status() != SessionStatus::Canceled {
            self.stats.set_status(SessionStatus::Ended);
        }

        Ok(RawRunOutput {
            positions: merged.into_inner().unwrap(),
            bars_by_symbol: fetched.into_inner().unwrap(),
            signals: collector.take(),
        })
    }
}

/// Borrowed view of the scheduler state shared by pool workers.
///
/// One prototype slot per worker; `run` empties the slot for its own index,
/// so no strategy instance is ever touched by two threads.
struct Worker<'a> {
    prototypes: &'a [Mutex<Option<Box<dyn Strategy>>>],
    provider: &'a Arc<dyn DataProvider>,
    symbols: &'a Arc<SymbolsIterator>,
    params: &'a RuntimeParams,
    explicit_trades: Option<&'a Arc<ExplicitTrades>>,
    slippage: &'a Arc<dyn Slippage>,
    commission: &'a Arc<dyn Commission>,
    order_filter: Option<&'a Arc<dyn OrderFilter>>,
    signal_handlers: &'a [Arc<dyn SignalHandler>],
    chart: &'a Arc<dyn ChartSink>,
    stats: &'a Arc<RuntimeStats>,
    cancel: &'a AtomicBool,
    merged: &'a Mutex<PositionsContainer>,
    fetched: &'a Mutex<HashMap<String, Arc<Bars>>>,
    pass: u64,
    symbol_count: u64,
    core_ids: &'a [core_affinity::CoreId],
}

impl Worker<'_> {
    fn run(&self, worker_index: usize) {
        if !self.core_ids.is_empty() {
            let id = self.core_ids[worker_index % self.core_ids.len()];
            core_affinity::set_for_current(id);
        }

        let prototype = self
            .prototypes
            .get(worker_index)
            .and_then(|slot| slot.lock().unwrap().take());
        let Some(prototype) = prototype else {
            return;
        };

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let Some(symbol) = self.symbols.next() else {
                break;
            };
            self.stats.set_current_symbol(symbol);
            self.process_symbol(symbol, prototype.as_ref());
        }
    }

    fn process_symbol(&self, symbol: &str, prototype: &dyn Strategy) {
        let bars = match self.provider.get_data(symbol, Some(&self.params.range)) {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!(symbol, "no bars in range");
                self.stats.symbol_errored();
                return;
            }
            Err(e) => {
                warn!(symbol, error = %e, "data fetch failed");
                self.stats.symbol_errored();
                return;
            }
        };
        self.fetched
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::clone(&bars));

        let mut strategy = prototype.clone_strategy();
        if !strategy.init(symbol) {
            debug!(symbol, "strategy skipped symbol");
            self.stats.symbol_processed(bars.len() as u64, 0, 0);
            return;
        }

        let ordinal = self.symbols.ordinal(symbol).unwrap_or(0) as u64;
        let id_base = (self.pass * self.symbol_count + ordinal + 1) << 32;

        let mut manager =
            PositionsManager::new(strategy.name().to_string()).with_id_base(id_base);
        manager.set_slippage(Arc::clone(self.slippage));
        manager.set_commission(Arc::clone(self.commission));
        if let Some(filter) = self.order_filter {
            manager.set_order_filter(Arc::clone(filter));
        }
        for handler in self.signal_handlers {
            manager.add_signal_handler(Arc::clone(handler));
        }
        manager.set_start_trades(self.params.start_trades);

        if let Some(trades) = self.explicit_trades {
            if let Err(e) = trades.apply_all(&mut manager, &bars) {
                warn!(symbol, error = %e, "explicit trades failed");
                self.stats.symbol_errored();
                strategy.cleanup();
                return;
            }
        }

        let mut ctx = StrategyContext::new(
            Arc::clone(&bars),
            &mut manager,
            Arc::clone(self.chart),
            self.explicit_trades.cloned(),
            self.symbols.symbols(),
            Arc::clone(self.provider),
            self.params,
        );
        let outcome = strategy.run(&mut ctx);
        strategy.cleanup();

        match outcome {
            Ok(()) => {}
            Err(StrategyError::Exit(message)) => {
                debug!(symbol, message, "strategy exited early");
            }
            Err(e) => {
                warn!(symbol, error = %e, "strategy run failed");
                self.stats.symbol_errored();
                return;
            }
        }

        let signals = manager.signal_count();
        let mut container = manager.into_container();
        let trades = container.len() as u64;
        self.merged.lock().unwrap().append(&mut container);
        self.stats
            .symbol_processed(bars.len() as u64, trades, signals);
    }
}
