//! The strategy contract and the runtime context it is bound to.
//!
//! A strategy is a value cloned per symbol. The scheduler calls
//! `init(symbol)` once before `run`; `run` iterates bars and places orders
//! through the bound positions manager; `cleanup` always follows. Between
//! scheduler passes, `begin()` gates the next pass and `again()` requests
//! one.

use std::sync::Arc;

use thiserror::Error;

use crate::chart::ChartSink;
use crate::data::{DataError, DataProvider};
use crate::domain::{Bars, PositionId, SeriesError};
use crate::engine::manager::{EntryOutcome, ExitOutcome, PositionsManager};
use crate::engine::{EngineError, ExplicitTrades};
use crate::params::RuntimeParams;

/// Errors a strategy's `run` may produce.
///
/// `Exit` is the early-termination channel: the scheduler treats it as a
/// normal end of that symbol's run, not an error.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy exit: {0}")]
    Exit(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{0}")]
    Other(String),
}

impl StrategyError {
    /// Shorthand for the early-termination request.
    pub fn exit(message: impl Into<String>) -> Self {
        StrategyError::Exit(message.into())
    }
}

/// A user trading system.
///
/// Instances move between threads but are never shared: the scheduler hands
/// each worker its own prototype clone, and every symbol gets a fresh
/// instance from it. `Send` is therefore the only bound; interior state
/// (`Cell`, `RefCell`) is fine.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Fresh instance for the next symbol; state never leaks across symbols.
    fn clone_strategy(&self) -> Box<dyn Strategy>;

    /// Called once per symbol before `run`; false skips the symbol.
    fn init(&mut self, symbol: &str) -> bool {
        let _ = symbol;
        true
    }

    /// Main body: iterate bars, place orders.
    fn run(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError>;

    /// Called after `run` regardless of outcome.
    fn cleanup(&mut self) {}

    /// Consulted before each scheduler pass; false cancels the pass.
    fn begin(&self) -> bool {
        true
    }

    /// Consulted after a full pass; true runs another.
    fn again(&self) -> bool {
        false
    }
}

/// Everything the runtime provides a strategy while it runs one symbol.
pub struct StrategyContext<'a> {
    bars: Arc<Bars>,
    positions: &'a mut PositionsManager,
    chart: Arc<dyn ChartSink>,
    explicit_trades: Option<Arc<ExplicitTrades>>,
    symbols: Vec<String>,
    provider: Arc<dyn DataProvider>,
    params: &'a RuntimeParams,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        bars: Arc<Bars>,
        positions: &'a mut PositionsManager,
        chart: Arc<dyn ChartSink>,
        explicit_trades: Option<Arc<ExplicitTrades>>,
        symbols: Vec<String>,
        provider: Arc<dyn DataProvider>,
        params: &'a RuntimeParams,
    ) -> Self {
        Self {
            bars,
            positions,
            chart,
            explicit_trades,
            symbols,
            provider,
            params,
        }
    }

    /// The default bars this strategy instance is bound to.
    pub fn bars(&self) -> &Arc<Bars> {
        &self.bars
    }

    pub fn symbol(&self) -> &str {
        self.bars.symbol()
    }

    pub fn positions(&mut self) -> &mut PositionsManager {
        self.positions
    }

    pub fn chart(&self) -> &Arc<dyn ChartSink> {
        &self.chart
    }

    pub fn explicit_trades(&self) -> Option<&Arc<ExplicitTrades>> {
        self.explicit_trades.as_ref()
    }

    /// The session's symbol list (own copy).
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Access to any symbol's data.
    pub fn provider(&self) -> &Arc<dyn DataProvider> {
        &self.provider
    }

    pub fn params(&self) -> &RuntimeParams {
        self.params
    }

    // ── Default-bars order conveniences ─────────────────────────────────

    pub fn buy_at_market(
        &mut self,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.buy_at_market(&bars, bar, shares, name)
    }

    pub fn buy_at_close(
        &mut self,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.buy_at_close(&bars, bar, shares, name)
    }

    pub fn buy_at_stop(
        &mut self,
        bar: usize,
        stop: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.buy_at_stop(&bars, bar, stop, shares, name)
    }

    pub fn buy_at_limit(
        &mut self,
        bar: usize,
        limit: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.buy_at_limit(&bars, bar, limit, shares, name)
    }

    pub fn short_at_market(
        &mut self,
        bar: usize,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.short_at_market(&bars, bar, shares, name)
    }

    pub fn short_at_stop(
        &mut self,
        bar: usize,
        stop: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.short_at_stop(&bars, bar, stop, shares, name)
    }

    pub fn short_at_limit(
        &mut self,
        bar: usize,
        limit: f64,
        shares: u64,
        name: &str,
    ) -> Result<EntryOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.short_at_limit(&bars, bar, limit, shares, name)
    }

    pub fn sell_at_market(
        &mut self,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.sell_at_market(&bars, bar, pos, name)
    }

    pub fn sell_at_stop(
        &mut self,
        bar: usize,
        pos: PositionId,
        stop: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.sell_at_stop(&bars, bar, pos, stop, name)
    }

    pub fn sell_at_limit(
        &mut self,
        bar: usize,
        pos: PositionId,
        limit: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.sell_at_limit(&bars, bar, pos, limit, name)
    }

    pub fn cover_at_market(
        &mut self,
        bar: usize,
        pos: PositionId,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.cover_at_market(&bars, bar, pos, name)
    }

    pub fn cover_at_stop(
        &mut self,
        bar: usize,
        pos: PositionId,
        stop: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.cover_at_stop(&bars, bar, pos, stop, name)
    }

    pub fn cover_at_limit(
        &mut self,
        bar: usize,
        pos: PositionId,
        limit: f64,
        name: &str,
    ) -> Result<ExitOutcome, EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.cover_at_limit(&bars, bar, pos, limit, name)
    }

    pub fn apply_auto_stops(&mut self, bar: usize) -> Result<(), EngineError> {
        let bars = Arc::clone(&self.bars);
        self.positions.apply_auto_stops(&bars, bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::NullChart;
    use crate::data::SymbolsIterator;
    use crate::engine::tests_support::make_bars;
    use crate::params::DateTimeRange;

    struct FixedProvider {
        bars: Arc<Bars>,
    }

    impl DataProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn get_data(
            &self,
            symbol: &str,
            _range: Option<&DateTimeRange>,
        ) -> Result<Arc<Bars>, DataError> {
            if symbol == self.bars.symbol() {
                Ok(Arc::clone(&self.bars))
            } else {
                Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    /// Buys on the first bar, sells on the last.
    struct FirstToLast {
        shares: u64,
    }

    impl Strategy for FirstToLast {
        fn name(&self) -> &str {
            "first_to_last"
        }

        fn clone_strategy(&self) -> Box<dyn Strategy> {
            Box::new(FirstToLast {
                shares: self.shares,
            })
        }

        fn run(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
            let last = ctx.bars().len() - 1;
            if let Some(id) = ctx.buy_at_market(0, self.shares, "entry")?.position_id() {
                ctx.sell_at_market(last, id, "exit")?;
            }
            Ok(())
        }
    }

    #[test]
    fn strategy_runs_through_context() {
        let bars = Arc::new(make_bars(
            "SPY",
            &[
                (100.0, 110.0, 99.0, 105.0, 1000.0),
                (106.0, 112.0, 104.0, 110.0, 1000.0),
                (111.0, 115.0, 108.0, 114.0, 1000.0),
            ],
        ));
        let provider = Arc::new(FixedProvider {
            bars: Arc::clone(&bars),
        });
        let params = RuntimeParams::default();
        let symbols = SymbolsIterator::new(vec!["SPY".into()]);
        let mut manager = PositionsManager::new("first_to_last");

        let mut strategy = FirstToLast { shares: 10 };
        assert!(strategy.init("SPY"));
        let mut ctx = StrategyContext::new(
            Arc::clone(&bars),
            &mut manager,
            Arc::new(NullChart),
            None,
            symbols.symbols(),
            provider,
            &params,
        );
        strategy.run(&mut ctx).unwrap();
        strategy.cleanup();

        let container = manager.into_container();
        assert_eq!(container.len(), 1);
        let pos = container.iter().next().unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.entry_price(), 100.0);
        assert_eq!(pos.close_price().unwrap(), 111.0);
    }

    #[test]
    fn exit_error_is_distinguishable() {
        let err = StrategyError::exit("done early");
        assert!(matches!(err, StrategyError::Exit(_)));
    }
}
