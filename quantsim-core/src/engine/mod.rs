//! The positions engine: order placement, fills, auto-stops, signals,
//! explicit trades.

pub mod auto_stops;
pub mod costs;
pub mod explicit;
pub mod filter;
pub mod manager;
pub mod signal;

pub use auto_stops::{
    AutoStops, LevelStop, SideSelect, TimeBasedExit, TimeExitMechanism, TrailingStop,
};
pub use costs::{
    Commission, FlatCommission, NullCommission, NullSlippage, PctSlippage, PerShareCommission,
    Slippage,
};
pub use explicit::{ExplicitTrade, ExplicitTrades, TradeAction, TradeOrderKind};
pub use filter::{OrderFilter, PassthroughFilter};
pub use manager::{EntryOutcome, ExitOutcome, PositionsManager};
pub use signal::{CollectingSignalHandler, Signal, SignalHandler, SignalKind};

use thiserror::Error;

use crate::data::DataError;
use crate::domain::PositionId;

/// Errors surfaced by order placement and explicit-trade application.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("invalid stop price {0}")]
    InvalidStopPrice(f64),

    #[error("invalid limit price {0}")]
    InvalidLimitPrice(f64),

    #[error("position {0} is already closed")]
    ClosingAlreadyClosedPosition(PositionId),

    #[error("sell order applied to short position {0}")]
    SellingShortPosition(PositionId),

    #[error("cover order applied to long position {0}")]
    CoveringLongPosition(PositionId),

    #[error("position {id} belongs to '{position_symbol}', not '{bars_symbol}'")]
    ClosingPositionOnDifferentSymbol {
        id: PositionId,
        position_symbol: String,
        bars_symbol: String,
    },

    #[error("unknown position id {0}")]
    UnknownPosition(PositionId),

    #[error("order at bar {0} is past the last bar and no signal handler is registered")]
    NoSignalHandler(usize),

    #[error("explicit trade order type 'price' is not supported")]
    PriceTypeUnsupported,

    #[error("explicit trade parse error at line {line}: {reason}")]
    ExplicitTradeParse { line: usize, reason: String },
}

#[cfg(test)]
pub(crate) mod tests_support {
    use chrono::NaiveDate;

    use crate::domain::{Bar, Bars, ErrorHandlingMode};

    /// Bars from `(open, high, low, close, volume)` rows, one per day from
    /// 2024-01-02.
    pub(crate) fn make_bars(symbol: &str, ohlcv: &[(f64, f64, f64, f64, f64)]) -> Bars {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = ohlcv
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close, volume))| Bar {
                time: (base + chrono::Duration::days(i as i64))
                    .and_hms_opt(16, 0, 0)
                    .unwrap(),
                open,
                high,
                low,
                close,
                volume,
                open_interest: 0.0,
                extra: None,
            })
            .collect();
        Bars::new(symbol, bars, ErrorHandlingMode::Fatal).unwrap()
    }
}
