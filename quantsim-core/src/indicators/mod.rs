//! Technical indicators as free functions over series.
//!
//! Every function returns a new `Series` of the input's effective length with
//! a NaN warm-up prefix; NaN anywhere in a lookback window makes the output
//! NaN at that index. Candle-pattern predicates operate on `Bars` and emit
//! 0/1 series.

pub mod bands;
pub mod candles;
pub mod moving;
pub mod oscillators;

pub use bands::{bollinger_lower, bollinger_middle, bollinger_upper, highest, lowest, std_dev};
pub use candles::{
    bearish_engulfing, black_candles, bullish_engulfing, doji, white_candles,
};
pub use moving::{ema, sma, wilder_smooth};
pub use oscillators::{macd, macd_histogram, macd_signal, momentum, roc, rsi};
