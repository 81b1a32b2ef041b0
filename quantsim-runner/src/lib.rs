//! QuantSim Runner — session orchestration over the core engine.
//!
//! - Parallel scheduler: a worker pool drives one strategy over many symbols
//!   with cooperative cancellation and live progress counters
//! - Equity curve & position sizing: the post-run pass that finalizes share
//!   counts against a daily cash/equity walk and may disable trades
//! - Drawdown curves and the Ulcer index
//! - Performance statistics (all/long/short/open/closed/buy-and-hold) and
//!   the session score
//! - TOML session configuration and end-to-end result assembly

pub mod config;
pub mod drawdown;
pub mod equity;
pub mod runtime_stats;
pub mod scheduler;
pub mod session;
pub mod stats;
