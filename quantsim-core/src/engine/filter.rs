//! Order filter — a veto/resize hook consulted before orders commit.

use crate::domain::{Bars, PositionId};
use crate::engine::signal::SignalKind;

/// Hook that sees every order before it is committed.
///
/// Entries may be resized (returning 0 rejects); exits may be suppressed.
/// Filters are shared across scheduler workers and must synchronize
/// internally if they keep state.
pub trait OrderFilter: Send + Sync {
    /// Adjusted share count for an entry; 0 rejects the order.
    fn on_entry(
        &self,
        kind: SignalKind,
        bars: &Bars,
        bar: usize,
        shares: u64,
        price: Option<f64>,
        name: &str,
    ) -> u64 {
        let _ = (kind, bars, bar, price, name);
        shares
    }

    /// False suppresses the exit.
    fn on_exit(
        &self,
        kind: SignalKind,
        bars: &Bars,
        bar: usize,
        position: PositionId,
        price: Option<f64>,
        name: &str,
    ) -> bool {
        let _ = (kind, bars, bar, position, price, name);
        true
    }
}

/// Filter that lets everything through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFilter;

impl OrderFilter for PassthroughFilter {}
