//! Explicit trades — externally scripted order directives.
//!
//! A directive names a symbol, a timestamp, an action, an order mechanism,
//! a share count, and a price. At the bar whose timestamp matches, the
//! manager issues the directive as if the strategy had placed the order —
//! except that position sizing is bypassed.
//!
//! Two file formats, one directive per line, comments starting with `#` or
//! `//`:
//! - CSV: `symbol, iso-datetime, action, type, shares, price[, id]`
//! - JSON: one object per line with the same fields.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{Bars, OrderType, PositionId, PositionSide};
use crate::engine::manager::{ExitOutcome, PositionsManager};
use crate::engine::signal::SignalKind;
use crate::engine::EngineError;

/// What the directive does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    #[serde(alias = "SELL_SHORT")]
    Short,
    Cover,
    SellAll,
    CoverAll,
    ExitAll,
}

/// Order mechanism named by the directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeOrderKind {
    Market,
    Close,
    Limit,
    Stop,
    /// Declared by the format but without defined semantics; rejected when
    /// applied.
    Price,
}

impl TradeOrderKind {
    fn order_type(self) -> OrderType {
        match self {
            TradeOrderKind::Market => OrderType::Market,
            TradeOrderKind::Close => OrderType::Close,
            TradeOrderKind::Limit => OrderType::Limit,
            TradeOrderKind::Stop => OrderType::Stop,
            TradeOrderKind::Price => OrderType::Price,
        }
    }
}

/// One scripted directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitTrade {
    pub symbol: String,
    pub time: NaiveDateTime,
    pub action: TradeAction,
    #[serde(rename = "type")]
    pub kind: TradeOrderKind,
    pub shares: u64,
    pub price: f64,
    /// Target position for Sell/Cover; without it the directive closes
    /// positions of the matching side in open order.
    #[serde(default)]
    pub id: Option<PositionId>,
}

/// Directives grouped by symbol and timestamp.
#[derive(Debug, Clone, Default)]
pub struct ExplicitTrades {
    by_symbol: HashMap<String, BTreeMap<NaiveDateTime, Vec<ExplicitTrade>>>,
    len: usize,
}

impl ExplicitTrades {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trade: ExplicitTrade) {
        self.by_symbol
            .entry(trade.symbol.clone())
            .or_default()
            .entry(trade.time)
            .or_default()
            .push(trade);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Directives for a symbol at an exact timestamp.
    pub fn at(&self, symbol: &str, time: NaiveDateTime) -> &[ExplicitTrade] {
        self.by_symbol
            .get(symbol)
            .and_then(|m| m.get(&time))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    // ── Parsing ─────────────────────────────────────────────────────────

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::ExplicitTradeParse {
            line: 0,
            reason: e.to_string(),
        })?;
        Self::from_csv_str(&text)
    }

    /// Parse the CSV form. Empty lines and lines starting with `#` or `//`
    /// are skipped.
    pub fn from_csv_str(text: &str) -> Result<Self, EngineError> {
        let mut out = Self::new();
        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let parse = |reason: String| EngineError::ExplicitTradeParse {
                line: line_no + 1,
                reason,
            };

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .trim(csv::Trim::All)
                .from_reader(line.as_bytes());
            let record = match reader.records().next() {
                Some(r) => r.map_err(|e| parse(e.to_string()))?,
                None => continue,
            };
            if record.len() < 6 {
                return Err(parse(format!("expected 6 columns, got {}", record.len())));
            }

            let time: NaiveDateTime = record[1]
                .parse()
                .map_err(|e| parse(format!("bad datetime '{}': {e}", &record[1])))?;
            let action = parse_action(&record[2]).ok_or_else(|| {
                parse(format!("unknown action '{}'", &record[2]))
            })?;
            let kind = parse_kind(&record[3])
                .ok_or_else(|| parse(format!("unknown order type '{}'", &record[3])))?;
            let shares: u64 = record[4]
                .parse()
                .map_err(|e| parse(format!("bad shares '{}': {e}", &record[4])))?;
            let price: f64 = record[5]
                .parse()
                .map_err(|e| parse(format!("bad price '{}': {e}", &record[5])))?;
            let id = if record.len() > 6 && !record[6].is_empty() {
                let raw: u64 = record[6]
                    .parse()
                    .map_err(|e| parse(format!("bad id '{}': {e}", &record[6])))?;
                Some(PositionId(raw))
            } else {
                None
            };

            out.add(ExplicitTrade {
                symbol: record[0].to_string(),
                time,
                action,
                kind,
                shares,
                price,
                id,
            });
        }
        Ok(out)
    }

    /// Parse the JSON-lines form: one object per line, same comment rules.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let mut out = Self::new();
        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let trade: ExplicitTrade =
                serde_json::from_str(line).map_err(|e| EngineError::ExplicitTradeParse {
                    line: line_no + 1,
                    reason: e.to_string(),
                })?;
            out.add(trade);
        }
        Ok(out)
    }

    // ── Application ─────────────────────────────────────────────────────

    /// Issue every directive matching `(bars.symbol, time(bar))` through the
    /// manager, sizing bypassed.
    pub fn apply_at(
        &self,
        manager: &mut PositionsManager,
        bars: &Bars,
        bar: usize,
    ) -> Result<(), EngineError> {
        let time = bars.time(bar)?;
        for trade in self.at(bars.symbol(), time) {
            apply_directive(trade, manager, bars, bar)?;
        }
        Ok(())
    }

    /// Pre-pass over every bar of a symbol; used by the scheduler before the
    /// strategy runs.
    pub fn apply_all(
        &self,
        manager: &mut PositionsManager,
        bars: &Bars,
    ) -> Result<(), EngineError> {
        if !self.has_symbol(bars.symbol()) {
            return Ok(());
        }
        for bar in 0..bars.len() {
            self.apply_at(manager, bars, bar)?;
        }
        Ok(())
    }
}

fn parse_action(s: &str) -> Option<TradeAction> {
    match s.to_ascii_uppercase().as_str() {
        "BUY" => Some(TradeAction::Buy),
        "SELL" => Some(TradeAction::Sell),
        "SHORT" | "SELL_SHORT" => Some(TradeAction::Short),
        "COVER" => Some(TradeAction::Cover),
        "SELL_ALL" => Some(TradeAction::SellAll),
        "COVER_ALL" => Some(TradeAction::CoverAll),
        "EXIT_ALL" => Some(TradeAction::ExitAll),
        _ => None,
    }
}

fn parse_kind(s: &str) -> Option<TradeOrderKind> {
    match s.to_ascii_uppercase().as_str() {
        "MARKET" => Some(TradeOrderKind::Market),
        "CLOSE" => Some(TradeOrderKind::Close),
        "LIMIT" => Some(TradeOrderKind::Limit),
        "STOP" => Some(TradeOrderKind::Stop),
        "PRICE" => Some(TradeOrderKind::Price),
        _ => None,
    }
}

fn apply_directive(
    trade: &ExplicitTrade,
    manager: &mut PositionsManager,
    bars: &Bars,
    bar: usize,
) -> Result<(), EngineError> {
    if trade.kind == TradeOrderKind::Price {
        return Err(EngineError::PriceTypeUnsupported);
    }
    let order_type = trade.kind.order_type();
    let trigger = matches!(order_type, OrderType::Limit | OrderType::Stop).then_some(trade.price);
    let name = "Explicit trade";

    match trade.action {
        TradeAction::Buy => {
            let kind = match trade.kind {
                TradeOrderKind::Market => SignalKind::BuyAtMarket,
                TradeOrderKind::Close => SignalKind::BuyAtClose,
                TradeOrderKind::Limit => SignalKind::BuyAtLimit,
                TradeOrderKind::Stop => SignalKind::BuyAtStop,
                TradeOrderKind::Price => return Err(EngineError::PriceTypeUnsupported),
            };
            manager.enter_unsized(
                bars,
                bar,
                PositionSide::Long,
                kind,
                order_type,
                trigger,
                trade.shares,
                name,
            )?;
        }
        TradeAction::Short => {
            let kind = match trade.kind {
                TradeOrderKind::Market => SignalKind::ShortAtMarket,
                TradeOrderKind::Close => SignalKind::ShortAtClose,
                TradeOrderKind::Limit => SignalKind::ShortAtLimit,
                TradeOrderKind::Stop => SignalKind::ShortAtStop,
                TradeOrderKind::Price => return Err(EngineError::PriceTypeUnsupported),
            };
            manager.enter_unsized(
                bars,
                bar,
                PositionSide::Short,
                kind,
                order_type,
                trigger,
                trade.shares,
                name,
            )?;
        }
        TradeAction::Sell => {
            close_directed(trade, manager, bars, bar, PositionSide::Long, name)?;
        }
        TradeAction::Cover => {
            close_directed(trade, manager, bars, bar, PositionSide::Short, name)?;
        }
        TradeAction::SellAll => {
            close_side(trade, manager, bars, bar, PositionSide::Long, name)?;
        }
        TradeAction::CoverAll => {
            close_side(trade, manager, bars, bar, PositionSide::Short, name)?;
        }
        TradeAction::ExitAll => {
            close_side(trade, manager, bars, bar, PositionSide::Long, name)?;
            close_side(trade, manager, bars, bar, PositionSide::Short, name)?;
        }
    }
    Ok(())
}

fn exit_one(
    trade: &ExplicitTrade,
    manager: &mut PositionsManager,
    bars: &Bars,
    bar: usize,
    id: PositionId,
    side: PositionSide,
    name: &str,
) -> Result<ExitOutcome, EngineError> {
    match (side, trade.kind) {
        (PositionSide::Long, TradeOrderKind::Market) => manager.sell_at_market(bars, bar, id, name),
        (PositionSide::Long, TradeOrderKind::Close) => manager.sell_at_close(bars, bar, id, name),
        (PositionSide::Long, TradeOrderKind::Limit) => {
            manager.sell_at_limit(bars, bar, id, trade.price, name)
        }
        (PositionSide::Long, TradeOrderKind::Stop) => {
            manager.sell_at_stop(bars, bar, id, trade.price, name)
        }
        (PositionSide::Short, TradeOrderKind::Market) => {
            manager.cover_at_market(bars, bar, id, name)
        }
        (PositionSide::Short, TradeOrderKind::Close) => manager.cover_at_close(bars, bar, id, name),
        (PositionSide::Short, TradeOrderKind::Limit) => {
            manager.cover_at_limit(bars, bar, id, trade.price, name)
        }
        (PositionSide::Short, TradeOrderKind::Stop) => {
            manager.cover_at_stop(bars, bar, id, trade.price, name)
        }
        (_, TradeOrderKind::Price) => Err(EngineError::PriceTypeUnsupported),
    }
}

/// Sell/Cover: with an id, close exactly that position; without, walk open
/// positions of the side in open order until the requested shares are
/// covered (whole positions only).
fn close_directed(
    trade: &ExplicitTrade,
    manager: &mut PositionsManager,
    bars: &Bars,
    bar: usize,
    side: PositionSide,
    name: &str,
) -> Result<(), EngineError> {
    if let Some(id) = trade.id {
        exit_one(trade, manager, bars, bar, id, side, name)?;
        return Ok(());
    }
    let mut closed = 0u64;
    for id in manager.container().open_ids() {
        if closed >= trade.shares {
            break;
        }
        let Some(pos) = manager.container().get(id) else {
            continue;
        };
        if pos.side() != side || pos.symbol() != bars.symbol() {
            continue;
        }
        let pos_shares = pos.shares();
        if exit_one(trade, manager, bars, bar, id, side, name)? == ExitOutcome::Closed {
            closed += pos_shares;
        }
    }
    Ok(())
}

fn close_side(
    trade: &ExplicitTrade,
    manager: &mut PositionsManager,
    bars: &Bars,
    bar: usize,
    side: PositionSide,
    name: &str,
) -> Result<(), EngineError> {
    for id in manager.container().open_ids() {
        let Some(pos) = manager.container().get(id) else {
            continue;
        };
        if pos.side() != side || pos.symbol() != bars.symbol() {
            continue;
        }
        exit_one(trade, manager, bars, bar, id, side, name)?;
    }
    Ok(())
}
