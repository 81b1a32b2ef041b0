//! Runtime and position-sizing parameters.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ErrorHandlingMode;

/// Half-open-ended datetime range; `None` bounds mean ±infinity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateTimeRange {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl DateTimeRange {
    pub fn new(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.from.map_or(true, |from| t >= from) && self.to.map_or(true, |to| t <= to)
    }

    /// Upper bound clamped to the current wall clock.
    pub fn to_clamped_to_now(&self) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        match self.to {
            Some(to) if to < now => to,
            _ => now,
        }
    }
}

/// Cap on simultaneously open positions across all symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxOpenPositions {
    #[default]
    Unlimited,
    Limit(u64),
}

impl MaxOpenPositions {
    pub fn allows(&self, open_count: u64) -> bool {
        match self {
            MaxOpenPositions::Unlimited => true,
            MaxOpenPositions::Limit(max) => open_count < *max,
        }
    }
}

/// How the sizing pass derives the target share count for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosSizeType {
    /// Keep the share count the strategy asked for.
    #[default]
    SystemDefined,
    /// A fixed number of shares.
    Shares,
    /// A fixed cash value.
    Value,
    /// A percentage of total equity at the entry event.
    PctEquity,
    /// A percentage of available cash at the entry event.
    PctCash,
}

/// Secondary cap applied after the size type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosSizeLimitType {
    #[default]
    None,
    /// Percent of the prior bar's volume.
    PctVolume,
    /// Absolute cash cap on the entry value.
    Value,
}

/// Position-sizing policy applied by the equity pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizingParams {
    pub initial_capital: f64,
    pub max_open_positions: MaxOpenPositions,
    pub size_type: PosSizeType,
    pub size: f64,
    pub limit_type: PosSizeLimitType,
    pub limit: f64,
}

impl Default for PositionSizingParams {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_open_positions: MaxOpenPositions::Unlimited,
            size_type: PosSizeType::SystemDefined,
            size: 0.0,
            limit_type: PosSizeLimitType::None,
            limit: 0.0,
        }
    }
}

/// Session-level runtime parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeParams {
    /// Worker count; 0 lets the scheduler pick
    /// `min(available_parallelism, symbol_count)`.
    pub threads: u32,
    /// Pin each worker to a CPU core.
    pub cpu_affinity: bool,
    /// Date range requested for the session.
    pub range: DateTimeRange,
    /// Entries earlier than this are rejected outright.
    pub start_trades: Option<NaiveDateTime>,
    pub data_error_handling: ErrorHandlingMode,
    pub position_sizing: PositionSizingParams,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            threads: 0,
            cpu_affinity: false,
            range: DateTimeRange::unbounded(),
            start_trades: None,
            data_error_handling: ErrorHandlingMode::Fatal,
            position_sizing: PositionSizingParams::default(),
        }
    }
}
