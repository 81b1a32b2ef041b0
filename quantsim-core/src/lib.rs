//! QuantSim Core — engine, domain types, indicators, strategy contract.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, series, synchronizers, positions, containers)
//! - Positions engine: order placement, OHLC fill rules, slippage/commission,
//!   auto-stops, signals past the last bar, explicit trade scripts
//! - Technical indicators as free functions over series
//! - The five-method strategy contract and its runtime context
//! - Data-provider and symbols-source abstractions consumed by the scheduler

pub mod chart;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod params;
pub mod strategy;
