//! Core domain types and trading logic.

pub mod error;
pub mod ohlcv;
pub mod indicator;
pub mod pivot;
pub mod signal;
pub mod sizer;
pub mod order;
pub mod journal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod balance;
pub mod config_validation;
