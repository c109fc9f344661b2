//! pivotrader: pivot-point and indicator-vote trading strategy with a
//! simulated broker, backtests and a genetic parameter search.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
