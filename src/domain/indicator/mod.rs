//! Streaming technical indicators.
//!
//! Every indicator consumes one observation per bar and yields a value only
//! once its own warmup is complete. [`IndicatorSet`] bundles the indicators the
//! strategy votes on and reports a snapshot only when all of them are ready.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use ema::Ema;
pub use macd::{Macd, MacdValue};
pub use rsi::Rsi;
pub use sma::RollingSma;
pub use stochastic::{Stochastic, StochasticValue};

use crate::domain::error::NumericFault;
use crate::domain::ohlcv::OhlcvBar;

/// Indicator readings for one bar, available once every indicator is warm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub rsi: f64,
}

#[derive(Debug, Clone)]
pub struct IndicatorSet {
    fast_ema: Ema,
    slow_ema: Ema,
    stochastic: Stochastic,
    macd: Macd,
    rsi: Rsi,
}

impl IndicatorSet {
    pub fn new(
        fast_ema_period: usize,
        slow_ema_period: usize,
        stoch_period: usize,
        rsi_period: usize,
    ) -> Self {
        IndicatorSet {
            fast_ema: Ema::new(fast_ema_period),
            slow_ema: Ema::new(slow_ema_period),
            stochastic: Stochastic::new(stoch_period),
            macd: Macd::default(),
            rsi: Rsi::new(rsi_period),
        }
    }

    /// Feed one bar through every indicator.
    ///
    /// All indicators are updated even while some are still warming up, so the
    /// first snapshot appears on the bar where the slowest one becomes ready.
    pub fn update(&mut self, bar: &OhlcvBar) -> Result<Option<IndicatorSnapshot>, NumericFault> {
        let fast = self.fast_ema.update(bar.close);
        let slow = self.slow_ema.update(bar.close);
        let stoch = self.stochastic.update(bar)?;
        let macd = self.macd.update(bar.close);
        let rsi = self.rsi.update(bar.close)?;

        let snapshot = match (fast, slow, stoch, macd, rsi) {
            (
                Some(fast_ema),
                Some(slow_ema),
                Some(StochasticValue { k, d: Some(d) }),
                Some(macd),
                Some(rsi),
            ) => Some(IndicatorSnapshot {
                fast_ema,
                slow_ema,
                stoch_k: k,
                stoch_d: d,
                macd_line: macd.line,
                macd_signal: macd.signal,
                rsi,
            }),
            _ => None,
        };
        Ok(snapshot)
    }

    /// Number of bars consumed before the first snapshot is produced.
    pub fn warmup_bars(&self) -> usize {
        [
            self.fast_ema.warmup_bars(),
            self.slow_ema.warmup_bars(),
            self.stochastic.warmup_bars(),
            self.macd.warmup_bars(),
            self.rsi.warmup_bars(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}
