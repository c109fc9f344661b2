//! Slow stochastic oscillator.
//!
//! raw %K = 100 * (C - LL(n)) / (HH(n) - LL(n))
//! %K = SMA(raw %K, 3), %D = SMA(%K, 3)
//!
//! A window with HH == LL has no range to divide by and is reported as a
//! numeric fault rather than patched with a substitute value.

use std::collections::VecDeque;

use crate::domain::error::NumericFault;
use crate::domain::indicator::RollingSma;
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_SMOOTHING: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticValue {
    pub k: f64,
    pub d: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    k_smoothing: RollingSma,
    d_smoothing: RollingSma,
}

impl Stochastic {
    pub fn new(period: usize) -> Self {
        Stochastic {
            period,
            highs: VecDeque::with_capacity(period + 1),
            lows: VecDeque::with_capacity(period + 1),
            k_smoothing: RollingSma::new(DEFAULT_SMOOTHING),
            d_smoothing: RollingSma::new(DEFAULT_SMOOTHING),
        }
    }

    /// Bars until %D is available.
    pub fn warmup_bars(&self) -> usize {
        self.period + self.k_smoothing.period() - 1 + self.d_smoothing.period() - 1
    }

    pub fn update(&mut self, bar: &OhlcvBar) -> Result<Option<StochasticValue>, NumericFault> {
        if self.period == 0 {
            return Ok(None);
        }
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);
        if self.highs.len() > self.period {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        if self.highs.len() < self.period {
            return Ok(None);
        }

        let highest = self.highs.iter().copied().fold(f64::MIN, f64::max);
        let lowest = self.lows.iter().copied().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range == 0.0 {
            return Err(NumericFault::DivisionByZero("stochastic"));
        }

        let raw_k = 100.0 * (bar.close - lowest) / range;
        Ok(self.k_smoothing.update(raw_k).map(|k| StochasticValue {
            k,
            d: self.d_smoothing.update(k),
        }))
    }
}
