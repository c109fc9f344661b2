//! Rolling pivot-point support/resistance levels.
//!
//! The window holds the last `period` highs, lows and closes. Levels are
//! derived from the window's highest high, lowest low and latest close:
//!
//! ```text
//! P  = (H + L + C) / 3
//! R1 = 2P - L          S1 = 2P - H
//! R2 = P + (H - L)     S2 = P - (H - L)
//! R3 = P + 2(H - L)    S3 = P - 2(H - L)
//! ```
//!
//! Until the window is full every level is 0.0, the "unset" sentinel.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
    pub r3: f64,
    pub s3: f64,
}

impl PivotLevels {
    pub const UNSET: PivotLevels = PivotLevels {
        pivot: 0.0,
        r1: 0.0,
        s1: 0.0,
        r2: 0.0,
        s2: 0.0,
        r3: 0.0,
        s3: 0.0,
    };

    pub fn is_set(&self) -> bool {
        self.pivot != 0.0
    }
}

#[derive(Debug, Clone)]
pub struct PivotCalculator {
    period: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    closes: VecDeque<f64>,
}

impl PivotCalculator {
    pub fn new(period: usize) -> Self {
        PivotCalculator {
            period,
            highs: VecDeque::with_capacity(period + 1),
            lows: VecDeque::with_capacity(period + 1),
            closes: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn len(&self) -> usize {
        self.highs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.highs.len() >= self.period
    }

    /// Lengths of the high, low and close buffers.
    pub fn buffer_lens(&self) -> (usize, usize, usize) {
        (self.highs.len(), self.lows.len(), self.closes.len())
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) {
        self.highs.push_back(high);
        self.lows.push_back(low);
        self.closes.push_back(close);
        if self.highs.len() > self.period {
            self.highs.pop_front();
            self.lows.pop_front();
            self.closes.pop_front();
        }
    }

    pub fn compute(&self) -> PivotLevels {
        if self.highs.len() < self.period {
            return PivotLevels::UNSET;
        }
        let Some(&close) = self.closes.back() else {
            return PivotLevels::UNSET;
        };

        let high = self.highs.iter().copied().fold(f64::MIN, f64::max);
        let low = self.lows.iter().copied().fold(f64::MAX, f64::min);
        let range = high - low;
        let pivot = (high + low + close) / 3.0;

        PivotLevels {
            pivot,
            r1: 2.0 * pivot - low,
            s1: 2.0 * pivot - high,
            r2: pivot + range,
            s2: pivot - range,
            r3: pivot + 2.0 * range,
            s3: pivot - 2.0 * range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unset_before_window_fills() {
        let mut calc = PivotCalculator::new(3);
        assert_eq!(calc.compute(), PivotLevels::UNSET);
        calc.update(10.0, 8.0, 9.0);
        calc.update(12.0, 9.0, 11.0);
        assert_eq!(calc.compute(), PivotLevels::UNSET);
        assert!(!calc.compute().is_set());
    }

    #[test]
    fn three_bar_window() {
        let mut calc = PivotCalculator::new(3);
        calc.update(10.0, 8.0, 9.0);
        calc.update(12.0, 9.0, 11.0);
        calc.update(11.0, 8.0, 10.0);

        let levels = calc.compute();
        assert_relative_eq!(levels.pivot, 10.0);
        assert_relative_eq!(levels.r1, 12.0);
        assert_relative_eq!(levels.s1, 8.0);
        assert_relative_eq!(levels.r2, 14.0);
        assert_relative_eq!(levels.s2, 6.0);
        assert_relative_eq!(levels.r3, 18.0);
        assert_relative_eq!(levels.s3, 2.0);
    }

    #[test]
    fn oldest_bar_is_evicted() {
        let mut calc = PivotCalculator::new(2);
        calc.update(100.0, 1.0, 50.0);
        calc.update(12.0, 9.0, 11.0);
        calc.update(11.0, 8.0, 10.0);

        assert_eq!(calc.len(), 2);
        let levels = calc.compute();
        // window is now highs [12, 11], lows [9, 8], close 10
        assert_relative_eq!(levels.pivot, 10.0);
        assert_relative_eq!(levels.r1, 12.0);
        assert_relative_eq!(levels.s1, 8.0);
    }

    #[test]
    fn buffers_stay_aligned() {
        let mut calc = PivotCalculator::new(4);
        for i in 0..10 {
            let x = i as f64;
            calc.update(x + 1.0, x - 1.0, x);
            let (h, l, c) = calc.buffer_lens();
            assert_eq!(h, l);
            assert_eq!(l, c);
            assert_eq!(h, (i + 1).min(4));
        }
        assert!(calc.is_full());
    }

    #[test]
    fn period_1_uses_latest_bar_only() {
        let mut calc = PivotCalculator::new(1);
        calc.update(30.0, 24.0, 27.0);
        let levels = calc.compute();
        assert_relative_eq!(levels.pivot, 27.0);
        assert_relative_eq!(levels.r1, 30.0);
        assert_relative_eq!(levels.s1, 24.0);
    }
}
