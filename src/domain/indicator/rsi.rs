//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! A zero average loss is a division by zero and surfaces as a fault.
//!
//! Warmup: n + 1 closes (n price changes).

use crate::domain::error::NumericFault;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev_close: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            averages: None,
        }
    }

    pub fn warmup_bars(&self) -> usize {
        self.period + 1
    }

    pub fn update(&mut self, close: f64) -> Result<Option<f64>, NumericFault> {
        let Some(prev) = self.prev_close.replace(close) else {
            return Ok(None);
        };
        if self.period == 0 {
            return Ok(None);
        }

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.period as f64;

        let (avg_gain, avg_loss) = match self.averages {
            Some((prev_gain, prev_loss)) => (
                (prev_gain * (n - 1.0) + gain) / n,
                (prev_loss * (n - 1.0) + loss) / n,
            ),
            None => {
                self.changes += 1;
                self.gain_sum += gain;
                self.loss_sum += loss;
                if self.changes < self.period {
                    return Ok(None);
                }
                (self.gain_sum / n, self.loss_sum / n)
            }
        };
        self.averages = Some((avg_gain, avg_loss));

        if avg_loss == 0.0 {
            return Err(NumericFault::DivisionByZero("rsi"));
        }
        Ok(Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss)))
    }
}
