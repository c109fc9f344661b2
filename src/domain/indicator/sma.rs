//! Rolling simple moving average over the last n observations.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingSma {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingSma {
    pub fn new(period: usize) -> Self {
        RollingSma {
            period,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }
}
