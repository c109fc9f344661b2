//! Position sizing bounded by net exposure.
//!
//! The desired quantity is a percentage of cash converted at the current price.
//! Headroom is what remains before the net position magnitude reaches
//! `max_positions` in the direction of the trade. When flooring leaves nothing
//! but headroom remains, a single unit is traded instead of none.

pub const DEFAULT_PERCENT: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub percent: f64,
    pub max_positions: i64,
}

impl PositionSizer {
    pub fn new(percent: f64, max_positions: i64) -> Self {
        PositionSizer {
            percent,
            max_positions,
        }
    }

    pub fn headroom(&self, current_position: i64, is_buy: bool) -> i64 {
        if is_buy {
            self.max_positions - current_position
        } else {
            self.max_positions + current_position
        }
    }

    pub fn size(&self, cash: f64, price: f64, current_position: i64, is_buy: bool) -> i64 {
        if price <= 0.0 {
            return 0;
        }
        let desired = cash * self.percent / 100.0 / price;
        let headroom = self.headroom(current_position, is_buy);
        let size = desired.min(headroom as f64).floor();

        if size > 0.0 {
            size as i64
        } else if headroom > 0 {
            1
        } else {
            0
        }
    }
}
