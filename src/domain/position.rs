//! Net position in the traded instrument and closed-trade records.

use chrono::NaiveDateTime;

use super::order::Side;

/// Signed net quantity with its average entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub quantity: i64,
    pub avg_price: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Apply a signed quantity change at `price`.
    ///
    /// Returns `(closed_quantity, realized_pnl)` for the part of the change
    /// that reduced existing exposure. Adding to a position moves the average
    /// price; reducing it leaves the average untouched; crossing zero opens the
    /// remainder at `price`.
    pub fn apply(&mut self, delta: i64, price: f64) -> (i64, f64) {
        if delta == 0 {
            return (0, 0.0);
        }
        if self.quantity == 0 || self.quantity.signum() == delta.signum() {
            let new_qty = self.quantity + delta;
            let cost = self.quantity as f64 * self.avg_price + delta as f64 * price;
            self.avg_price = cost / new_qty as f64;
            self.quantity = new_qty;
            return (0, 0.0);
        }

        let closed = delta.abs().min(self.quantity.abs());
        let realized = closed as f64 * (price - self.avg_price) * self.quantity.signum() as f64;
        self.quantity += delta;
        if self.quantity == 0 {
            self.avg_price = 0.0;
        } else if self.quantity.signum() == delta.signum() {
            self.avg_price = price;
        }
        (closed, realized)
    }
}

/// A round trip from flat back to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    /// Largest absolute size reached while open.
    pub peak_quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
}
