//! Cash, net position, trade accounting and equity tracking for one run.

use chrono::NaiveDateTime;

use super::order::Side;
use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub at: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct OpenTrade {
    side: Side,
    opened_at: NaiveDateTime,
    peak_quantity: i64,
    entry_price: f64,
    exit_quantity: i64,
    exit_value: f64,
    gross_pnl: f64,
    commission: f64,
}

impl OpenTrade {
    fn new(side: Side, at: NaiveDateTime, quantity: i64, price: f64, commission: f64) -> Self {
        OpenTrade {
            side,
            opened_at: at,
            peak_quantity: quantity,
            entry_price: price,
            exit_quantity: 0,
            exit_value: 0.0,
            gross_pnl: 0.0,
            commission,
        }
    }

    fn close(self, at: NaiveDateTime) -> ClosedTrade {
        let exit_price = if self.exit_quantity > 0 {
            self.exit_value / self.exit_quantity as f64
        } else {
            0.0
        };
        ClosedTrade {
            side: self.side,
            opened_at: self.opened_at,
            closed_at: at,
            peak_quantity: self.peak_quantity,
            entry_price: self.entry_price,
            exit_price,
            gross_pnl: self.gross_pnl,
            commission: self.commission,
            net_pnl: self.gross_pnl - self.commission,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Position,
    open_trade: Option<OpenTrade>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: Position::default(),
            open_trade: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_open_trade(&self) -> bool {
        self.open_trade.is_some()
    }

    /// Book one fill. Buys debit value plus commission, sells credit value
    /// minus commission. Returns the trade closed by this fill, if any.
    pub fn apply_fill(
        &mut self,
        side: Side,
        quantity: i64,
        price: f64,
        commission: f64,
        at: NaiveDateTime,
    ) -> Option<ClosedTrade> {
        if quantity <= 0 {
            return None;
        }
        let delta = side.sign() * quantity;
        self.cash -= delta as f64 * price + commission;

        let was_flat = self.position.is_flat();
        let (closed, realized) = self.position.apply(delta, price);

        if was_flat {
            self.open_trade = Some(OpenTrade::new(side, at, quantity, price, commission));
            return None;
        }

        let trade = self
            .open_trade
            .get_or_insert_with(|| OpenTrade::new(side.opposite(), at, 0, price, 0.0));

        if closed == 0 {
            trade.commission += commission;
            trade.peak_quantity = trade.peak_quantity.max(self.position.quantity.abs());
            return None;
        }

        let closing_share = closed as f64 / quantity as f64;
        trade.commission += commission * closing_share;
        trade.gross_pnl += realized;
        trade.exit_quantity += closed;
        trade.exit_value += closed as f64 * price;

        if self.position.is_flat() {
            let done = self.open_trade.take()?.close(at);
            self.closed_trades.push(done.clone());
            return Some(done);
        }

        if self.position.quantity.signum() == delta.signum() {
            // crossed zero; the remainder starts a new trade
            let done = self.open_trade.take()?.close(at);
            self.closed_trades.push(done.clone());
            let remainder = self.position.quantity.abs();
            self.open_trade = Some(OpenTrade::new(
                side,
                at,
                remainder,
                price,
                commission * (1.0 - closing_share),
            ));
            return Some(done);
        }

        None
    }

    /// Cash plus signed position marked at `price`.
    pub fn value(&self, price: f64) -> f64 {
        self.cash + self.position.quantity as f64 * price
    }

    pub fn record_equity(&mut self, at: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { at, equity });
    }
}
