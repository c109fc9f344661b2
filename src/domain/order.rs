//! Bracket orders, their status events and the realized-trade counters.
//!
//! An entry is always a market order with two attached protective legs. Each
//! leg is reported separately by the execution host; the engine keeps a single
//! pending slot that any terminal status clears.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Entry,
    Stop,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderHandle(pub u64);

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Market entry plus stop and limit exit legs on the opposite side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketRequest {
    pub side: Side,
    pub stop_price: f64,
    pub limit_price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub side: Side,
    pub price: f64,
    pub quantity: i64,
    pub value: f64,
    pub commission: f64,
    /// Net position once the fill is applied.
    pub position_after: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderEvent {
    Submitted,
    Accepted,
    Completed(Fill),
    Canceled,
    MarginRejected,
    Rejected,
}

impl OrderEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderEvent::Submitted | OrderEvent::Accepted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::Submitted => "submitted",
            OrderEvent::Accepted => "accepted",
            OrderEvent::Completed(_) => "completed",
            OrderEvent::Canceled => "canceled",
            OrderEvent::MarginRejected => "margin",
            OrderEvent::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderUpdate {
    pub handle: OrderHandle,
    pub leg: Leg,
    pub at: NaiveDateTime,
    pub event: OrderEvent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeStats {
    pub total_trades: u32,
    pub profitable_trades: u32,
}

impl TradeStats {
    pub fn record(&mut self, net_pnl: f64) {
        self.total_trades += 1;
        if net_pnl > 0.0 {
            self.profitable_trades += 1;
        }
    }

    /// Share of closed trades with positive net P&L, in percent.
    pub fn profitable_percentage(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.profitable_trades as f64 / self.total_trades as f64 * 100.0
    }
}

/// Pending-order slot, fill log and trade counters for one run.
#[derive(Debug, Clone, Default)]
pub struct OrderLifecycle {
    pending: Option<OrderHandle>,
    fills: Vec<Fill>,
    stats: TradeStats,
}

impl OrderLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<OrderHandle> {
        self.pending
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn track(&mut self, handle: OrderHandle) {
        self.pending = Some(handle);
    }

    /// Apply one status transition. Returns true when the pending slot was
    /// cleared by it.
    pub fn apply(&mut self, update: &OrderUpdate) -> bool {
        if let OrderEvent::Completed(fill) = update.event {
            self.fills.push(fill);
        }
        if update.event.is_terminal() {
            return self.pending.take().is_some();
        }
        false
    }

    pub fn record_closed(&mut self, net_pnl: f64) {
        self.stats.record(net_pnl);
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn stats(&self) -> TradeStats {
        self.stats
    }
}
