//! Bar-driven fill simulation for bracket orders.
//!
//! Market entries fill at the next bar's open. Protective legs arm on the bar
//! after their entry fills and trigger against that bar's range; when both
//! legs trigger in one bar the stop wins and the sibling is canceled.

use chrono::NaiveDateTime;

use super::ohlcv::OhlcvBar;
use super::order::{BracketRequest, Fill, Leg, OrderEvent, OrderHandle, OrderUpdate, Side};
use super::portfolio::Portfolio;
use super::position::ClosedTrade;
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Move the price against the trader: buys pay more, sells receive less.
pub fn apply_slippage(market_price: f64, side: Side, slippage_pct: f64) -> f64 {
    match side {
        Side::Buy => market_price * (1.0 + slippage_pct / 100.0),
        Side::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

/// Host-side event, in the order it happened within a bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    Order(OrderUpdate),
    TradeClosed(ClosedTrade),
}

#[derive(Debug, Clone, PartialEq)]
struct WorkingBracket {
    side: Side,
    quantity: i64,
    entry: OrderHandle,
    stop: OrderHandle,
    target: OrderHandle,
    stop_price: f64,
    limit_price: f64,
    announced: bool,
    entry_filled: bool,
    armed: bool,
}

impl WorkingBracket {
    fn handles(&self) -> [(OrderHandle, Leg); 3] {
        [
            (self.entry, Leg::Entry),
            (self.stop, Leg::Stop),
            (self.target, Leg::Target),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SimBroker {
    config: ExecutionConfig,
    portfolio: Portfolio,
    brackets: Vec<WorkingBracket>,
    next_handle: u64,
    last_close: f64,
}

impl SimBroker {
    pub fn new(initial_capital: f64, config: ExecutionConfig) -> Self {
        SimBroker {
            config,
            portfolio: Portfolio::new(initial_capital),
            brackets: Vec::new(),
            next_handle: 1,
            last_close: 0.0,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    pub fn working_brackets(&self) -> usize {
        self.brackets.len()
    }

    /// Cash plus the position marked at the last close.
    pub fn value(&self) -> f64 {
        self.portfolio.value(self.last_close)
    }

    fn allocate(&mut self) -> OrderHandle {
        let handle = OrderHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Advance one bar: announce new brackets, fill entries at the open, then
    /// check armed legs against the bar range.
    pub fn process_bar(&mut self, bar: &OhlcvBar) -> Vec<BrokerEvent> {
        let mut events = Vec::new();
        let at = bar.timestamp;

        for bracket in self.brackets.iter_mut().filter(|b| !b.announced) {
            bracket.announced = true;
            for status in [OrderEvent::Submitted, OrderEvent::Accepted] {
                for (handle, leg) in bracket.handles() {
                    events.push(update(handle, leg, at, status));
                }
            }
        }

        let mut index = 0;
        while index < self.brackets.len() {
            if self.brackets[index].entry_filled {
                index += 1;
                continue;
            }
            if self.fill_entry(index, bar, &mut events) {
                index += 1;
            } else {
                self.brackets.remove(index);
            }
        }

        let mut index = 0;
        while index < self.brackets.len() {
            if self.brackets[index].armed && self.check_legs(index, bar, &mut events) {
                self.brackets.remove(index);
            } else {
                index += 1;
            }
        }

        for bracket in self.brackets.iter_mut().filter(|b| b.entry_filled) {
            bracket.armed = true;
        }

        self.last_close = bar.close;
        let equity = self.value();
        self.portfolio.record_equity(at, equity);
        events
    }

    /// Returns false when the entry was rejected and the bracket dropped.
    fn fill_entry(&mut self, index: usize, bar: &OhlcvBar, events: &mut Vec<BrokerEvent>) -> bool {
        let bracket = &self.brackets[index];
        let price = apply_slippage(bar.open, bracket.side, self.config.slippage_pct);
        let value = bracket.quantity as f64 * price;
        let commission = calculate_commission(value, &self.config);

        if value + commission > self.portfolio.cash {
            tracing::debug!(
                entry = %bracket.entry,
                value,
                cash = self.portfolio.cash,
                "entry rejected for margin"
            );
            events.push(update(bracket.entry, Leg::Entry, bar.timestamp, OrderEvent::MarginRejected));
            events.push(update(bracket.stop, Leg::Stop, bar.timestamp, OrderEvent::Canceled));
            events.push(update(bracket.target, Leg::Target, bar.timestamp, OrderEvent::Canceled));
            return false;
        }

        let (side, quantity, entry) = (bracket.side, bracket.quantity, bracket.entry);
        self.execute(side, quantity, price, commission, entry, Leg::Entry, bar.timestamp, events);
        self.brackets[index].entry_filled = true;
        true
    }

    /// Returns true when a leg filled and the bracket is finished.
    fn check_legs(&mut self, index: usize, bar: &OhlcvBar, events: &mut Vec<BrokerEvent>) -> bool {
        let bracket = self.brackets[index].clone();
        let exit_side = bracket.side.opposite();

        let (stop_hit, stop_fill, target_hit, target_fill) = match bracket.side {
            Side::Buy => (
                bar.low <= bracket.stop_price,
                bar.open.min(bracket.stop_price),
                bar.high >= bracket.limit_price,
                bar.open.max(bracket.limit_price),
            ),
            Side::Sell => (
                bar.high >= bracket.stop_price,
                bar.open.max(bracket.stop_price),
                bar.low <= bracket.limit_price,
                bar.open.min(bracket.limit_price),
            ),
        };

        let (filled, canceled, price) = if stop_hit {
            let price = apply_slippage(stop_fill, exit_side, self.config.slippage_pct);
            ((bracket.stop, Leg::Stop), (bracket.target, Leg::Target), price)
        } else if target_hit {
            ((bracket.target, Leg::Target), (bracket.stop, Leg::Stop), target_fill)
        } else {
            return false;
        };

        let value = bracket.quantity as f64 * price;
        let commission = calculate_commission(value, &self.config);
        self.execute(
            exit_side,
            bracket.quantity,
            price,
            commission,
            filled.0,
            filled.1,
            bar.timestamp,
            events,
        );
        events.push(update(canceled.0, canceled.1, bar.timestamp, OrderEvent::Canceled));
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        side: Side,
        quantity: i64,
        price: f64,
        commission: f64,
        handle: OrderHandle,
        leg: Leg,
        at: NaiveDateTime,
        events: &mut Vec<BrokerEvent>,
    ) {
        let closed = self.portfolio.apply_fill(side, quantity, price, commission, at);
        let fill = Fill {
            side,
            price,
            quantity,
            value: quantity as f64 * price,
            commission,
            position_after: self.portfolio.position.quantity,
        };
        events.push(update(handle, leg, at, OrderEvent::Completed(fill)));
        if let Some(trade) = closed {
            events.push(BrokerEvent::TradeClosed(trade));
        }
    }
}

fn update(handle: OrderHandle, leg: Leg, at: NaiveDateTime, event: OrderEvent) -> BrokerEvent {
    BrokerEvent::Order(OrderUpdate {
        handle,
        leg,
        at,
        event,
    })
}

impl ExecutionPort for SimBroker {
    fn submit_bracket(&mut self, request: BracketRequest) -> OrderHandle {
        let entry = self.allocate();
        let stop = self.allocate();
        let target = self.allocate();
        self.brackets.push(WorkingBracket {
            side: request.side,
            quantity: request.quantity,
            entry,
            stop,
            target,
            stop_price: request.stop_price,
            limit_price: request.limit_price,
            announced: false,
            entry_filled: false,
            armed: false,
        });
        entry
    }

    fn position(&self) -> i64 {
        self.portfolio.position.quantity
    }

    fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    fn last_close(&self) -> f64 {
        self.last_close
    }
}
