//! Strategy parameters and the per-bar decision engine.
//!
//! Each bar flows through indicators, the pivot window, the vote count and the
//! admission rules. At most one bracket is outstanding at a time; stops and
//! targets are anchored on the most recent pivot support/resistance.

use super::error::{NumericFault, PivotraderError};
use super::indicator::IndicatorSet;
use super::journal::Journal;
use super::ohlcv::OhlcvBar;
use super::order::{
    BracketRequest, Fill, OrderEvent, OrderHandle, OrderLifecycle, OrderUpdate, Side, TradeStats,
};
use super::pivot::{PivotCalculator, PivotLevels};
use super::position::ClosedTrade;
use super::signal::{aggregate, SignalInputs, Thresholds, Votes};
use super::sizer::PositionSizer;
use crate::ports::execution_port::ExecutionPort;

/// Minimum vote count for either side to be considered.
pub const MIN_VOTES: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub fast_ema_period: usize,
    pub slow_ema_period: usize,
    pub stoch_period: usize,
    pub rsi_period: usize,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub max_positions: i64,
    pub pivot_period: usize,
    pub risk_reward_ratio: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            fast_ema_period: 12,
            slow_ema_period: 26,
            stoch_period: 14,
            rsi_period: 14,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            max_positions: 10,
            pivot_period: 14,
            risk_reward_ratio: 2.0,
        }
    }
}

impl StrategyParams {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            stoch_overbought: self.stoch_overbought,
            stoch_oversold: self.stoch_oversold,
            rsi_overbought: self.rsi_overbought,
            rsi_oversold: self.rsi_oversold,
        }
    }

    pub fn validate(&self) -> Result<(), PivotraderError> {
        let periods = [
            ("fast_ema_period", self.fast_ema_period),
            ("slow_ema_period", self.slow_ema_period),
            ("stoch_period", self.stoch_period),
            ("rsi_period", self.rsi_period),
            ("pivot_period", self.pivot_period),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(PivotraderError::invalid("strategy", key, "must be at least 1"));
            }
        }
        let thresholds = [
            ("stoch_overbought", self.stoch_overbought),
            ("stoch_oversold", self.stoch_oversold),
            ("rsi_overbought", self.rsi_overbought),
            ("rsi_oversold", self.rsi_oversold),
        ];
        for (key, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(PivotraderError::invalid(
                    "strategy",
                    key,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }
        if self.max_positions < 1 {
            return Err(PivotraderError::invalid(
                "strategy",
                "max_positions",
                "must be at least 1",
            ));
        }
        if !self.risk_reward_ratio.is_finite() || self.risk_reward_ratio < 0.0 {
            return Err(PivotraderError::invalid(
                "strategy",
                "risk_reward_ratio",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Which side, if any, may open on this bar. Long is checked first.
pub fn admission(votes: Votes, position: i64, max_positions: i64) -> Option<Side> {
    let open_long = position.max(0);
    let open_short = (-position).max(0);

    if votes.buy >= MIN_VOTES && open_long < max_positions && open_short == 0 {
        return Some(Side::Buy);
    }
    if votes.sell >= MIN_VOTES && open_short < max_positions && open_long == 0 {
        return Some(Side::Sell);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryLevels {
    pub stop: f64,
    pub target: f64,
    /// True when the pivot-derived levels were inverted and replaced.
    pub fallback: bool,
}

/// Stop and target for an entry at `price`.
///
/// Longs stop at the current support (s1), shorts at the current resistance
/// (r1); an unset level falls back to 5% away. Inverted results are replaced
/// by fixed 5% / 10% offsets.
pub fn entry_levels(side: Side, price: f64, levels: &PivotLevels, risk_reward: f64) -> EntryLevels {
    match side {
        Side::Buy => {
            let stop = if levels.s1 != 0.0 { levels.s1 } else { price * 0.95 };
            let target = price + risk_reward * (price - stop);
            if stop >= price || target <= price {
                EntryLevels {
                    stop: price * 0.95,
                    target: price * 1.1,
                    fallback: true,
                }
            } else {
                EntryLevels {
                    stop,
                    target,
                    fallback: false,
                }
            }
        }
        Side::Sell => {
            let stop = if levels.r1 != 0.0 { levels.r1 } else { price * 1.05 };
            let target = price - risk_reward * (stop - price);
            if stop <= price || target >= price {
                EntryLevels {
                    stop: price * 1.05,
                    target: price * 0.9,
                    fallback: true,
                }
            } else {
                EntryLevels {
                    stop,
                    target,
                    fallback: false,
                }
            }
        }
    }
}

/// What the engine did with one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Indicators still warming up; the bar went no further.
    Warmup,
    /// A bracket is outstanding; entry logic skipped.
    AwaitingOrder,
    NoSignal,
    Entered {
        handle: OrderHandle,
        side: Side,
        quantity: i64,
        levels: EntryLevels,
    },
    /// Admitted, but the sizer returned nothing.
    SizeRejected { side: Side },
}

#[derive(Debug)]
pub struct Engine {
    params: StrategyParams,
    sizer: PositionSizer,
    indicators: IndicatorSet,
    pivots: PivotCalculator,
    current: PivotLevels,
    orders: OrderLifecycle,
    journal: Journal,
}

impl Engine {
    pub fn new(
        params: StrategyParams,
        sizer: PositionSizer,
        journal: Journal,
    ) -> Result<Self, PivotraderError> {
        params.validate()?;
        let indicators = IndicatorSet::new(
            params.fast_ema_period,
            params.slow_ema_period,
            params.stoch_period,
            params.rsi_period,
        );
        Ok(Engine {
            pivots: PivotCalculator::new(params.pivot_period),
            params,
            sizer,
            indicators,
            current: PivotLevels::UNSET,
            orders: OrderLifecycle::new(),
            journal,
        })
    }

    pub fn warmup_bars(&self) -> usize {
        self.indicators.warmup_bars()
    }

    pub fn pivots(&self) -> &PivotCalculator {
        &self.pivots
    }

    pub fn pending(&self) -> Option<OrderHandle> {
        self.orders.pending()
    }

    pub fn fills(&self) -> &[Fill] {
        self.orders.fills()
    }

    pub fn stats(&self) -> TradeStats {
        self.orders.stats()
    }

    pub fn on_bar<E: ExecutionPort>(
        &mut self,
        bar: &OhlcvBar,
        broker: &mut E,
    ) -> Result<Decision, NumericFault> {
        let Some(snapshot) = self.indicators.update(bar)? else {
            return Ok(Decision::Warmup);
        };

        self.pivots.update(bar.high, bar.low, bar.close);
        let levels = self.pivots.compute();
        if levels.is_set() {
            self.current = levels;
        }

        self.journal
            .routine(bar.timestamp, &format!("Close={:.2}", bar.close));
        if self.orders.has_pending() {
            return Ok(Decision::AwaitingOrder);
        }

        let inputs = SignalInputs::from_snapshot(bar.close, &snapshot);
        let votes = aggregate(&inputs, &self.params.thresholds());

        match admission(votes, broker.position(), self.params.max_positions) {
            Some(side) => {
                let label = match side {
                    Side::Buy => "Buy Market",
                    Side::Sell => "Sell Market",
                };
                self.journal.routine(bar.timestamp, label);
                Ok(self.enter(side, bar, broker))
            }
            None => Ok(Decision::NoSignal),
        }
    }

    fn enter<E: ExecutionPort>(&mut self, side: Side, bar: &OhlcvBar, broker: &mut E) -> Decision {
        let price = bar.close;
        let levels = entry_levels(side, price, &self.current, self.params.risk_reward_ratio);
        if levels.fallback {
            self.journal.routine(
                bar.timestamp,
                "Invalid stop/target levels, falling back to defaults",
            );
        }

        let quantity = self.sizer.size(
            broker.cash(),
            broker.last_close(),
            broker.position(),
            side == Side::Buy,
        );
        if quantity <= 0 {
            self.journal
                .routine(bar.timestamp, "Invalid trade size: size <= 0");
            return Decision::SizeRejected { side };
        }

        let tag = match side {
            Side::Buy => "LONG",
            Side::Sell => "SHORT",
        };
        self.journal.important(
            bar.timestamp,
            &format!(
                "{} Entry: {:.2}, SL: {:.2}, TP: {:.2}",
                tag, price, levels.stop, levels.target
            ),
        );

        let handle = broker.submit_bracket(BracketRequest {
            side,
            stop_price: levels.stop,
            limit_price: levels.target,
            quantity,
        });
        self.orders.track(handle);

        Decision::Entered {
            handle,
            side,
            quantity,
            levels,
        }
    }

    pub fn on_order_event(&mut self, update: &OrderUpdate) {
        let at = update.at;
        match update.event {
            OrderEvent::Submitted | OrderEvent::Accepted => {}
            OrderEvent::Completed(fill) => {
                let verb = match fill.side {
                    Side::Buy => "Bought",
                    Side::Sell => "Sold",
                };
                self.journal.important(
                    at,
                    &format!(
                        "{} @{:.2}, Cost={:.2}, Comm={:.2}, Size={}",
                        verb, fill.price, fill.value, fill.commission, fill.position_after
                    ),
                );
            }
            OrderEvent::Canceled => self.journal.routine(
                at,
                &format!("Order Canceled: {:?} leg {}", update.leg, update.handle),
            ),
            OrderEvent::MarginRejected => self.journal.routine(
                at,
                &format!("Margin: insufficient cash for {}", update.handle),
            ),
            OrderEvent::Rejected => self
                .journal
                .routine(at, &format!("Rejected: {} refused by the host", update.handle)),
        }
        self.orders.apply(update);
    }

    pub fn on_trade_closed(&mut self, trade: &ClosedTrade) {
        self.journal.important(
            trade.closed_at,
            &format!(
                "Trade Profit, Gross={:.2}, NET={:.2}",
                trade.gross_pnl, trade.net_pnl
            ),
        );
        self.orders.record_closed(trade.net_pnl);
    }
}
