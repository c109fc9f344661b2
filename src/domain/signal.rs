//! Per-bar vote counting over trend, oscillator, momentum and relative
//! strength conditions.
//!
//! Each side counts four independent conditions. Both sides may vote in the
//! same bar; admission decides between them.

use crate::domain::indicator::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInputs {
    pub close: f64,
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub stoch_k: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub rsi: f64,
}

impl SignalInputs {
    pub fn from_snapshot(close: f64, snapshot: &IndicatorSnapshot) -> Self {
        SignalInputs {
            close,
            fast_ema: snapshot.fast_ema,
            slow_ema: snapshot.slow_ema,
            stoch_k: snapshot.stoch_k,
            macd_line: snapshot.macd_line,
            macd_signal: snapshot.macd_signal,
            rsi: snapshot.rsi,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Votes {
    pub buy: u8,
    pub sell: u8,
}

pub fn aggregate(inputs: &SignalInputs, thresholds: &Thresholds) -> Votes {
    let buy = [
        inputs.close > inputs.fast_ema && inputs.fast_ema > inputs.slow_ema,
        inputs.stoch_k < thresholds.stoch_oversold,
        inputs.macd_line > inputs.macd_signal,
        inputs.rsi < thresholds.rsi_oversold,
    ];
    let sell = [
        inputs.close < inputs.fast_ema && inputs.fast_ema < inputs.slow_ema,
        inputs.stoch_k > thresholds.stoch_overbought,
        inputs.macd_line < inputs.macd_signal,
        inputs.rsi > thresholds.rsi_overbought,
    ];

    Votes {
        buy: buy.iter().filter(|&&c| c).count() as u8,
        sell: sell.iter().filter(|&&c| c).count() as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }

    fn neutral() -> SignalInputs {
        SignalInputs {
            close: 100.0,
            fast_ema: 100.0,
            slow_ema: 100.0,
            stoch_k: 50.0,
            macd_line: 0.0,
            macd_signal: 0.0,
            rsi: 50.0,
        }
    }

    #[test]
    fn neutral_market_has_no_votes() {
        assert_eq!(aggregate(&neutral(), &thresholds()), Votes::default());
    }

    #[test]
    fn all_buy_conditions() {
        let inputs = SignalInputs {
            close: 105.0,
            fast_ema: 103.0,
            slow_ema: 101.0,
            stoch_k: 10.0,
            macd_line: 1.0,
            macd_signal: 0.5,
            rsi: 25.0,
        };
        assert_eq!(aggregate(&inputs, &thresholds()), Votes { buy: 4, sell: 0 });
    }

    #[test]
    fn all_sell_conditions() {
        let inputs = SignalInputs {
            close: 95.0,
            fast_ema: 97.0,
            slow_ema: 99.0,
            stoch_k: 90.0,
            macd_line: -1.0,
            macd_signal: -0.5,
            rsi: 75.0,
        };
        assert_eq!(aggregate(&inputs, &thresholds()), Votes { buy: 0, sell: 4 });
    }

    #[test]
    fn both_sides_can_vote_in_one_bar() {
        // uptrend with overbought oscillators
        let inputs = SignalInputs {
            close: 105.0,
            fast_ema: 103.0,
            slow_ema: 101.0,
            stoch_k: 95.0,
            macd_line: 1.0,
            macd_signal: 0.5,
            rsi: 80.0,
        };
        assert_eq!(aggregate(&inputs, &thresholds()), Votes { buy: 2, sell: 2 });
    }

    #[test]
    fn trend_requires_full_alignment() {
        let inputs = SignalInputs {
            close: 105.0,
            fast_ema: 101.0,
            slow_ema: 103.0,
            ..neutral()
        };
        assert_eq!(aggregate(&inputs, &thresholds()), Votes::default());
    }

    #[test]
    fn thresholds_are_strict() {
        let inputs = SignalInputs {
            stoch_k: 20.0,
            rsi: 70.0,
            ..neutral()
        };
        assert_eq!(aggregate(&inputs, &thresholds()), Votes::default());
    }

    #[test]
    fn from_snapshot_copies_readings() {
        let snapshot = IndicatorSnapshot {
            fast_ema: 1.0,
            slow_ema: 2.0,
            stoch_k: 3.0,
            stoch_d: 4.0,
            macd_line: 5.0,
            macd_signal: 6.0,
            rsi: 7.0,
        };
        let inputs = SignalInputs::from_snapshot(9.0, &snapshot);
        assert_eq!(inputs.close, 9.0);
        assert_eq!(inputs.fast_ema, 1.0);
        assert_eq!(inputs.macd_signal, 6.0);
        assert_eq!(inputs.rsi, 7.0);
    }
}
