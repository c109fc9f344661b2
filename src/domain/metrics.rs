//! Run summary statistics for reports and the CLI.
//!
//! Returns are per bar; nothing is annualized since bars may be intraday.

use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Final equity minus starting capital.
    pub total_return: f64,
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_bars: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_commission: f64,
    pub avg_trade_minutes: f64,
}

impl Metrics {
    pub fn compute(initial_capital: f64, equity_curve: &[EquityPoint], trades: &[ClosedTrade]) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = final_equity - initial_capital;
        let return_pct = if initial_capital > 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_bars) = compute_drawdown(equity_curve);
        let sharpe_ratio = compute_sharpe(equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_commission = 0.0_f64;
        let mut total_minutes = 0i64;

        for trade in trades {
            let pnl = trade.net_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_commission += trade.commission;
            total_minutes += (trade.closed_at - trade.opened_at).num_minutes();
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_trade_minutes = if total_trades > 0 {
            total_minutes as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            return_pct,
            sharpe_ratio,
            max_drawdown,
            max_drawdown_bars,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            total_commission,
            avg_trade_minutes,
        }
    }
}

/// Deepest peak-to-trough fall as a fraction of the peak, and the longest
/// run of bars spent below a peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_bars = 0usize;
    let mut current_dd_bars = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_bars = 0;
        } else if peak > 0.0 && point.equity < peak {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_bars += 1;
            max_dd_bars = max_dd_bars.max(current_dd_bars);
        }
    }

    (max_dd, max_dd_bars)
}

/// Mean over standard deviation of per-bar returns.
fn compute_sharpe(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 { mean / stddev } else { 0.0 }
}
