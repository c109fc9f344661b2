//! Single-run driver: bars through the simulated broker and the engine.
//!
//! A numeric fault inside the indicator pipeline ends only the current run and
//! is returned as [`RunOutcome::Faulted`], whose fitness is exactly (0, 0).

use super::error::{NumericFault, PivotraderError};
use super::execution::{BrokerEvent, ExecutionConfig, SimBroker};
use super::journal::Journal;
use super::metrics::Metrics;
use super::ohlcv::OhlcvBar;
use super::portfolio::EquityPoint;
use super::position::ClosedTrade;
use super::sizer::{PositionSizer, DEFAULT_PERCENT};
use super::strategy::{Decision, Engine, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub position_percent: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 150_000.0,
            commission_per_trade: 0.0,
            commission_pct: 0.05,
            slippage_pct: 0.0,
            position_percent: DEFAULT_PERCENT,
        }
    }
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

/// The pair the parameter search optimizes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fitness {
    pub total_return: f64,
    pub profitable_trade_percentage: f64,
}

impl Fitness {
    pub const ZERO: Fitness = Fitness {
        total_return: 0.0,
        profitable_trade_percentage: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_trades: u32,
    pub profitable_trades: u32,
    pub bars_processed: usize,
    pub entries: usize,
    pub fills: usize,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl RunReport {
    /// Final portfolio value minus starting capital.
    pub fn total_return(&self) -> f64 {
        self.final_value - self.initial_capital
    }

    pub fn profitable_trade_percentage(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.profitable_trades as f64 / self.total_trades as f64 * 100.0
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::compute(self.initial_capital, &self.equity_curve, &self.closed_trades)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunReport),
    Faulted { fault: NumericFault, bar_index: usize },
}

impl RunOutcome {
    pub fn fitness(&self) -> Fitness {
        match self {
            RunOutcome::Completed(report) => Fitness {
                total_return: report.total_return(),
                profitable_trade_percentage: report.profitable_trade_percentage(),
            },
            RunOutcome::Faulted { .. } => Fitness::ZERO,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Faulted { .. } => None,
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, RunOutcome::Faulted { .. })
    }
}

/// Run one full pass of the strategy over `bars`.
///
/// Errors are reserved for unusable input (invalid parameters, no bars);
/// numeric faults come back as [`RunOutcome::Faulted`].
pub fn run_once(
    bars: &[OhlcvBar],
    params: &StrategyParams,
    config: &BacktestConfig,
    journal: &Journal,
) -> Result<RunOutcome, PivotraderError> {
    if bars.is_empty() {
        return Err(PivotraderError::NoData {
            source_name: "bar series".to_string(),
        });
    }

    let sizer = PositionSizer::new(config.position_percent, params.max_positions);
    let mut engine = Engine::new(params.clone(), sizer, journal.clone())?;
    let mut broker = SimBroker::new(config.initial_capital, config.execution_config());
    let mut entries = 0usize;

    for (index, bar) in bars.iter().enumerate() {
        for event in broker.process_bar(bar) {
            match event {
                BrokerEvent::Order(update) => engine.on_order_event(&update),
                BrokerEvent::TradeClosed(trade) => engine.on_trade_closed(&trade),
            }
        }

        match engine.on_bar(bar, &mut broker) {
            Ok(Decision::Entered { .. }) => entries += 1,
            Ok(_) => {}
            Err(fault) => {
                tracing::warn!(bar_index = index, "run aborted: {}", fault);
                return Ok(RunOutcome::Faulted {
                    fault,
                    bar_index: index,
                });
            }
        }
    }

    let stats = engine.stats();
    let fills = engine.fills().len();
    let final_value = broker.value();
    let portfolio = broker.into_portfolio();

    Ok(RunOutcome::Completed(RunReport {
        initial_capital: config.initial_capital,
        final_value,
        total_trades: stats.total_trades,
        profitable_trades: stats.profitable_trades,
        bars_processed: bars.len(),
        entries,
        fills,
        closed_trades: portfolio.closed_trades,
        equity_curve: portfolio.equity_curve,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: impl Iterator<Item = f64>) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        closes
            .enumerate()
            .map(|(i, close)| OhlcvBar {
                timestamp: start + chrono::Duration::minutes(10 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            })
            .collect()
    }

    fn wave(count: usize) -> Vec<OhlcvBar> {
        bars((0..count).map(|i| 100.0 + 8.0 * (i as f64 * 0.35).sin()))
    }

    #[test]
    fn default_config_values() {
        let c = BacktestConfig::default();
        assert!((c.initial_capital - 150_000.0).abs() < f64::EPSILON);
        assert!((c.commission_pct - 0.05).abs() < f64::EPSILON);
        assert!((c.position_percent - 25.0).abs() < f64::EPSILON);
        assert_eq!(c.execution_config().slippage_pct, 0.0);
    }

    #[test]
    fn empty_series_is_no_data() {
        let result = run_once(&[], &StrategyParams::default(), &BacktestConfig::default(), &Journal::silent());
        assert!(matches!(result, Err(PivotraderError::NoData { .. })));
    }

    #[test]
    fn invalid_params_are_rejected_before_running() {
        let params = StrategyParams {
            pivot_period: 0,
            ..StrategyParams::default()
        };
        let result = run_once(&wave(50), &params, &BacktestConfig::default(), &Journal::silent());
        assert!(matches!(result, Err(PivotraderError::ConfigInvalid { .. })));
    }

    #[test]
    fn flat_prices_fault_to_zero_fitness() {
        let flat = bars(std::iter::repeat(100.0).take(60));
        let outcome = run_once(
            &flat,
            &StrategyParams::default(),
            &BacktestConfig::default(),
            &Journal::silent(),
        )
        .unwrap();
        assert!(outcome.is_faulted());
        assert_eq!(outcome.fitness(), Fitness::ZERO);
        assert!(outcome.report().is_none());
    }

    #[test]
    fn wave_run_completes_with_consistent_counters() {
        let outcome = run_once(
            &wave(400),
            &StrategyParams::default(),
            &BacktestConfig::default(),
            &Journal::silent(),
        )
        .unwrap();
        let report = outcome.report().expect("wave should not fault");
        assert_eq!(report.bars_processed, 400);
        assert_eq!(report.equity_curve.len(), 400);
        assert!(report.entries > 0);
        assert!(report.profitable_trades <= report.total_trades);
        assert_eq!(report.total_trades as usize, report.closed_trades.len());

        let fitness = outcome.fitness();
        assert!((fitness.total_return - report.total_return()).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&fitness.profitable_trade_percentage));
    }

    #[test]
    fn percentage_without_trades_is_zero() {
        let report = RunReport {
            initial_capital: 100.0,
            final_value: 100.0,
            total_trades: 0,
            profitable_trades: 0,
            bars_processed: 0,
            entries: 0,
            fills: 0,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        };
        assert_eq!(report.profitable_trade_percentage(), 0.0);
        assert_eq!(report.total_return(), 0.0);
    }
}
