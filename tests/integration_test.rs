//! End-to-end runs of the engine against the simulated broker.

mod common;

use approx::assert_relative_eq;
use chrono::NaiveDateTime;
use common::*;
use pivotrader::domain::backtest::{run_once, BacktestConfig, Fitness, RunOutcome};
use pivotrader::domain::error::NumericFault;
use pivotrader::domain::execution::{BrokerEvent, SimBroker};
use pivotrader::domain::journal::Journal;
use pivotrader::domain::optimizer::{Optimizer, SearchConfig};
use pivotrader::domain::order::{OrderEvent, Side};
use pivotrader::domain::sizer::PositionSizer;
use pivotrader::domain::strategy::{Decision, Engine, StrategyParams};
use pivotrader::ports::notify_port::NotifyPort;
use std::sync::Arc;

fn default_run(bars: &[OhlcvBar]) -> RunOutcome {
    run_once(
        bars,
        &StrategyParams::default(),
        &BacktestConfig::default(),
        &Journal::silent(),
    )
    .unwrap()
}

mod run_once_scenarios {
    use super::*;

    #[test]
    fn identical_inputs_give_identical_reports() {
        let bars = wave_bars(400);
        assert_eq!(default_run(&bars), default_run(&bars));
    }

    #[test]
    fn fitness_matches_report() {
        let bars = wave_bars(400);
        let outcome = default_run(&bars);
        let report = outcome.report().expect("wave run completes");

        let fitness = outcome.fitness();
        assert_relative_eq!(fitness.total_return, report.final_value - 150_000.0);
        let expected_pct = if report.total_trades > 0 {
            report.profitable_trades as f64 / report.total_trades as f64 * 100.0
        } else {
            0.0
        };
        assert_relative_eq!(fitness.profitable_trade_percentage, expected_pct);
    }

    #[test]
    fn counters_agree_with_closed_trades() {
        let outcome = default_run(&wave_bars(600));
        let report = outcome.report().unwrap();
        let profitable = report
            .closed_trades
            .iter()
            .filter(|t| t.net_pnl > 0.0)
            .count();
        assert_eq!(report.total_trades as usize, report.closed_trades.len());
        assert_eq!(report.profitable_trades as usize, profitable);
        assert!(report.fills >= report.closed_trades.len());
    }

    #[test]
    fn final_value_is_last_equity_point() {
        let outcome = default_run(&wave_bars(300));
        let report = outcome.report().unwrap();
        let last = report.equity_curve.last().unwrap();
        assert_relative_eq!(last.equity, report.final_value);
    }

    #[test]
    fn flat_series_faults_to_zero() {
        let outcome = default_run(&flat_bars(80));
        assert!(matches!(
            outcome,
            RunOutcome::Faulted {
                fault: NumericFault::DivisionByZero(_),
                ..
            }
        ));
        assert_eq!(outcome.fitness(), Fitness::ZERO);
    }

    #[test]
    fn fault_after_trading_still_zeroes_fitness() {
        let mut bars = wave_bars(300);
        let last = bars.last().unwrap().clone();
        for i in 1..=30 {
            bars.push(OhlcvBar {
                timestamp: last.timestamp + chrono::Duration::minutes(10 * i),
                open: 105.0,
                high: 105.0,
                low: 105.0,
                close: 105.0,
                volume: 10,
            });
        }

        let healthy = default_run(&bars[..300]);
        assert!(healthy.report().unwrap().entries > 0);

        let outcome = default_run(&bars);
        match outcome {
            RunOutcome::Faulted { fault, bar_index } => {
                assert_eq!(fault, NumericFault::DivisionByZero("stochastic"));
                assert!(bar_index >= 300);
            }
            other => panic!("expected fault, got {:?}", other.fitness()),
        }
        assert_eq!(outcome.fitness(), Fitness::ZERO);
    }

    #[test]
    fn commission_is_charged_per_fill() {
        let bars = wave_bars(400);
        let free = run_once(
            &bars,
            &StrategyParams::default(),
            &BacktestConfig {
                commission_pct: 0.0,
                ..BacktestConfig::default()
            },
            &Journal::silent(),
        )
        .unwrap();
        let costly = run_once(
            &bars,
            &StrategyParams::default(),
            &BacktestConfig {
                commission_pct: 0.5,
                commission_per_trade: 5.0,
                ..BacktestConfig::default()
            },
            &Journal::silent(),
        )
        .unwrap();

        let free = free.report().unwrap();
        let costly = costly.report().unwrap();
        assert!(costly.entries > 0);
        assert!(free.closed_trades.iter().all(|t| t.commission == 0.0));
        assert!(costly.closed_trades.iter().all(|t| t.commission >= 10.0));
    }
}

mod journal_routing {
    use super::*;

    #[test]
    fn final_run_sends_important_lines_to_sinks() {
        let sink = Arc::new(RecordingSink::default());
        let journal = Journal::final_run(vec![sink.clone() as Arc<dyn NotifyPort>]);
        let outcome = run_once(
            &wave_bars(400),
            &StrategyParams::default(),
            &BacktestConfig::default(),
            &journal,
        )
        .unwrap();
        let report = outcome.report().unwrap();

        let messages = sink.messages();
        let entries = messages
            .iter()
            .filter(|m| m.contains("LONG Entry") || m.contains("SHORT Entry"))
            .count();
        let results = messages
            .iter()
            .filter(|m| m.contains("Trade Profit, Gross="))
            .count();
        assert_eq!(entries, report.entries);
        assert_eq!(results, report.closed_trades.len());
        for message in &messages {
            let (stamp, text) = message.split_once(", ").unwrap();
            assert!(NaiveDateTime::parse_from_str(stamp, "%d.%m.%Y %H:%M").is_ok());
            assert!(!text.is_empty());
        }
        assert!(!messages.iter().any(|m| m.contains("Close=")));
    }
}

mod engine_with_broker {
    use super::*;

    /// Drive the engine bar by bar and check every entry decision.
    #[test]
    fn entries_respect_exposure_and_pending_slot() {
        let params = StrategyParams::default();
        let sizer = PositionSizer::new(25.0, params.max_positions);
        let mut engine = Engine::new(params.clone(), sizer, Journal::silent()).unwrap();
        let mut broker = SimBroker::new(150_000.0, Default::default());

        let mut entries = 0;
        let mut prev_total = 0;
        let mut prev_profitable = 0;
        for bar in wave_bars(500) {
            for event in broker.process_bar(&bar) {
                match event {
                    BrokerEvent::Order(update) => engine.on_order_event(&update),
                    BrokerEvent::TradeClosed(trade) => engine.on_trade_closed(&trade),
                }
            }

            let pending_before = engine.pending().is_some();
            let position = broker.portfolio().position.quantity;
            let decision = engine.on_bar(&bar, &mut broker).unwrap();

            if let Decision::Entered { side, quantity, .. } = decision {
                entries += 1;
                assert!(!pending_before, "entered while an order was pending");
                assert!(quantity >= 1);
                match side {
                    Side::Buy => assert!(position >= 0 && position < params.max_positions),
                    Side::Sell => assert!(position <= 0 && position > -params.max_positions),
                }
                assert!(engine.pending().is_some());
            }

            let stats = engine.stats();
            assert!(stats.profitable_trades <= stats.total_trades);
            assert!(stats.total_trades >= prev_total);
            assert!(stats.profitable_trades >= prev_profitable);
            prev_total = stats.total_trades;
            prev_profitable = stats.profitable_trades;
        }
        assert!(entries > 0);
    }

    #[test]
    fn margin_rejection_frees_the_slot() {
        let params = StrategyParams {
            max_positions: 1_000_000,
            ..StrategyParams::default()
        };
        // 100% of a tiny account plus commission cannot be covered.
        let sizer = PositionSizer::new(100.0, params.max_positions);
        let mut engine = Engine::new(params, sizer, Journal::silent()).unwrap();
        let mut broker = SimBroker::new(
            1_000.0,
            pivotrader::domain::execution::ExecutionConfig {
                commission_per_trade: 50.0,
                commission_pct: 0.0,
                slippage_pct: 0.0,
            },
        );

        let mut saw_margin = false;
        for bar in wave_bars(300) {
            for event in broker.process_bar(&bar) {
                if let BrokerEvent::Order(update) = &event {
                    if update.event == OrderEvent::MarginRejected {
                        saw_margin = true;
                    }
                }
                match event {
                    BrokerEvent::Order(update) => engine.on_order_event(&update),
                    BrokerEvent::TradeClosed(trade) => engine.on_trade_closed(&trade),
                }
            }
            engine.on_bar(&bar, &mut broker).unwrap();
        }
        assert!(saw_margin);
        assert_eq!(engine.stats().total_trades, 0);
    }
}

mod search {
    use super::*;

    #[test]
    fn search_returns_params_inside_gene_ranges() {
        let bars = wave_bars(250);
        let result = Optimizer::new(
            &bars,
            StrategyParams::default(),
            BacktestConfig::default(),
            SearchConfig {
                population: 6,
                generations: 3,
                seed: 5,
                ..SearchConfig::default()
            },
        )
        .run()
        .unwrap();

        let p = &result.best_params;
        assert!(p.validate().is_ok());
        assert!(p.fast_ema_period >= 1 && p.slow_ema_period >= 1);
        assert_eq!(p.pivot_period, StrategyParams::default().pivot_period);
        assert_eq!(result.history.len(), 4);
        assert!(result.best.score.is_some());
        for gene in result.best.genome {
            assert_eq!(gene.fract(), 0.0);
        }
        assert_eq!(result.history[0].evaluations, 6);
        assert!(result.evaluations >= 6);
    }

    #[test]
    fn same_seed_repeats_the_search() {
        let bars = wave_bars(200);
        let run = |seed| {
            Optimizer::new(
                &bars,
                StrategyParams::default(),
                BacktestConfig::default(),
                SearchConfig {
                    population: 4,
                    generations: 1,
                    seed,
                    parallel: false,
                    ..SearchConfig::default()
                },
            )
            .run()
            .unwrap()
        };
        let a = run(1);
        let b = run(1);
        assert_eq!(a, b);
    }
}
