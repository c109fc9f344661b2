//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::trade_log_adapter::TradeLogAdapter;
use crate::adapters::tsv_adapter::TsvAdapter;
use crate::domain::backtest::{run_once, BacktestConfig, RunOutcome};
use crate::domain::balance::BalanceBoard;
use crate::domain::config_validation::{
    backtest_config, data_config, notify_config, search_config, strategy_params, validate_all,
    NotifyConfig,
};
use crate::domain::error::PivotraderError;
use crate::domain::journal::Journal;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::optimizer::{Optimizer, SearchResult};
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::notify_port::NotifyPort;

/// Trade log written by a final run when `[notify] trade_log` is unset.
pub const DEFAULT_TRADE_LOG: &str = "trades.txt";

#[derive(Parser, Debug)]
#[command(
    name = "pivotrader",
    about = "Pivot-point strategy backtester and parameter search"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a quote file into the bar table, replacing its contents
    Load {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Run one backtest with the configured parameters
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the trade log, notify sinks and update the balance
        #[arg(long = "final")]
        final_run: bool,
    },
    /// Search strategy parameters, then run the best set as the final run
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Load this quote file first
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Validate the configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored bar range
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Load { config, input } => run_load(&config, input.as_deref()),
        Command::Backtest { config, final_run } => run_backtest(&config, final_run),
        Command::Optimize {
            config,
            seed,
            input,
        } => run_optimize(&config, seed, input.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PivotraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

#[cfg(feature = "sqlite")]
fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, PivotraderError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Box::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_store(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, PivotraderError> {
    Err(PivotraderError::Database {
        reason: "sqlite feature is required for the bar table".to_string(),
    })
}

fn run_load(config_path: &Path, input: Option<&Path>) -> Result<(), PivotraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    load_pipeline(store.as_ref(), &config, input)?;
    Ok(())
}

/// Read the quote file (`input` or `[data] input`) into `data_port`.
pub fn load_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    input: Option<&Path>,
) -> Result<usize, PivotraderError> {
    let data = data_config(config)?;
    let path = match input {
        Some(p) => p.to_path_buf(),
        None => data
            .input
            .map(PathBuf::from)
            .ok_or_else(|| PivotraderError::ConfigMissing {
                section: "data".to_string(),
                key: "input".to_string(),
            })?,
    };

    let bars = TsvAdapter::new(&path, data.delimiter).read_bars()?;
    if bars.is_empty() {
        return Err(PivotraderError::NoData {
            source_name: path.display().to_string(),
        });
    }
    let written = data_port.replace_bars(&bars)?;
    eprintln!("Loaded {} bars from {}", written, path.display());
    Ok(written)
}

/// Every stored bar; an empty table is `NoData`.
pub fn stored_bars(data_port: &dyn DataPort) -> Result<Vec<OhlcvBar>, PivotraderError> {
    let bars = data_port.fetch_bars()?;
    if bars.is_empty() {
        return Err(PivotraderError::NoData {
            source_name: "bar table".to_string(),
        });
    }
    Ok(bars)
}

fn run_backtest(config_path: &Path, final_run: bool) -> Result<(), PivotraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let mut board = BalanceBoard::new();
    let outcome = run_backtest_pipeline(store.as_ref(), &config, final_run, &mut board)?;
    println!("{}", format_summary(&outcome));
    if final_run {
        println!("{}", board.describe());
    }
    Ok(())
}

/// One run with the configured parameters over the stored bars.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    final_run: bool,
    board: &mut BalanceBoard,
) -> Result<RunOutcome, PivotraderError> {
    let params = strategy_params(config)?;
    let bt = backtest_config(config)?;
    let bars = stored_bars(data_port)?;
    eprintln!("Running backtest over {} bars", bars.len());

    if final_run {
        let sinks = build_sinks(&notify_config(config))?;
        final_run_pipeline(&bars, &params, &bt, sinks, board)
    } else {
        run_once(&bars, &params, &bt, &Journal::silent())
    }
}

/// Trade log (always) plus Telegram when built in and configured.
pub fn build_sinks(notify: &NotifyConfig) -> Result<Vec<Arc<dyn NotifyPort>>, PivotraderError> {
    let log_path = notify.trade_log.as_deref().unwrap_or(DEFAULT_TRADE_LOG);
    let mut sinks: Vec<Arc<dyn NotifyPort>> = vec![Arc::new(TradeLogAdapter::create(log_path)?)];

    #[cfg(feature = "telegram")]
    {
        use crate::adapters::telegram_adapter::TelegramAdapter;
        if let Some(telegram) = TelegramAdapter::from_config(notify)? {
            sinks.push(Arc::new(telegram));
        }
    }

    tracing::info!(sinks = sinks.len(), trade_log = log_path, "notification sinks ready");
    Ok(sinks)
}

/// The run whose journal reaches the sinks; updates the balance board.
pub fn final_run_pipeline(
    bars: &[OhlcvBar],
    params: &StrategyParams,
    bt: &BacktestConfig,
    sinks: Vec<Arc<dyn NotifyPort>>,
    board: &mut BalanceBoard,
) -> Result<RunOutcome, PivotraderError> {
    let outcome = run_once(bars, params, bt, &Journal::final_run(sinks))?;
    match (&outcome, bars.last()) {
        (RunOutcome::Completed(report), Some(last)) => {
            board.update(report.final_value, last.timestamp);
        }
        (RunOutcome::Faulted { .. }, _) => {
            tracing::warn!("final run aborted; balance left unchanged");
        }
        _ => {}
    }
    Ok(outcome)
}

fn run_optimize(
    config_path: &Path,
    seed: Option<u64>,
    input: Option<&Path>,
) -> Result<(), PivotraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    if input.is_some() {
        load_pipeline(store.as_ref(), &config, input)?;
    }

    let mut board = BalanceBoard::new();
    let (search, outcome) = run_optimize_pipeline(store.as_ref(), &config, seed, &mut board)?;
    println!("{}", format_search(&search));
    println!("{}", format_summary(&outcome));
    println!("{}", board.describe());
    Ok(())
}

/// Search over the stored bars, then a final run with the best parameters.
pub fn run_optimize_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    seed: Option<u64>,
    board: &mut BalanceBoard,
) -> Result<(SearchResult, RunOutcome), PivotraderError> {
    let base = strategy_params(config)?;
    let bt = backtest_config(config)?;
    let mut search = search_config(config)?;
    if let Some(seed) = seed {
        search.seed = seed;
    }
    let bars = stored_bars(data_port)?;
    eprintln!(
        "Searching: population {}, generations {}, seed {}",
        search.population, search.generations, search.seed
    );

    let result = Optimizer::new(&bars, base, bt.clone(), search).run()?;
    let sinks = build_sinks(&notify_config(config))?;
    let outcome = final_run_pipeline(&bars, &result.best_params, &bt, sinks, board)?;
    Ok((result, outcome))
}

fn run_validate(config_path: &Path) -> Result<(), PivotraderError> {
    let config = load_config(config_path)?;
    validate_all(&config)?;
    let params = strategy_params(&config)?;
    eprintln!("Strategy: {}", describe_params(&params));
    eprintln!("Configuration is valid.");
    Ok(())
}

fn run_info(config_path: &Path) -> Result<(), PivotraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    match store.data_range()? {
        Some((first, last, count)) => println!("{} bars, {} to {}", count, first, last),
        None => println!("no bars stored"),
    }
    Ok(())
}

pub fn describe_params(p: &StrategyParams) -> String {
    format!(
        "fast_ema={} slow_ema={} stoch={} rsi={} stoch_ob={} stoch_os={} rsi_ob={} rsi_os={} \
         max_positions={} pivot={} rr={}",
        p.fast_ema_period,
        p.slow_ema_period,
        p.stoch_period,
        p.rsi_period,
        p.stoch_overbought,
        p.stoch_oversold,
        p.rsi_overbought,
        p.rsi_oversold,
        p.max_positions,
        p.pivot_period,
        p.risk_reward_ratio,
    )
}

pub fn format_search(result: &SearchResult) -> String {
    format!(
        "=== Search ===\n\
         Best parameters:  {}\n\
         Total return:     {:.2}\n\
         Profitable:       {:.1}%\n\
         Evaluations:      {}",
        describe_params(&result.best_params),
        result.best.raw.total_return,
        result.best.raw.profitable_trade_percentage,
        result.evaluations,
    )
}

pub fn format_summary(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Faulted { fault, bar_index } => {
            format!("Run aborted at bar {}: {} (fitness 0, 0)", bar_index, fault)
        }
        RunOutcome::Completed(report) => {
            let metrics = report.metrics();
            format!(
                "=== Results ===\n\
                 Final value:      {:.2}\n\
                 Total return:     {:.2} ({:.2}%)\n\
                 Total trades:     {}\n\
                 Profitable:       {} ({:.1}%)\n\
                 Sharpe (per bar): {:.3}\n\
                 Max drawdown:     -{:.1}%\n\
                 Profit factor:    {:.2}\n\
                 Commission:       {:.2}",
                report.final_value,
                report.total_return(),
                report.total_return() / report.initial_capital * 100.0,
                report.total_trades,
                report.profitable_trades,
                report.profitable_trade_percentage(),
                metrics.sharpe_ratio,
                metrics.max_drawdown * 100.0,
                metrics.profit_factor,
                metrics.total_commission,
            )
        }
    }
}
