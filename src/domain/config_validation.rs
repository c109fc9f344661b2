//! Typed configuration read from the INI port.
//!
//! Missing keys fall back to the documented defaults; present but unparsable
//! or out-of-range values are reported as `ConfigInvalid` before any run.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::PivotraderError;
use crate::domain::optimizer::SearchConfig;
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

/// Data source settings from `[data]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub database: Option<String>,
    pub input: Option<String>,
    pub delimiter: u8,
}

/// Notification sinks from `[notify]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotifyConfig {
    pub trade_log: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

fn read<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PivotraderError> {
    match non_empty(config, section, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            PivotraderError::invalid(section, key, format!("cannot parse '{}'", raw))
        }),
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, PivotraderError> {
    let d = StrategyParams::default();
    let params = StrategyParams {
        fast_ema_period: read(config, "strategy", "fast_ema_period", d.fast_ema_period)?,
        slow_ema_period: read(config, "strategy", "slow_ema_period", d.slow_ema_period)?,
        stoch_period: read(config, "strategy", "stoch_period", d.stoch_period)?,
        rsi_period: read(config, "strategy", "rsi_period", d.rsi_period)?,
        stoch_overbought: read(config, "strategy", "stoch_overbought", d.stoch_overbought)?,
        stoch_oversold: read(config, "strategy", "stoch_oversold", d.stoch_oversold)?,
        rsi_overbought: read(config, "strategy", "rsi_overbought", d.rsi_overbought)?,
        rsi_oversold: read(config, "strategy", "rsi_oversold", d.rsi_oversold)?,
        max_positions: read(config, "strategy", "max_positions", d.max_positions)?,
        pivot_period: read(config, "strategy", "pivot_period", d.pivot_period)?,
        risk_reward_ratio: read(config, "strategy", "risk_reward_ratio", d.risk_reward_ratio)?,
    };
    params.validate()?;
    Ok(params)
}

pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, PivotraderError> {
    let d = BacktestConfig::default();
    let bt = BacktestConfig {
        initial_capital: read(config, "backtest", "initial_capital", d.initial_capital)?,
        commission_per_trade: read(
            config,
            "backtest",
            "commission_per_trade",
            d.commission_per_trade,
        )?,
        commission_pct: read(config, "backtest", "commission_pct", d.commission_pct)?,
        slippage_pct: read(config, "backtest", "slippage_pct", d.slippage_pct)?,
        position_percent: read(config, "backtest", "position_percent", d.position_percent)?,
    };
    validate_backtest(&bt)?;
    Ok(bt)
}

fn validate_backtest(bt: &BacktestConfig) -> Result<(), PivotraderError> {
    if !bt.initial_capital.is_finite() || bt.initial_capital <= 0.0 {
        return Err(PivotraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    for (key, value) in [
        ("commission_per_trade", bt.commission_per_trade),
        ("commission_pct", bt.commission_pct),
        ("slippage_pct", bt.slippage_pct),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(PivotraderError::invalid(
                "backtest",
                key,
                format!("{} must be non-negative", key),
            ));
        }
    }
    if !bt.position_percent.is_finite() || bt.position_percent <= 0.0 || bt.position_percent > 100.0
    {
        return Err(PivotraderError::invalid(
            "backtest",
            "position_percent",
            "position_percent must be within (0, 100]",
        ));
    }
    Ok(())
}

pub fn search_config(config: &dyn ConfigPort) -> Result<SearchConfig, PivotraderError> {
    let d = SearchConfig::default();
    let search = SearchConfig {
        population: read(config, "search", "population", d.population)?,
        generations: read(config, "search", "generations", d.generations)?,
        crossover_prob: read(config, "search", "crossover_prob", d.crossover_prob)?,
        mutation_prob: read(config, "search", "mutation_prob", d.mutation_prob)?,
        return_weight: read(config, "search", "return_weight", d.return_weight)?,
        win_rate_weight: read(config, "search", "win_rate_weight", d.win_rate_weight)?,
        seed: read(config, "search", "seed", d.seed)?,
        parallel: config.get_bool("search", "parallel", d.parallel),
    };
    search.validate()?;
    Ok(search)
}

pub fn data_config(config: &dyn ConfigPort) -> Result<DataConfig, PivotraderError> {
    let delimiter = match config.get_string("data", "delimiter") {
        None => b'\t',
        Some(raw) => parse_delimiter(&raw)?,
    };
    Ok(DataConfig {
        database: non_empty(config, "data", "database"),
        input: non_empty(config, "data", "input"),
        delimiter,
    })
}

/// A single ASCII character, or the names `tab`, `comma`, `semicolon`.
fn parse_delimiter(raw: &str) -> Result<u8, PivotraderError> {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "" | "tab" | "\\t" => return Ok(b'\t'),
        "comma" => return Ok(b','),
        "semicolon" => return Ok(b';'),
        _ => {}
    }
    match raw.trim().as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(PivotraderError::invalid(
            "data",
            "delimiter",
            format!("expected a single character, got '{}'", raw),
        )),
    }
}

pub fn notify_config(config: &dyn ConfigPort) -> NotifyConfig {
    NotifyConfig {
        trade_log: non_empty(config, "notify", "trade_log"),
        telegram_token: non_empty(config, "notify", "telegram_token"),
        telegram_chat_id: non_empty(config, "notify", "telegram_chat_id"),
    }
}

/// The database path, required by every command that touches stored bars.
pub fn require_database(data: &DataConfig) -> Result<&str, PivotraderError> {
    data.database
        .as_deref()
        .ok_or_else(|| PivotraderError::ConfigMissing {
            section: "data".to_string(),
            key: "database".to_string(),
        })
}

/// Check every section a run depends on.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), PivotraderError> {
    let data = data_config(config)?;
    require_database(&data)?;
    backtest_config(config)?;
    strategy_params(config)?;
    search_config(config)?;
    Ok(())
}
