//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "telegram")]
pub mod telegram_adapter;
pub mod trade_log_adapter;
pub mod tsv_adapter;
