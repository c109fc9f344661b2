#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use pivotrader::domain::error::PivotraderError;
pub use pivotrader::domain::ohlcv::OhlcvBar;
use pivotrader::ports::data_port::DataPort;
use pivotrader::ports::notify_port::NotifyPort;
use std::io::Write;
use std::sync::Mutex;

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

/// Ten-minute bars with open = close and a fixed range around the close.
pub fn bars_from_closes(closes: &[f64], half_range: f64) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start() + chrono::Duration::minutes(10 * i as i64),
            open: close,
            high: close + half_range,
            low: close - half_range,
            close,
            volume: 1_000,
        })
        .collect()
}

/// Oscillating prices that trigger entries on both sides.
pub fn wave_bars(count: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| 100.0 + 8.0 * (i as f64 * 0.35).sin() + 0.01 * i as f64)
        .collect();
    bars_from_closes(&closes, 1.5)
}

/// Constant prices: every RSI denominator is zero.
pub fn flat_bars(count: usize) -> Vec<OhlcvBar> {
    bars_from_closes(&vec![100.0; count], 1.0)
}

pub fn quote_file_text(bars: &[OhlcvBar]) -> String {
    let mut text = String::from("DATETIME\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<VOL>\n");
    for b in bars {
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    text
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// In-memory bar store.
pub struct MockDataPort {
    pub bars: Mutex<Vec<OhlcvBar>>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: Mutex::new(Vec::new()),
            error: None,
        }
    }

    pub fn with_bars(bars: Vec<OhlcvBar>) -> Self {
        Self {
            bars: Mutex::new(bars),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Mutex::new(Vec::new()),
            error: Some(reason.to_string()),
        }
    }

    fn check(&self) -> Result<(), PivotraderError> {
        match &self.error {
            Some(reason) => Err(PivotraderError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self) -> Result<Vec<OhlcvBar>, PivotraderError> {
        self.check()?;
        Ok(self.bars.lock().unwrap().clone())
    }

    fn replace_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PivotraderError> {
        self.check()?;
        *self.bars.lock().unwrap() = bars.to_vec();
        Ok(bars.len())
    }

    fn data_range(
        &self,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PivotraderError> {
        self.check()?;
        let bars = self.bars.lock().unwrap();
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.timestamp, last.timestamp, bars.len()))),
            _ => Ok(None),
        }
    }
}

/// Sink that keeps every message.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotifyPort for RecordingSink {
    fn notify(&self, message: &str) -> Result<(), PivotraderError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
