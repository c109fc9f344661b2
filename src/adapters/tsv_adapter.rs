//! Delimited text quote file reader.
//!
//! Expects a header row naming `DATETIME`, `<OPEN>`, `<HIGH>`, `<LOW>`,
//! `<CLOSE>` and `<VOL>`. Angle brackets and case are ignored; extra columns
//! are skipped.

use crate::domain::error::PivotraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%d %H%M%S",
    "%d.%m.%Y %H:%M",
];

pub struct TsvAdapter {
    path: PathBuf,
    delimiter: u8,
}

struct Columns {
    datetime: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl TsvAdapter {
    pub fn new<P: AsRef<Path>>(path: P, delimiter: u8) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every bar in the file, sorted by timestamp.
    pub fn read_bars(&self) -> Result<Vec<OhlcvBar>, PivotraderError> {
        let file = File::open(&self.path)?;
        let bars = parse_bars(file, self.delimiter)?;
        tracing::debug!(path = %self.path.display(), bars = bars.len(), "quote file parsed");
        Ok(bars)
    }
}

pub fn parse_bars<R: Read>(reader: R, delimiter: u8) -> Result<Vec<OhlcvBar>, PivotraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| PivotraderError::DataFormat {
        line: 1,
        reason: format!("unreadable header: {}", e),
    })?;
    let columns = locate_columns(headers)?;

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| PivotraderError::DataFormat {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let bar = OhlcvBar {
            timestamp: parse_timestamp(field(&record, columns.datetime, "DATETIME", line)?)
                .ok_or_else(|| PivotraderError::DataFormat {
                    line,
                    reason: format!(
                        "unrecognized timestamp '{}'",
                        record.get(columns.datetime).unwrap_or_default()
                    ),
                })?,
            open: parse_price(&record, columns.open, "OPEN", line)?,
            high: parse_price(&record, columns.high, "HIGH", line)?,
            low: parse_price(&record, columns.low, "LOW", line)?,
            close: parse_price(&record, columns.close, "CLOSE", line)?,
            volume: parse_volume(field(&record, columns.volume, "VOL", line)?, line)?,
        };
        if !bar.is_well_formed() {
            return Err(PivotraderError::DataFormat {
                line,
                reason: "prices outside the bar's high/low range".to_string(),
            });
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_ascii_uppercase()
}

fn locate_columns(headers: &csv::StringRecord) -> Result<Columns, PivotraderError> {
    let names: Vec<String> = headers.iter().map(normalize_header).collect();
    let find = |name: &str| {
        names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PivotraderError::DataFormat {
                line: 1,
                reason: format!("missing column {}", name),
            })
    };
    Ok(Columns {
        datetime: find("DATETIME")?,
        open: find("OPEN")?,
        high: find("HIGH")?,
        low: find("LOW")?,
        close: find("CLOSE")?,
        volume: find("VOL")?,
    })
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, PivotraderError> {
    record.get(index).ok_or_else(|| PivotraderError::DataFormat {
        line,
        reason: format!("missing {} value", name),
    })
}

fn parse_price(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<f64, PivotraderError> {
    let raw = field(record, index, name, line)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PivotraderError::DataFormat {
            line,
            reason: format!("invalid {} value '{}'", name, raw),
        }),
    }
}

/// Integer volumes, or whole-number floats as some exports write them.
fn parse_volume(raw: &str, line: u64) -> Result<i64, PivotraderError> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        _ => Err(PivotraderError::DataFormat {
            line,
            reason: format!("invalid VOL value '{}'", raw),
        }),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
