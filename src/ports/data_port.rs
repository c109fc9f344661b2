//! Bar storage port trait.

use crate::domain::error::PivotraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// All stored bars in timestamp order.
    fn fetch_bars(&self) -> Result<Vec<OhlcvBar>, PivotraderError>;

    /// Replace the stored series. Returns the number of bars written.
    fn replace_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PivotraderError>;

    /// First timestamp, last timestamp and bar count, or `None` when empty.
    fn data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PivotraderError>;
}
