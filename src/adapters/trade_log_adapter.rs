//! Plain-text trade log sink.

use crate::domain::error::PivotraderError;
use crate::ports::notify_port::NotifyPort;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct TradeLogAdapter {
    path: PathBuf,
    file: Mutex<File>,
}

impl TradeLogAdapter {
    /// Create or truncate the log at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, PivotraderError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotifyPort for TradeLogAdapter {
    fn notify(&self, message: &str) -> Result<(), PivotraderError> {
        let mut file = self.file.lock().map_err(|_| PivotraderError::Notify {
            reason: format!("trade log {} lock poisoned", self.path.display()),
        })?;
        writeln!(file, "{}", message)?;
        file.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "trade-log"
    }
}
