//! Domain error types.

/// Arithmetic fault raised inside the indicator pipeline.
///
/// A fault aborts the current run only; the run driver turns it into a
/// zero-fitness outcome instead of propagating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumericFault {
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
}

/// Top-level error type for pivotrader.
#[derive(Debug, thiserror::Error)]
pub enum PivotraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data format error at line {line}: {reason}")]
    DataFormat { line: u64, reason: String },

    #[error("no bars available in {source_name}")]
    NoData { source_name: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PivotraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PivotraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&PivotraderError> for std::process::ExitCode {
    fn from(err: &PivotraderError) -> Self {
        let code: u8 = match err {
            PivotraderError::Io(_) => 1,
            PivotraderError::ConfigParse { .. }
            | PivotraderError::ConfigMissing { .. }
            | PivotraderError::ConfigInvalid { .. } => 2,
            PivotraderError::Database { .. } | PivotraderError::DatabaseQuery { .. } => 3,
            PivotraderError::DataFormat { .. } => 4,
            PivotraderError::NoData { .. } => 5,
            PivotraderError::Notify { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
