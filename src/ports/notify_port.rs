//! Notification sink port trait.

use crate::domain::error::PivotraderError;

/// One-way sink for human-readable trade messages.
///
/// Implementations must tolerate concurrent callers; a failure is reported
/// to the caller, which logs it and carries on.
pub trait NotifyPort: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), PivotraderError>;

    fn name(&self) -> &str;
}
