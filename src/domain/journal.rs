//! Run journal: timestamped strategy messages routed to tracing and, on the
//! final run, to the configured notification sinks.

use crate::ports::notify_port::NotifyPort;
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// `dd.mm.YYYY HH:MM, text`
pub fn format_line(at: NaiveDateTime, text: &str) -> String {
    format!("{}, {}", at.format(TIMESTAMP_FORMAT), text)
}

#[derive(Clone, Default)]
pub struct Journal {
    final_run: bool,
    sinks: Vec<Arc<dyn NotifyPort>>,
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Journal")
            .field("final_run", &self.final_run)
            .field("sinks", &names)
            .finish()
    }
}

impl Journal {
    /// Journal for search evaluations: tracing only.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Journal for the final run: important lines also reach every sink.
    pub fn final_run(sinks: Vec<Arc<dyn NotifyPort>>) -> Self {
        Journal {
            final_run: true,
            sinks,
        }
    }

    pub fn is_final_run(&self) -> bool {
        self.final_run
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn routine(&self, at: NaiveDateTime, text: &str) {
        tracing::debug!("{}", format_line(at, text));
    }

    pub fn important(&self, at: NaiveDateTime, text: &str) {
        let line = format_line(at, text);
        tracing::info!("{}", line);
        if !self.final_run {
            return;
        }
        for sink in &self.sinks {
            if let Err(e) = sink.notify(&line) {
                tracing::warn!(sink = sink.name(), "notification dropped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::PivotraderError;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        lines: Mutex<Vec<String>>,
    }

    impl NotifyPort for Collect {
        fn notify(&self, message: &str) -> Result<(), PivotraderError> {
            self.lines.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "collect"
        }
    }

    struct Broken;

    impl NotifyPort for Broken {
        fn notify(&self, _message: &str) -> Result<(), PivotraderError> {
            Err(PivotraderError::Notify {
                reason: "offline".into(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 5)
            .unwrap()
            .and_hms_opt(9, 7, 0)
            .unwrap()
    }

    #[test]
    fn line_format() {
        assert_eq!(format_line(at(), "Close=101.50"), "05.02.2024 09:07, Close=101.50");
    }

    #[test]
    fn final_run_forwards_important_lines_only() {
        let sink = Arc::new(Collect::default());
        let journal = Journal::final_run(vec![sink.clone() as Arc<dyn NotifyPort>]);
        journal.routine(at(), "Close=100.00");
        journal.important(at(), "LONG Entry: 100.00, SL: 95.00, TP: 110.00");

        let lines = sink.lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec!["05.02.2024 09:07, LONG Entry: 100.00, SL: 95.00, TP: 110.00".to_string()]
        );
    }

    #[test]
    fn silent_journal_never_notifies() {
        let journal = Journal::silent();
        journal.important(at(), "Trade Profit, Gross=1.00, NET=0.90");
        assert!(!journal.is_final_run());
        assert_eq!(journal.sink_count(), 0);
    }

    #[test]
    fn failing_sink_does_not_stop_the_others() {
        let sink = Arc::new(Collect::default());
        let broken: Arc<dyn NotifyPort> = Arc::new(Broken);
        let sinks = vec![broken, sink.clone() as Arc<dyn NotifyPort>];
        let journal = Journal::final_run(sinks);
        journal.important(at(), "Sold @99.00");
        assert_eq!(sink.lines.lock().unwrap().len(), 1);
    }
}
