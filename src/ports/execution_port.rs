//! Execution host port trait.
//!
//! The strategy only decides what to order. Matching, commission and
//! position bookkeeping live behind this trait; status changes come back
//! as [`OrderUpdate`](crate::domain::order::OrderUpdate) events.

use crate::domain::order::{BracketRequest, OrderHandle};

pub trait ExecutionPort {
    /// Queue a bracket (market entry, stop leg, limit leg). Returns the
    /// handle of the entry order.
    fn submit_bracket(&mut self, request: BracketRequest) -> OrderHandle;

    /// Signed net position: positive long, negative short.
    fn position(&self) -> i64;

    fn cash(&self) -> f64;

    fn last_close(&self) -> f64;
}
