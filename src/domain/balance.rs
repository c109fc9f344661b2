//! Latest account balance published by the final run.

use chrono::NaiveDateTime;

pub const INITIAL_BALANCE: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceBoard {
    balance: f64,
    updated_at: Option<NaiveDateTime>,
}

impl Default for BalanceBoard {
    fn default() -> Self {
        BalanceBoard {
            balance: INITIAL_BALANCE,
            updated_at: None,
        }
    }
}

impl BalanceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, balance: f64, at: NaiveDateTime) {
        self.balance = balance;
        self.updated_at = Some(at);
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    pub fn describe(&self) -> String {
        format!("Current balance: {:.2}", self.balance)
    }
}
