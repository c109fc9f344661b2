//! Telegram Bot API notification sink.

use crate::domain::config_validation::NotifyConfig;
use crate::domain::error::PivotraderError;
use crate::ports::notify_port::NotifyPort;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
const SEND_PAUSE: Duration = Duration::from_millis(12);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramAdapter {
    client: reqwest::blocking::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramAdapter {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, PivotraderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PivotraderError::Notify {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", API_BASE, token),
            chat_id: chat_id.to_string(),
        })
    }

    /// Credentials from `[notify]`, falling back to `TELEGRAM_TOKEN` and
    /// `TELEGRAM_CHAT_ID`. `None` when either is absent.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, PivotraderError> {
        let token = config
            .telegram_token
            .clone()
            .or_else(|| std::env::var("TELEGRAM_TOKEN").ok());
        let chat_id = config
            .telegram_chat_id
            .clone()
            .or_else(|| std::env::var("TELEGRAM_CHAT_ID").ok());
        match (token, chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Self::new(&token, &chat_id).map(Some)
            }
            _ => Ok(None),
        }
    }
}

impl NotifyPort for TelegramAdapter {
    fn notify(&self, message: &str) -> Result<(), PivotraderError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };
        let result = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .and_then(|resp| resp.json::<ApiResponse>());
        std::thread::sleep(SEND_PAUSE);

        match result {
            Ok(ApiResponse { ok: true, .. }) => {
                tracing::debug!(chat_id = %self.chat_id, "telegram message sent");
                Ok(())
            }
            Ok(ApiResponse { description, .. }) => Err(PivotraderError::Notify {
                reason: description.unwrap_or_else(|| "telegram rejected the message".into()),
            }),
            Err(e) => Err(PivotraderError::Notify {
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
