use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};

use crate::http_wrapper::{HttpConfig, HttpWrapper};
use crate::notifier::Notifier;

const API_URL: &str = "https://api.telegram.org";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }
}

/* {"ok":false,"error_code":400,"description":"Bad Request: chat not found"} */
#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

pub struct Telegram<HTTP: HttpWrapper> {
    client: HTTP,
    config: TelegramConfig,
    api_url: String,
}

impl<HTTP: HttpWrapper> Telegram<HTTP> {
    pub fn new(config: &TelegramConfig, http: &HttpConfig) -> Self {
        Self::with_client(config, HTTP::new(http))
    }

    pub fn with_client(config: &TelegramConfig, client: HTTP) -> Self {
        Self {
            client,
            config: config.clone(),
            api_url: API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

impl<HTTP: HttpWrapper> Notifier for Telegram<HTTP> {
    fn send(&mut self, message: &str) -> bool {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.config.token);
        let query = [
            ("chat_id", self.config.chat_id.clone()),
            ("text", message.to_string()),
            ("parse_mode", "HTML".to_string()),
        ];

        let response = match self.client.get(&url, &query) {
            Ok(response) => response,
            Err(e) => {
                warn!("telegram message not sent: {e}");
                return false;
            }
        };

        match serde_json::from_str::<SendMessageResponse>(&response.body) {
            Ok(body) if body.ok && response.is_success() => {
                debug!("telegram message delivered");
                true
            }
            Ok(body) => {
                warn!(
                    "telegram refused message (HTTP {}): {}",
                    response.status,
                    body.description.unwrap_or_default()
                );
                false
            }
            Err(e) => {
                warn!("telegram answered HTTP {} with {e}", response.status);
                false
            }
        }
    }
}
