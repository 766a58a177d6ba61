use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::http_wrapper::HttpConfig;
use crate::model::SinkTarget;
use crate::registry::Document;
use crate::telegram::TelegramConfig;

pub const DEFAULT_FILE_NAME: &str = "data.json";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;
const OUTPUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings. Built from the registry document, then overridden by
/// the environment. Overrides are never written back to the file.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub dtu_base_url: String,
    pub domoticz_base_url: String,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub telegram: Option<TelegramConfig>,
    pub global_solar: Option<SinkTarget>,
    pub global_solar_historic: Option<SinkTarget>,
}

impl Config {
    pub fn from_document(document: &Document) -> Config {
        let global = &document.global_config;
        Config {
            dtu_base_url: global.dtu_base_url.clone(),
            domoticz_base_url: global.domoticz_base_url.clone(),
            interval: Duration::from_secs(global.sleep_duration),
            request_timeout: Duration::from_millis(
                global
                    .request_timeout_ms
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            telegram: document.telegram.clone(),
            global_solar: document.global_solar.as_ref().map(|t| t.target()),
            global_solar_historic: document.global_solar_historic.as_ref().map(|t| t.target()),
        }
    }

    pub fn load(document: &Document) -> Config {
        Self::from_document(document).with_overrides(|key| env::var(key).ok())
    }

    /// `lookup` is `env::var` in production.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Config {
        // $DTU_BASE_URL
        if let Some(url) = lookup("DTU_BASE_URL") {
            self.dtu_base_url = url;
        }
        // $DOMOTICZ_BASE_URL
        if let Some(url) = lookup("DOMOTICZ_BASE_URL") {
            self.domoticz_base_url = url;
        }
        // $SLEEP_DURATION (seconds)
        if let Some(seconds) = lookup("SLEEP_DURATION") {
            match seconds.parse() {
                Ok(seconds) => self.interval = Duration::from_secs(seconds),
                Err(e) => warn!("ignoring SLEEP_DURATION={seconds}: {e}"),
            }
        }
        // $REQUEST_TIMEOUT_MS
        if let Some(millis) = lookup("REQUEST_TIMEOUT_MS") {
            match millis.parse() {
                Ok(millis) => self.request_timeout = Duration::from_millis(millis),
                Err(e) => warn!("ignoring REQUEST_TIMEOUT_MS={millis}: {e}"),
            }
        }
        // $TELEGRAM_TOKEN / $TELEGRAM_CHAT_ID
        if let Some(token) = lookup("TELEGRAM_TOKEN") {
            self.telegram.get_or_insert_with(TelegramConfig::default).token = token;
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.get_or_insert_with(TelegramConfig::default).chat_id = chat_id;
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.dtu_base_url.is_empty()
            && !self.domoticz_base_url.is_empty()
            && !self.interval.is_zero()
            && !self.request_timeout.is_zero()
    }

    /// Telegram settings, if complete.
    pub fn telegram(&self) -> Option<&TelegramConfig> {
        self.telegram.as_ref().filter(|t| t.is_valid())
    }

    /// Client settings for OpenDTU polling.
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.request_timeout,
            ..HttpConfig::default()
        }
    }

    /// Client settings for Domoticz and Telegram, never tighter than polling.
    pub fn output_http(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.request_timeout.max(OUTPUT_TIMEOUT),
            ..HttpConfig::default()
        }
    }
}

/// `$DATA_FILE` if set, otherwise `data.json` in the working directory,
/// otherwise next to the executable.
pub fn locate() -> PathBuf {
    if let Ok(path) = env::var("DATA_FILE") {
        return PathBuf::from(path);
    }

    let mut path = env::current_dir().unwrap_or_default();
    path.push(DEFAULT_FILE_NAME);
    if path.exists() {
        return path;
    }

    match env::current_exe() {
        Ok(mut exe) => {
            exe.pop();
            exe.push(DEFAULT_FILE_NAME);
            exe
        }
        Err(_) => path,
    }
}
