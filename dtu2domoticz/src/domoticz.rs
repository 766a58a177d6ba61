use log::trace;

use crate::error::{Error, Result};
use crate::http_wrapper::{HttpConfig, HttpWrapper};
use crate::model::{SinkTarget, WattHours, Watts};
use crate::sink::Sink;

const JSON_API: &str = "/json.htm";

/// Updates Domoticz virtual sensors through `param=udevice`.
pub struct Domoticz<HTTP: HttpWrapper> {
    client: HTTP,
    base_url: String,
}

impl<HTTP: HttpWrapper> Domoticz<HTTP> {
    pub fn new(base_url: &str, config: &HttpConfig) -> Self {
        Self::with_client(base_url, HTTP::new(config))
    }

    pub fn with_client(base_url: &str, client: HTTP) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn update_device(&mut self, target: &SinkTarget, svalue: String) -> Result<u16> {
        let url = format!("{}{}", self.base_url, JSON_API);
        let query = [
            ("type", "command".to_string()),
            ("param", "udevice".to_string()),
            ("idx", target.idx.clone()),
            ("nvalue", "0".to_string()),
            ("svalue", svalue),
        ];
        let response = self.client.get(&url, &query)?;
        trace!("{} ({}) -> {}", target.name, target.idx, response.status);

        if response.is_success() {
            Ok(response.status)
        } else {
            Err(Error::protocol(
                Some(response.status),
                format!("update of {} rejected", target.name),
            ))
        }
    }
}

/// Electric (instant + counter) sensors take `POWER;ENERGY`.
pub fn reading_svalue(power: Watts, energy: WattHours) -> String {
    format!("{power};{energy}")
}

/// P1 smart meter layout is `USAGE1;USAGE2;RETURN1;RETURN2;CONS;PROD`.
pub fn meter_svalue(power: Watts, total: WattHours) -> String {
    format!("0;0;{total};0;0;{power}")
}

impl<HTTP: HttpWrapper> Sink for Domoticz<HTTP> {
    fn push_reading(&mut self, target: &SinkTarget, power: Watts, energy: WattHours) -> Result<u16> {
        self.update_device(target, reading_svalue(power, energy))
    }

    fn push_meter(&mut self, target: &SinkTarget, power: Watts, total: WattHours) -> Result<u16> {
        self.update_device(target, meter_svalue(power, total))
    }
}
