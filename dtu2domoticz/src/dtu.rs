use log::{debug, trace};

use crate::dtu_response::{self, InverterLiveData, LiveDataStatus};
use crate::error::{Error, Result};
use crate::http_wrapper::{HttpConfig, HttpWrapper};
use crate::model::{AggregateReading, DeviceStatus};
use crate::telemetry::Telemetry;

const LIVE_DATA: &str = "/api/livedata/status";

/// Reads live data from an OpenDTU.
pub struct OpenDtu<HTTP: HttpWrapper> {
    client: HTTP,
    base_url: String,
}

impl<HTTP: HttpWrapper> OpenDtu<HTTP> {
    pub fn new(base_url: &str, config: &HttpConfig) -> Self {
        Self::with_client(base_url, HTTP::new(config))
    }

    pub fn with_client(base_url: &str, client: HTTP) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get(&mut self, query: &[(&str, String)]) -> Result<(u16, String)> {
        let url = format!("{}{}", self.base_url, LIVE_DATA);
        let response = self.client.get(&url, query)?;
        trace!("{url} {query:?} -> {} {}", response.status, response.body);

        if !response.is_success() {
            return Err(Error::protocol(
                Some(response.status),
                format!("OpenDTU answered HTTP {}", response.status),
            ));
        }
        Ok((response.status, response.body))
    }
}

impl<HTTP: HttpWrapper> Telemetry for OpenDtu<HTTP> {
    fn fetch_aggregate(&mut self) -> Result<AggregateReading> {
        let (status, body) = self.get(&[])?;
        let reading = dtu_response::decode::<LiveDataStatus>(status, &body)?.into_reading();
        debug!("live data: {reading:?}");
        Ok(reading)
    }

    fn fetch_device(&mut self, serial: &str) -> Result<DeviceStatus> {
        let (status, body) = self.get(&[("inv", serial.to_string())])?;
        dtu_response::decode::<InverterLiveData>(status, &body)?.into_status()
    }
}
