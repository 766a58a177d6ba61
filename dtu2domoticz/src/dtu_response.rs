use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{self, AggregateReading, DeviceReading, DeviceStatus};

#[derive(Deserialize)]
pub struct Value {
    pub v: f64,
}

#[derive(Deserialize)]
pub struct Total {
    #[serde(rename = "Power")]
    pub power: Value,
    #[serde(rename = "YieldDay")]
    pub yield_day: Value,
    #[serde(rename = "YieldTotal")]
    pub yield_total: Option<Value>,
}

/* GET /api/livedata/status */
#[derive(Deserialize)]
pub struct LiveDataStatus {
    pub total: Total,
}

#[derive(Deserialize)]
pub struct Channel {
    #[serde(rename = "Power DC")]
    pub power_dc: Value,
    #[serde(rename = "YieldDay")]
    pub yield_day: Value,
}

#[derive(Deserialize)]
pub struct Inverter {
    pub producing: bool,
    #[serde(rename = "INV", default)]
    pub inv: HashMap<String, Channel>,
}

/* GET /api/livedata/status?inv=<serial> */
#[derive(Deserialize)]
pub struct InverterLiveData {
    pub inverters: Option<Vec<Inverter>>,
}

impl LiveDataStatus {
    /// `YieldTotal` comes in kWh and is scaled to Wh here.
    pub fn into_reading(self) -> AggregateReading {
        AggregateReading {
            power: model::round_power(self.total.power.v),
            yield_day: model::to_watt_hours(self.total.yield_day.v),
            yield_total: self
                .total
                .yield_total
                .map(|total| model::to_watt_hours(total.v * 1000.0)),
        }
    }
}

impl InverterLiveData {
    /// Only the first inverter entry is considered.
    pub fn into_status(self) -> Result<DeviceStatus> {
        let inverter = self
            .inverters
            .and_then(|inverters| inverters.into_iter().next())
            .ok_or(Error::DataAbsent)?;

        if !inverter.producing {
            return Ok(DeviceStatus::NotProducing);
        }

        let channel = inverter
            .inv
            .get("0")
            .ok_or_else(|| Error::protocol(None, "producing inverter without INV channel 0"))?;

        Ok(DeviceStatus::Producing(DeviceReading {
            power: model::round_power(channel.power_dc.v),
            yield_day: model::to_watt_hours(channel.yield_day.v),
        }))
    }
}

pub fn decode<'a, T: Deserialize<'a>>(status: u16, body: &'a str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::protocol(Some(status), e.to_string()))
}
