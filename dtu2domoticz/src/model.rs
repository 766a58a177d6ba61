pub type Watts = f64;
pub type WattHours = u64;

/// Plant-wide values of one tick. Energies are in Wh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateReading {
    pub power: Watts,
    pub yield_day: WattHours,
    pub yield_total: Option<WattHours>,
}

impl AggregateReading {
    pub fn yield_day_kwh(&self) -> f64 {
        self.yield_day as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceReading {
    pub power: Watts,
    pub yield_day: WattHours,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceStatus {
    Producing(DeviceReading),
    NotProducing,
}

/// Where a value lands in Domoticz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTarget {
    pub idx: String,
    pub name: String,
}

pub(crate) fn round_power(value: f64) -> Watts {
    (value * 10.0).round() / 10.0
}

pub(crate) fn to_watt_hours(value: f64) -> WattHours {
    if value.is_finite() && value > 0.0 {
        value.round() as WattHours
    } else {
        0
    }
}
