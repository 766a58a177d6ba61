use crate::error::Result;
use crate::model::{AggregateReading, DeviceStatus};

pub trait Telemetry {
    fn fetch_aggregate(&mut self) -> Result<AggregateReading>;

    /// `Error::DataAbsent` when the source answered without any entry for `serial`.
    fn fetch_device(&mut self, serial: &str) -> Result<DeviceStatus>;
}
