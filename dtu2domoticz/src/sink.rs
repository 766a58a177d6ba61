use crate::error::Result;
use crate::model::{SinkTarget, WattHours, Watts};

/// Both pushes return the HTTP status on success.
pub trait Sink {
    fn push_reading(&mut self, target: &SinkTarget, power: Watts, energy: WattHours) -> Result<u16>;

    fn push_meter(&mut self, target: &SinkTarget, power: Watts, total: WattHours) -> Result<u16>;
}
