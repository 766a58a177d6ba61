use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::engine::{CycleReport, Engine};
use crate::error::Result;

pub trait Cycle {
    fn run_cycle(&mut self) -> Result<CycleReport>;
}

impl Cycle for Engine {
    fn run_cycle(&mut self) -> Result<CycleReport> {
        Engine::run_cycle(self)
    }
}

/// Fixed-interval driver. One cycle at a time, then sleep.
pub struct Scheduler {
    interval: Duration,
    sleeper: Box<dyn FnMut(Duration)>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sleeper: Box::new(thread::sleep),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Runs until `max_ticks` cycles completed (forever with `None`).
    /// Returns early only on a fatal error. A cycle that panics or fails
    /// otherwise is logged and the next tick runs as usual.
    pub fn run(&mut self, cycle: &mut dyn Cycle, max_ticks: Option<u64>) -> Result<u64> {
        info!("polling every {:.2}s", self.interval.as_secs_f64());
        let mut tick: u64 = 0;

        while max_ticks.map_or(true, |max| tick < max) {
            tick += 1;

            match panic::catch_unwind(AssertUnwindSafe(|| cycle.run_cycle())) {
                Ok(Ok(report)) => debug!("tick {tick}: {report:?}"),
                Ok(Err(e)) if e.is_fatal() => {
                    error!("tick {tick}: fatal error, giving up: {e}");
                    return Err(e);
                }
                Ok(Err(e)) => error!("tick {tick} failed: {e}"),
                Err(panic) => error!("tick {tick} panicked: {}", panic_message(panic.as_ref())),
            }

            debug!("sleep for {:.2}s", self.interval.as_secs_f64());
            (self.sleeper)(self.interval);
        }
        Ok(tick)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
