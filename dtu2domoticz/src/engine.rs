//! One reconciliation cycle: OpenDTU → Domoticz, plus the production state
//! machines that drive Telegram notifications and registry persistence.

use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, error, info, warn};

use crate::error::Result;
use crate::model::{AggregateReading, DeviceStatus, SinkTarget};
use crate::notifier::Notifier;
use crate::registry::{Registry, RegistryStore};
use crate::sink::Sink;
use crate::telemetry::Telemetry;

pub const ALL_STOPPED: &str = "🌜 All inverters stopped!";
pub const ALL_STARTED: &str = "🔆 All inverters started!";

/// Notification guards. Lives as long as the process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    pub all_started_notified: bool,
    pub all_stopped_notified: bool,
    /// Back to `false` only on the transition into all-started.
    pub daily_report_sent: bool,
}

/// Derived from the device states on every tick, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateState {
    Mixed,
    AllStopped,
    AllStarted,
}

impl AggregateState {
    /// An empty registry is `Mixed`, so neither transition can fire.
    pub fn of(registry: &Registry) -> AggregateState {
        if registry.none_producing() {
            AggregateState::AllStopped
        } else if registry.all_producing() {
            AggregateState::AllStarted
        } else {
            AggregateState::Mixed
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Started,
    Ended,
}

/// Per-device edge detection. Only a successful read gets here.
pub fn production_transition(was_producing: bool, producing: bool) -> Option<Transition> {
    match (was_producing, producing) {
        (false, true) => Some(Transition::Started),
        (true, false) => Some(Transition::Ended),
        _ => None,
    }
}

/// Global Domoticz devices fed from the plant-wide reading.
#[derive(Clone, Debug, Default)]
pub struct Targets {
    /// Instant power + day energy.
    pub reading: Option<SinkTarget>,
    /// P1 meter carrying the lifetime yield.
    pub meter: Option<SinkTarget>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub aggregate: Duration,
    pub devices: Duration,
    pub total: Duration,
    pub failed_devices: usize,
    pub notifications: usize,
    pub saves: usize,
}

pub struct Engine {
    telemetry: Box<dyn Telemetry>,
    sink: Box<dyn Sink>,
    notifiers: Vec<Box<dyn Notifier>>,
    store: Box<dyn RegistryStore>,
    targets: Targets,
    registry: Registry,
    state: RunState,
    last_aggregate: Option<AggregateReading>,
}

impl Engine {
    pub fn new(
        telemetry: Box<dyn Telemetry>,
        sink: Box<dyn Sink>,
        store: Box<dyn RegistryStore>,
        registry: Registry,
        targets: Targets,
    ) -> Self {
        Self {
            telemetry,
            sink,
            notifiers: Vec::new(),
            store,
            targets,
            registry,
            state: RunState::default(),
            last_aggregate: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn last_aggregate(&self) -> Option<AggregateReading> {
        self.last_aggregate
    }

    /// Runs all steps in order. Step failures are logged and absorbed; the
    /// only error returned is a fatal persistence failure.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let tic = Instant::now();
        self.update_aggregate();
        report.aggregate = tic.elapsed();
        info!("1 - Duration : {:.4} seconds", report.aggregate.as_secs_f64());

        let tic = Instant::now();
        self.update_devices(&mut report)?;
        report.devices = tic.elapsed();
        info!("2 - Duration : {:.4} seconds", report.devices.as_secs_f64());

        self.update_aggregate_state(&mut report)?;
        self.send_daily_report(&mut report)?;

        report.total = started.elapsed();
        info!("== Total Duration : {:.4} seconds", report.total.as_secs_f64());
        Ok(report)
    }

    fn update_aggregate(&mut self) {
        let reading = match self.telemetry.fetch_aggregate() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("No live data received: {e}");
                return;
            }
        };
        self.last_aggregate = Some(reading);

        if let Some(target) = &self.targets.reading {
            let result = self
                .sink
                .push_reading(target, reading.power, reading.yield_day);
            log_push("1.1", target, result);
        }

        if let Some(target) = &self.targets.meter {
            match reading.yield_total {
                Some(total) => {
                    let result = self.sink.push_meter(target, reading.power, total);
                    log_push("1.2", target, result);
                }
                None => warn!("No lifetime yield in live data, {} not updated", target.name),
            }
        }
    }

    fn update_devices(&mut self, report: &mut CycleReport) -> Result<()> {
        for index in 0..self.registry.len() {
            let serial = self.registry.devices()[index].serial.clone();

            match self.telemetry.fetch_device(&serial) {
                Ok(status) => self.apply_status(index, status, report),
                Err(e) => {
                    let device = &mut self.registry.devices_mut()[index];
                    device.failure_count += 1;
                    warn!(
                        "No data received for inverter {} ({serial}): {e}, failure count now {}",
                        device.sink.name, device.failure_count
                    );
                    report.failed_devices += 1;
                    self.persist(report)?;
                }
            }
        }
        Ok(())
    }

    fn apply_status(&mut self, index: usize, status: DeviceStatus, report: &mut CycleReport) {
        let (producing, power, energy) = match status {
            DeviceStatus::Producing(reading) => (true, reading.power, reading.yield_day),
            DeviceStatus::NotProducing => (false, 0.0, 0),
        };

        let device = &mut self.registry.devices_mut()[index];
        let transition = production_transition(device.producing, producing);
        device.producing = producing;
        let serial = device.serial.clone();
        let target = device.sink.clone();

        match transition {
            Some(Transition::Started) => {
                self.notify(&format!("Production started for {}", target.name), report)
            }
            Some(Transition::Ended) => {
                self.notify(&format!("Production ended for {}", target.name), report)
            }
            None => {}
        }

        if producing {
            debug!("Inverter {} is producing energy", target.name);
        } else {
            debug!("Inverter {} is NOT producing energy, sending zero values", target.name);
        }

        match self.sink.push_reading(&target, power, energy) {
            Ok(status) => info!("Inverter {} ({serial}) : HTTP {status}", target.name),
            Err(e) => warn!("Update of inverter {} ({serial}) failed: {e}", target.name),
        }
    }

    fn update_aggregate_state(&mut self, report: &mut CycleReport) -> Result<()> {
        match AggregateState::of(&self.registry) {
            AggregateState::AllStopped if !self.state.all_stopped_notified => {
                info!("All inverters are NOT producing now");
                self.notify(ALL_STOPPED, report);
                self.state.all_stopped_notified = true;
                self.state.all_started_notified = false;
            }
            AggregateState::AllStarted if !self.state.all_started_notified => {
                info!("All inverters are producing now");
                self.notify(ALL_STARTED, report);
                self.state.all_started_notified = true;
                self.state.all_stopped_notified = false;
                self.state.daily_report_sent = false;

                info!("Reset failure counter for each inverter");
                self.registry.reset_failures();
                self.persist(report)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn send_daily_report(&mut self, report: &mut CycleReport) -> Result<()> {
        if !self.state.all_stopped_notified || self.state.daily_report_sent {
            return Ok(());
        }

        info!("Time to send daily production message");
        let today = Local::now().format("%Y-%m-%d");
        let message = match self.last_aggregate {
            Some(reading) => format!(
                "🌞 Solar production on {today} : {} kWh",
                reading.yield_day_kwh()
            ),
            None => format!("🌞 Solar production on {today} : unknown, no live data received"),
        };
        self.notify(&message, report);

        let summary = self.registry.failure_summary();
        info!("Summary of failures for today:\n{summary}");
        self.notify(&summary, report);
        self.state.daily_report_sent = true;

        info!("Reset failure counter for each inverter");
        self.registry.reset_failures();
        self.persist(report)
    }

    fn notify(&mut self, message: &str, report: &mut CycleReport) {
        report.notifications += 1;
        for notifier in self.notifiers.iter_mut() {
            if !notifier.send(message) {
                warn!("notification not delivered: {message}");
            }
        }
    }

    fn persist(&mut self, report: &mut CycleReport) -> Result<()> {
        report.saves += 1;
        match self.store.save(&self.registry) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("Unable to persist registry, keeping in-memory state: {e}");
                Ok(())
            }
        }
    }
}

fn log_push(step: &str, target: &SinkTarget, result: Result<u16>) {
    match result {
        Ok(status) => info!("{step} - OK : {} HTTP {status}", target.name),
        Err(e) => warn!("{step} - KO : update of {} failed: {e}", target.name),
    }
}
