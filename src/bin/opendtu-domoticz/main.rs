mod logging;
mod reqwest_wrapper;

use anyhow::{bail, Context};
use dtu2domoticz::config::{self, Config};
use dtu2domoticz::domoticz::Domoticz;
use dtu2domoticz::dtu::OpenDtu;
use dtu2domoticz::engine::{Engine, Targets};
use dtu2domoticz::notifier::LogNotifier;
use dtu2domoticz::registry::{FileStore, Registry};
use dtu2domoticz::scheduler::Scheduler;
use dtu2domoticz::telegram::Telegram;
use reqwest_wrapper::ReqwestWrapper;

use log::{error, info, warn};

fn main() -> anyhow::Result<()> {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!(
            "Arguments passed. Tool is configured by {} in its path or $DATA_FILE",
            config::DEFAULT_FILE_NAME
        );
    }

    let path = config::locate();
    info!("loading inverter registry from {}", path.display());
    let store = FileStore::open(&path)
        .with_context(|| format!("could not load {}", path.display()))?;

    let config = Config::load(store.document());
    if !config.is_valid() {
        bail!(
            "{}: global_config needs dtu_base_url, domoticz_base_url and a non-zero sleep_duration",
            path.display()
        );
    }
    let registry = Registry::from_document(store.document());

    info!("OpenDTU: {}", config.dtu_base_url);
    info!("Domoticz: {}", config.domoticz_base_url);
    if registry.is_empty() {
        warn!("no solar units configured, only plant-wide values are forwarded");
    }
    for device in registry.devices() {
        info!("inverter {} ({}) -> idx {}", device.name(), device.serial, device.sink.idx);
    }

    let targets = Targets {
        reading: config.global_solar.clone(),
        meter: config.global_solar_historic.clone(),
    };
    let output_http = config.output_http();
    let mut engine = Engine::new(
        Box::new(OpenDtu::<ReqwestWrapper>::new(&config.dtu_base_url, &config.http())),
        Box::new(Domoticz::<ReqwestWrapper>::new(&config.domoticz_base_url, &output_http)),
        Box::new(store),
        registry,
        targets,
    );

    engine = match config.telegram() {
        Some(telegram) => {
            info!("Sending notifications to Telegram");
            engine.with_notifier(Box::new(Telegram::<ReqwestWrapper>::new(telegram, &output_http)))
        }
        None => {
            info!("No Telegram credentials, notifications are only logged");
            engine.with_notifier(Box::new(LogNotifier))
        }
    };

    Scheduler::new(config.interval)
        .run(&mut engine, None)
        .context("polling stopped")?;
    Ok(())
}
