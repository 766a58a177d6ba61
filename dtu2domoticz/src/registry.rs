use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::SinkTarget;
use crate::telegram::TelegramConfig;

fn default_max_power() -> u32 {
    400
}

fn default_sleep_duration() -> u64 {
    3
}

/// Domoticz hands out `idx` as a string, older files store it as a number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SinkId(pub String);

impl<'de> serde::Deserialize<'de> for SinkId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::String(idx) => Ok(SinkId(idx)),
            Value::Number(idx) => Ok(SinkId(idx.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "idx must be a string or a number, got {other}"
            ))),
        }
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct UnitEntry {
    /// `null` when provisioning could not create the Domoticz device.
    #[serde(default)]
    pub idx: Option<SinkId>,
    pub name: String,
    #[serde(default = "default_max_power")]
    pub max_power: u32,
    #[serde(default)]
    pub failures: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TargetEntry {
    pub idx: SinkId,
    pub name: String,
    #[serde(default)]
    pub failures: u32,
}

impl TargetEntry {
    pub fn target(&self) -> SinkTarget {
        SinkTarget {
            idx: self.idx.0.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub dtu_base_url: String,
    #[serde(default)]
    pub domoticz_base_url: String,
    /// Seconds between two ticks.
    #[serde(default = "default_sleep_duration")]
    pub sleep_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dtu_base_url: String::new(),
            domoticz_base_url: String::new(),
            sleep_duration: default_sleep_duration(),
            request_timeout_ms: None,
        }
    }
}

/// The registry file as written by the provisioning script.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub solar_units: BTreeMap<String, UnitEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_solar: Option<TargetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_solar_historic: Option<TargetEntry>,
    #[serde(default)]
    pub global_config: GlobalConfig,
    // keys this program does not know about survive a rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Format::Toml,
            _ => Format::Json,
        }
    }

    fn decode(self, contents: &str) -> std::result::Result<Document, String> {
        match self {
            Format::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    fn encode(self, document: &Document) -> Result<String> {
        match self {
            Format::Json => serde_json::to_string_pretty(document)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| Error::Encode(e.to_string())),
            Format::Toml => toml::to_string(document).map_err(|e| Error::Encode(e.to_string())),
        }
    }
}

/// Parses the registry file. A missing file is an error; the provisioning
/// step is responsible for creating it.
pub fn load(path: &Path) -> Result<Document> {
    let contents = fs::read_to_string(path)?;
    Format::from_path(path)
        .decode(&contents)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceRecord {
    pub serial: String,
    pub sink: SinkTarget,
    pub max_power: u32,
    pub failure_count: u32,
    /// Last known production state. Never persisted.
    pub producing: bool,
}

impl DeviceRecord {
    pub fn new(serial: &str, idx: &str, name: &str) -> Self {
        Self {
            serial: serial.to_string(),
            sink: SinkTarget {
                idx: idx.to_string(),
                name: name.to_string(),
            },
            max_power: default_max_power(),
            failure_count: 0,
            producing: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.sink.name
    }
}

/// Monitored inverters, keyed by serial.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Registry {
    devices: Vec<DeviceRecord>,
}

impl Registry {
    pub fn new(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let mut devices: Vec<DeviceRecord> = Vec::new();
        for record in records {
            if devices.iter().any(|d| d.serial == record.serial) {
                warn!("duplicate inverter serial {} ignored", record.serial);
                continue;
            }
            devices.push(record);
        }
        Self { devices }
    }

    /// Units without a Domoticz `idx` are left out of monitoring.
    pub fn from_document(document: &Document) -> Self {
        Self::new(document.solar_units.iter().filter_map(|(serial, unit)| {
            let Some(idx) = &unit.idx else {
                warn!("inverter {} ({serial}) has no Domoticz idx, not monitored", unit.name);
                return None;
            };
            Some(DeviceRecord {
                serial: serial.clone(),
                sink: SinkTarget {
                    idx: idx.0.clone(),
                    name: unit.name.clone(),
                },
                max_power: unit.max_power,
                failure_count: unit.failures,
                producing: false,
            })
        }))
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [DeviceRecord] {
        &mut self.devices
    }

    pub fn get(&self, serial: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.serial == serial)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// False for an empty registry.
    pub fn all_producing(&self) -> bool {
        !self.is_empty() && self.devices.iter().all(|d| d.producing)
    }

    /// False for an empty registry.
    pub fn none_producing(&self) -> bool {
        !self.is_empty() && self.devices.iter().all(|d| !d.producing)
    }

    pub fn reset_failures(&mut self) {
        self.devices.iter_mut().for_each(|d| d.failure_count = 0);
    }

    /// One entry per device, zero counts included.
    pub fn failure_summary(&self) -> String {
        self.devices
            .iter()
            .map(|d| {
                format!(
                    "<b>{}</b>  ({})  :\n{} communication failures",
                    d.name(),
                    d.serial,
                    d.failure_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait RegistryStore {
    fn save(&mut self, registry: &Registry) -> Result<()>;
}

/// Writes the whole registry file back on every save.
pub struct FileStore {
    path: PathBuf,
    format: Format,
    document: Document,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let document = load(path)?;
        Ok(Self::new(path, document))
    }

    pub fn new(path: &Path, document: Document) -> Self {
        Self {
            path: path.to_path_buf(),
            format: Format::from_path(path),
            document,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistryStore for FileStore {
    fn save(&mut self, registry: &Registry) -> Result<()> {
        for device in registry.devices() {
            match self.document.solar_units.get_mut(&device.serial) {
                Some(unit) => unit.failures = device.failure_count,
                None => {
                    self.document.solar_units.insert(
                        device.serial.clone(),
                        UnitEntry {
                            idx: Some(SinkId(device.sink.idx.clone())),
                            name: device.sink.name.clone(),
                            max_power: device.max_power,
                            failures: device.failure_count,
                        },
                    );
                }
            }
        }

        let contents = self.format.encode(&self.document)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;
        debug!("registry saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    const DATA_JSON: &str = r#"{
        "solar_units": {
            "112100000001": {"idx": "1126", "name": "Panel 1", "max_power": 400, "failures": 2},
            "112100000002": {"idx": 1128, "name": "Extension 1", "failures": 0}
        },
        "telegram": {"token": "123:abc", "chat_id": "42"},
        "global_solar": {"idx": "1125", "name": "Solar", "failures": 0},
        "global_solar_historic": {"idx": "1124", "name": "Solar P1 Meter", "failures": 0},
        "global_config": {
            "dtu_base_url": "http://192.168.5.5",
            "domoticz_base_url": "http://127.0.0.1:8080",
            "sleep_duration": 5
        },
        "comment": "kept as is"
    }"#;

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_accepts_numeric_and_string_idx() {
        let file = write_temp(DATA_JSON, ".json");
        let document = load(file.path()).unwrap();

        assert_eq!(Some(SinkId("1126".into())), document.solar_units["112100000001"].idx);
        assert_eq!(Some(SinkId("1128".into())), document.solar_units["112100000002"].idx);
        assert_eq!(400, document.solar_units["112100000002"].max_power);
        assert_eq!(5, document.global_config.sleep_duration);
        assert_eq!("42", document.telegram.as_ref().unwrap().chat_id);
    }

    #[test]
    fn registry_from_document() {
        let file = write_temp(DATA_JSON, ".json");
        let registry = Registry::from_document(&load(file.path()).unwrap());

        assert_eq!(2, registry.len());
        let panel = registry.get("112100000001").unwrap();
        assert_eq!("Panel 1", panel.name());
        assert_eq!(2, panel.failure_count);
        assert!(!panel.producing);
    }

    #[test]
    fn unit_without_idx_is_kept_but_not_monitored() {
        let json = r#"{
            "solar_units": {
                "112100000001": {"idx": "1126", "name": "Panel 1"},
                "112100000003": {"idx": null, "name": "Panel 3", "failures": 0}
            }
        }"#;
        let file = write_temp(json, ".json");
        let mut store = FileStore::open(file.path()).unwrap();
        assert_eq!(None, store.document().solar_units["112100000003"].idx);

        let registry = Registry::from_document(store.document());
        assert_eq!(1, registry.len());
        assert!(registry.get("112100000003").is_none());

        store.save(&registry).unwrap();
        let reloaded = load(file.path()).unwrap();
        assert_eq!("Panel 3", reloaded.solar_units["112100000003"].name);
        assert_eq!(None, reloaded.solar_units["112100000003"].idx);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("data.json")),
            Err(Error::Persistence(_))
        ));
    }

    #[test]
    fn garbage_file_is_a_config_error() {
        let file = write_temp("{ not json", ".json");
        assert!(matches!(load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn save_rewrites_failures_and_keeps_the_rest() {
        let file = write_temp(DATA_JSON, ".json");
        let mut store = FileStore::open(file.path()).unwrap();
        let mut registry = Registry::from_document(store.document());
        registry.devices_mut()[1].failure_count = 7;
        registry.reset_failures();
        registry.devices_mut()[1].failure_count = 3;

        store.save(&registry).unwrap();

        let reloaded = load(file.path()).unwrap();
        assert_eq!(0, reloaded.solar_units["112100000001"].failures);
        assert_eq!(3, reloaded.solar_units["112100000002"].failures);
        assert_eq!(Some(SinkId("1128".into())), reloaded.solar_units["112100000002"].idx);
        assert_eq!(Some(&Value::from("kept as is")), reloaded.extra.get("comment"));
        assert_eq!(store.document().telegram, reloaded.telegram);
        assert!(!file.path().with_extension("tmp").exists());
    }

    #[test]
    fn toml_file_is_written_back_as_toml() {
        let toml = r#"
[global_config]
dtu_base_url = "http://dtu"
domoticz_base_url = "http://domoticz"

[solar_units.112100000001]
idx = 12
name = "Panel 1"
"#;
        let file = write_temp(toml, ".toml");
        let mut store = FileStore::open(file.path()).unwrap();
        let mut registry = Registry::from_document(store.document());
        registry.devices_mut()[0].failure_count = 1;
        store.save(&registry).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(toml::from_str::<toml::Table>(&contents).is_ok());
        let reloaded = load(file.path()).unwrap();
        assert_eq!(1, reloaded.solar_units["112100000001"].failures);
        assert_eq!(3, reloaded.global_config.sleep_duration);
    }

    #[test]
    fn empty_registry_is_neither_all_on_nor_all_off() {
        let registry = Registry::default();
        assert!(!registry.all_producing());
        assert!(!registry.none_producing());
    }

    #[test]
    fn duplicate_serials_are_dropped() {
        let registry = Registry::new([
            DeviceRecord::new("1", "10", "a"),
            DeviceRecord::new("1", "11", "b"),
        ]);
        assert_eq!(1, registry.len());
        assert_eq!("a", registry.devices()[0].name());
    }

    #[test]
    fn summary_lists_every_device() {
        let mut registry = Registry::new([
            DeviceRecord::new("1", "10", "Panel 1"),
            DeviceRecord::new("2", "11", "Panel 2"),
        ]);
        registry.devices_mut()[0].failure_count = 4;
        let summary = registry.failure_summary();
        assert!(summary.contains("<b>Panel 1</b>  (1)  :\n4 communication failures"));
        assert!(summary.contains("<b>Panel 2</b>  (2)  :\n0 communication failures"));
    }
}
