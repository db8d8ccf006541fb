use serde::Deserialize;
use std::{fs, io, path::PathBuf, time::Duration};

use crate::{
    selector::{ConfigEntry, SortKey},
    tz::{DstPolicy, LocalZone, ZoneError},
};

/// Identifiers of the integration itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub domain: String,
    /// Form field holding the folder in the first setup step.
    pub folder_key: String,
    /// Form field holding the chosen file in the second setup step.
    pub filename_key: String,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            domain: "energycsv".to_string(),
            folder_key: "select_folder".to_string(),
            filename_key: "filename".to_string(),
        }
    }
}

/// Header names of the meter export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvColumns {
    pub meter_id: String,
    pub timestamp: String,
    pub value: String,
    pub unit: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            meter_id: "Anlid".to_string(),
            timestamp: "Datum".to_string(),
            value: "Förbrukn".to_string(),
            unit: "Enhet".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub update_interval_secs: u64,
    /// IANA zone the export's wall-clock timestamps are written in.
    pub timezone: String,
    pub dst_policy: DstPolicy,
    pub columns: CsvColumns,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 2 * 60 * 60,
            timezone: "Europe/Stockholm".to_string(),
            dst_policy: DstPolicy::default(),
            columns: CsvColumns::default(),
        }
    }
}

impl ImportConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn local_zone(&self) -> Result<LocalZone, ZoneError> {
        LocalZone::new(&self.timezone, self.dst_policy)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub pattern: String,
    pub sort: SortKey,
    pub recursive: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            pattern: "*.csv".to_string(),
            sort: SortKey::Name,
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one NDJSON statistics file per sensor.
    pub directory: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("statistics"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub integration: IntegrationConfig,
    pub import: ImportConfig,
    pub selector: SelectorConfig,
    pub store: StoreConfig,
    pub entries: Vec<ConfigEntry>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let contents = fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default() -> anyhow::Result<Self> {
        match fs::read_to_string(config_path()) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

fn config_path() -> String {
    std::env::var("ENERGYCSV_CONFIG").unwrap_or_else(|_| "energycsv.toml".to_string())
}
