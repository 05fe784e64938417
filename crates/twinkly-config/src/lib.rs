//! Shared configuration for the Twinkly fleet tools.
//!
//! TOML file plus `TWINKLY_*` environment overrides, and translation to
//! `twinkly_core::FleetConfig`. The CLI adds flag-aware wrappers on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use twinkly_api::{BrokerAddress, Scheme, TransportConfig};
use twinkly_core::config::{CLOUD_BROKER_HOST, DEFAULT_MAX_MODE_RETRIES, DEFAULT_NAMESPACE};
use twinkly_core::{FleetConfig, MqttSettings};

/// Registry file name inside the data directory.
pub const REGISTRY_FILE: &str = "twinkly.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// Broker devices are handed back to on removal.
    #[serde(default = "default_cloud_broker")]
    pub cloud_broker: String,

    /// Resends allowed after the first `led/mode` attempt.
    #[serde(default = "default_max_mode_retries")]
    pub max_mode_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            registry: RegistrySection::default(),
            telemetry: TelemetrySection::default(),
            cloud_broker: default_cloud_broker(),
            max_mode_retries: default_max_mode_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Per-leg device deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            scheme: default_scheme(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistrySection {
    /// Registry file; defaults to `<data dir>/twinkly.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TelemetrySection {
    #[serde(default)]
    pub enabled: bool,

    /// Local broker as `host[:port]`. Legacy devices are pointed here on
    /// registration.
    pub broker: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: None,
            client_id: default_client_id(),
            namespace: default_namespace(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_scheme() -> String {
    "http".into()
}
fn default_client_id() -> String {
    "twinkly-rs".into()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_cloud_broker() -> String {
    CLOUD_BROKER_HOST.into()
}
fn default_max_mode_retries() -> u32 {
    DEFAULT_MAX_MODE_RETRIES
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "twinkly", "twinkly")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("twinkly");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the registry lives when the config does not say.
pub fn default_registry_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join(REGISTRY_FILE),
        |dirs| dirs.data_dir().join(REGISTRY_FILE),
    )
}

impl Config {
    pub fn registry_path(&self) -> PathBuf {
        self.registry
            .path
            .clone()
            .unwrap_or_else(default_registry_path)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment.
///
/// Environment keys nest with a double underscore, e.g.
/// `TWINKLY_DEFAULTS__TIMEOUT=5` or `TWINKLY_TELEMETRY__BROKER=10.0.0.2`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TWINKLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_broker(field: &str, raw: &str) -> Result<BrokerAddress, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("{e}"),
    })
}

/// Build the runtime `FleetConfig`.
pub fn to_fleet_config(cfg: &Config) -> Result<FleetConfig, ConfigError> {
    let scheme: Scheme = cfg.defaults.scheme.parse().map_err(|_| ConfigError::Validation {
        field: "defaults.scheme".into(),
        reason: format!("expected 'http' or 'https', got '{}'", cfg.defaults.scheme),
    })?;

    if cfg.defaults.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "defaults.timeout".into(),
            reason: "must be at least one second".into(),
        });
    }

    let local_broker = cfg
        .telemetry
        .broker
        .as_deref()
        .map(|raw| parse_broker("telemetry.broker", raw))
        .transpose()?;

    Ok(FleetConfig {
        transport: TransportConfig {
            scheme,
            timeout: Duration::from_secs(cfg.defaults.timeout),
        },
        local_broker,
        cloud_broker: parse_broker("cloud_broker", &cfg.cloud_broker)?,
        namespace: cfg.telemetry.namespace.clone(),
        max_mode_retries: cfg.max_mode_retries,
    })
}

/// MQTT settings when telemetry is enabled.
pub fn mqtt_settings(cfg: &Config) -> Result<Option<MqttSettings>, ConfigError> {
    if !cfg.telemetry.enabled {
        return Ok(None);
    }
    let raw = cfg
        .telemetry
        .broker
        .as_deref()
        .ok_or_else(|| ConfigError::Validation {
            field: "telemetry.broker".into(),
            reason: "required when telemetry is enabled".into(),
        })?;
    let broker = parse_broker("telemetry.broker", raw)?;
    Ok(Some(MqttSettings::new(
        broker,
        cfg.telemetry.client_id.clone(),
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(cfg.cloud_broker, "mqtt.twinkly.com");
        assert_eq!(cfg.max_mode_retries, 3);
        assert_eq!(cfg.telemetry.namespace, "xled");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_mode_retries = 5

[defaults]
timeout = 4

[registry]
path = "/var/lib/twinkly/devices.json"

[telemetry]
enabled = true
broker = "192.168.1.10:1884"
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.registry_path(), PathBuf::from("/var/lib/twinkly/devices.json"));

        let fleet = to_fleet_config(&cfg).unwrap();
        assert_eq!(fleet.transport.timeout, Duration::from_secs(4));
        assert_eq!(fleet.max_mode_retries, 5);
        assert_eq!(fleet.local_broker.unwrap().port, Some(1884));
        assert_eq!(fleet.cloud_broker.host, "mqtt.twinkly.com");

        let mqtt = mqtt_settings(&cfg).unwrap().unwrap();
        assert_eq!(mqtt.broker.host, "192.168.1.10");
        assert_eq!(mqtt.client_id, "twinkly-rs");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.telemetry.broker = Some("10.0.0.2".into());
        save_config_to(&cfg, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.defaults.scheme = "gopher".into();
        assert!(matches!(
            to_fleet_config(&cfg),
            Err(ConfigError::Validation { .. })
        ));

        let mut cfg = Config::default();
        cfg.telemetry.enabled = true;
        assert!(mqtt_settings(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.defaults.timeout = 0;
        assert!(to_fleet_config(&cfg).is_err());
    }
}
