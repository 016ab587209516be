//! Configuration Vault – reads/writes `~/.ardeidae/config.toml`.
//!
//! The `[ble]`, `[ring]` and `[osc]` sections are consumed by the host
//! process; `[dashboard]` configures this binary.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ardeidae_types::CalibrationMode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the configuration layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to render config schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Bluetooth link between the host process and the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(title = "Bluetooth Configuration")]
pub struct BleConfig {
    #[serde(alias = "targetServiceUuid")]
    #[schemars(title = "Service UUID")]
    pub service_uuid: String,
    #[serde(alias = "targetCharacteristicUuidRead")]
    #[schemars(title = "Characteristic UUID (Read)")]
    pub read_characteristic_uuid: String,
    #[serde(alias = "targetCharacteristicUuidWrite")]
    #[schemars(title = "Characteristic UUID (Write)")]
    pub write_characteristic_uuid: String,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_uuid: "0000ffe5-0000-1000-8000-00805f9a34fb".into(),
            read_characteristic_uuid: "0000ffe4-0000-1000-8000-00805f9a34fb".into(),
            write_characteristic_uuid: "0000ffe9-0000-1000-8000-00805f9a34fb".into(),
        }
    }
}

/// One ring button code and the value the host maps it to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HexMapping {
    #[schemars(title = "Hex Code")]
    pub hex: String,
    #[schemars(title = "Mapping Value")]
    pub mapping: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(title = "Ring Configuration")]
pub struct RingConfig {
    #[serde(alias = "productName")]
    #[schemars(title = "Product Name")]
    pub product_name: String,
    #[serde(alias = "hexMappings")]
    #[schemars(title = "Hex Mappings")]
    pub hex_mappings: Vec<HexMapping>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            product_name: "SR pius".into(),
            hex_mappings: vec![
                // up
                HexMapping {
                    hex: "02033880".into(),
                    mapping: 1,
                },
                // down
                HexMapping {
                    hex: "0203d87f".into(),
                    mapping: 2,
                },
            ],
        }
    }
}

/// Where the host process publishes OSC messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(title = "OSC Configuration")]
pub struct OscConfig {
    #[schemars(title = "Host", with = "Ipv4Addr")]
    pub host: String,
    #[schemars(title = "Port", range(min = 1, max = 65535))]
    pub port: u16,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3333,
        }
    }
}

/// Settings of the dashboard binary itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(title = "Dashboard Configuration")]
pub struct DashboardConfig {
    /// WebSocket URL of the host process.
    pub host_url: String,
    /// HTTP port of the cockpit page.
    #[schemars(range(min = 1, max = 65535))]
    pub webui_port: u16,
    pub calibration_mode: CalibrationMode,
    /// Frames per second of every scene view.
    #[schemars(range(min = 1, max = 240))]
    pub frame_rate: u32,
    /// Log text that marks the ring as connected.
    pub connect_marker: String,
    /// Use the built-in synthetic host instead of probing `host_url`.
    pub simulate: bool,
    /// Directory holding the scene models.
    pub assets_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host_url: "ws://127.0.0.1:3334".into(),
            webui_port: 8080,
            calibration_mode: CalibrationMode::Local,
            frame_rate: 60,
            connect_marker: "Ring connected".into(),
            simulate: false,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

/// Persisted user configuration stored in `~/.ardeidae/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub ble: BleConfig,
    pub ring: RingConfig,
    pub osc: OscConfig,
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Check every schema constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        for (field, value) in [
            ("ble.service_uuid", &self.ble.service_uuid),
            ("ble.read_characteristic_uuid", &self.ble.read_characteristic_uuid),
            ("ble.write_characteristic_uuid", &self.ble.write_characteristic_uuid),
        ] {
            if uuid::Uuid::parse_str(value).is_err() {
                return invalid(format!("{field} '{value}' is not a UUID"));
            }
        }

        for m in &self.ring.hex_mappings {
            let well_formed = !m.hex.is_empty()
                && m.hex.len() % 2 == 0
                && m.hex.chars().all(|c| c.is_ascii_hexdigit());
            if !well_formed {
                return invalid(format!("ring hex code '{}' must be an even number of hex digits", m.hex));
            }
        }

        if self.osc.host.parse::<Ipv4Addr>().is_err() {
            return invalid(format!("osc.host '{}' is not an IPv4 address", self.osc.host));
        }
        if self.osc.port == 0 {
            return invalid("osc.port must be between 1 and 65535".into());
        }

        let d = &self.dashboard;
        if !(d.host_url.starts_with("ws://") || d.host_url.starts_with("wss://")) {
            return invalid(format!("dashboard.host_url '{}' must be a ws:// or wss:// URL", d.host_url));
        }
        if d.webui_port == 0 {
            return invalid("dashboard.webui_port must be between 1 and 65535".into());
        }
        if !(1..=240).contains(&d.frame_rate) {
            return invalid(format!("dashboard.frame_rate {} is outside 1..=240", d.frame_rate));
        }
        Ok(())
    }

    /// Draft-07 JSON Schema of the whole configuration, pretty-printed.
    pub fn json_schema() -> Result<String, ConfigError> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths and persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.ardeidae/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".ardeidae").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
///
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ConfigError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(toml::from_str(&raw)?))
}

/// Apply `ARDEIDAE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARDEIDAE_HOST_URL` | `dashboard.host_url` |
/// | `ARDEIDAE_WEBUI_PORT` | `dashboard.webui_port` |
/// | `ARDEIDAE_OSC_PORT` | `osc.port` |
/// | `ARDEIDAE_CALIBRATION_MODE` | `dashboard.calibration_mode` |
/// | `ARDEIDAE_SIMULATE` | `dashboard.simulate` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ARDEIDAE_HOST_URL") {
        cfg.dashboard.host_url = v;
    }
    if let Some(port) = lookup("ARDEIDAE_WEBUI_PORT").and_then(|v| v.parse::<u16>().ok())
        && port != 0
    {
        cfg.dashboard.webui_port = port;
    }
    if let Some(port) = lookup("ARDEIDAE_OSC_PORT").and_then(|v| v.parse::<u16>().ok())
        && port != 0
    {
        cfg.osc.port = port;
    }
    if let Some(mode) = lookup("ARDEIDAE_CALIBRATION_MODE").and_then(|v| v.parse::<CalibrationMode>().ok()) {
        cfg.dashboard.calibration_mode = mode;
    }
    if let Some(flag) = lookup("ARDEIDAE_SIMULATE").and_then(|v| parse_flag(&v)) {
        cfg.dashboard.simulate = flag;
    }
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.ardeidae/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
        // Owner-only directory (rwx------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(write_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;

    // Owner-only file (rw-------).
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

/// Render `cfg` as it would be written to disk.
pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_rig() {
        let cfg = Config::default();
        assert_eq!(cfg.ble.service_uuid, "0000ffe5-0000-1000-8000-00805f9a34fb");
        assert_eq!(cfg.ring.product_name, "SR pius");
        assert_eq!(cfg.ring.hex_mappings[1].hex, "0203d87f");
        assert_eq!(cfg.ring.hex_mappings[1].mapping, 2);
        assert_eq!(cfg.osc.port, 3333);
        assert_eq!(cfg.dashboard.frame_rate, 60);
        assert_eq!(cfg.dashboard.calibration_mode, CalibrationMode::Local);
        assert!(cfg.validate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.dashboard.calibration_mode = CalibrationMode::Host;
        cfg.dashboard.simulate = true;
        cfg.ring.hex_mappings.push(HexMapping {
            hex: "0a0b".into(),
            mapping: 3,
        });
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[osc]\nport = 9000\n\n[dashboard]\ncalibration_mode = \"host-persisted\"\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.osc.port, 9000);
        assert_eq!(cfg.osc.host, "127.0.0.1");
        assert_eq!(cfg.dashboard.calibration_mode, CalibrationMode::Host);
        assert_eq!(cfg.ring, RingConfig::default());
    }

    #[test]
    fn camel_case_key_names_are_accepted() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ble]\ntargetServiceUuid = \"0000ffe0-0000-1000-8000-00805f9a34fb\"\n\n[ring]\nproductName = \"R2\"\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.ble.service_uuid, "0000ffe0-0000-1000-8000-00805f9a34fb");
        assert_eq!(cfg.ring.product_name, "R2");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[osc\nport = ").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn config_path_points_to_ardeidae_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".ardeidae"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.osc.host = "localhost".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.osc.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.dashboard.frame_rate = 0;
        assert!(cfg.validate().is_err());
        cfg.dashboard.frame_rate = 241;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.ring.hex_mappings[0].hex = "abc".into();
        assert!(cfg.validate().is_err());
        cfg.ring.hex_mappings[0].hex = "zz".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.ble.service_uuid = "ffe5".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.dashboard.host_url = "http://127.0.0.1:3334".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_apply_valid_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ARDEIDAE_HOST_URL", "ws://rig:4000"),
                ("ARDEIDAE_WEBUI_PORT", "8181"),
                ("ARDEIDAE_OSC_PORT", "4444"),
                ("ARDEIDAE_CALIBRATION_MODE", "host"),
                ("ARDEIDAE_SIMULATE", "yes"),
            ]),
        );
        assert_eq!(cfg.dashboard.host_url, "ws://rig:4000");
        assert_eq!(cfg.dashboard.webui_port, 8181);
        assert_eq!(cfg.osc.port, 4444);
        assert_eq!(cfg.dashboard.calibration_mode, CalibrationMode::Host);
        assert!(cfg.dashboard.simulate);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ARDEIDAE_WEBUI_PORT", "not-a-port"),
                ("ARDEIDAE_OSC_PORT", "0"),
                ("ARDEIDAE_CALIBRATION_MODE", "cloud"),
                ("ARDEIDAE_SIMULATE", "maybe"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn json_schema_describes_every_section() {
        let schema = Config::json_schema().unwrap();
        let json: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(json["$schema"], "http://json-schema.org/draft-07/schema#");
        for section in ["ble", "ring", "osc", "dashboard"] {
            assert!(json["properties"].get(section).is_some(), "missing {section}");
        }
        assert!(schema.contains("ipv4"));
        assert!(schema.contains("65535"));
    }
}
