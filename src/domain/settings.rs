use crate::domain::waveform::DEFAULT_AMPLIFICATION;
use crate::infrastructure::bluetooth::protocol::{self, ProtocolConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Which transport the Bluetooth worker drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// In-process firmware emulator, no radio needed
    Simulated,
    /// Real peripheral over BLE (requires the `ble` feature)
    Ble,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_control_uuid")]
    pub control_char_uuid: String,
    #[serde(default = "default_notify_uuid")]
    pub notify_char_uuid: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            service_uuid: default_service_uuid(),
            control_char_uuid: default_control_uuid(),
            notify_char_uuid: default_notify_uuid(),
            scan_timeout_secs: default_scan_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            transport: default_transport(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformSettings {
    #[serde(default = "default_amplification")]
    pub amplification: f32,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            amplification: default_amplification(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "massage_companion".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_device_name() -> String {
    protocol::DEVICE_NAME.to_string()
}
fn default_service_uuid() -> String {
    protocol::SERVICE_UUID.to_string()
}
fn default_control_uuid() -> String {
    protocol::CONTROL_CHAR_UUID.to_string()
}
fn default_notify_uuid() -> String {
    protocol::NOTIFY_CHAR_UUID.to_string()
}
fn default_scan_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_transport() -> TransportKind {
    if cfg!(feature = "ble") {
        TransportKind::Ble
    } else {
        TransportKind::Simulated
    }
}
fn default_amplification() -> f32 {
    DEFAULT_AMPLIFICATION
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub waveform: WaveformSettings,

    #[serde(default = "default_false")]
    pub auto_reconnect: bool,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path: Some(settings_path),
        })
    }

    /// Settings that are never written to disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings,
            settings_path: None,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("MassageCompanion");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.settings_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::ProtocolRevision;

    #[test]
    fn test_empty_file_loads_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.protocol, ProtocolConfig::tagged());
        assert_eq!(settings.device.name, "Massage_Pro_X1");
        assert_eq!(settings.waveform.amplification, 2.0);
        assert_eq!(settings.log_settings.rotation, "daily");
        assert!(!settings.auto_reconnect);
    }

    #[test]
    fn test_partial_file_keeps_overrides() {
        let json = r#"{
            "protocol": {
                "revision": "Untagged",
                "opcodes": {"rotate": 1, "heat": 2, "assistant": 4, "level": 3,
                            "assistant_config": 6, "assistant_stop": 7},
                "level_min": 0,
                "level_max": 255
            },
            "device": {"name": "MassagePro"}
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.protocol.revision, ProtocolRevision::Untagged);
        assert_eq!(settings.protocol, ProtocolConfig::untagged());
        assert_eq!(settings.device.name, "MassagePro");
        assert_eq!(settings.device.service_uuid, protocol::SERVICE_UUID);
    }

    #[test]
    fn test_settings_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("massage_companion_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");

        let mut service = SettingsService {
            settings: Settings::default(),
            settings_path: Some(path.clone()),
        };
        service.get_mut().waveform.amplification = 4.5;
        service.get_mut().auto_reconnect = true;
        service.save().unwrap();

        let loaded = SettingsService::load_from_file(&path).unwrap();
        assert_eq!(loaded.waveform.amplification, 4.5);
        assert!(loaded.auto_reconnect);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let service = SettingsService::in_memory(Settings::default());
        assert!(service.save().is_ok());
    }
}
