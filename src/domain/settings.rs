use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

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
    "easy_bluetooth_example".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// 128-bit service identifier, parsed from the dashed hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceUuid(u128);

impl ServiceUuid {
    /// Serial Port Profile.
    pub const SERIAL_PORT: ServiceUuid = ServiceUuid(0x00001101_0000_1000_8000_00805F9B34FB);

    #[cfg(windows)]
    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl FromStr for ServiceUuid {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidUuid(s.to_string());

        let groups: Vec<&str> = s.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lengths != [8, 4, 4, 4, 12] {
            return Err(invalid());
        }

        let hex = groups.concat();
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u128::from_str_radix(&hex, 16)
            .map(ServiceUuid)
            .map_err(|_| invalid())
    }
}

impl TryFrom<String> for ServiceUuid {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceUuid> for String {
    fn from(value: ServiceUuid) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

/// Receive buffer size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct BufferSize(usize);

impl BufferSize {
    pub const MIN: usize = 1;
    pub const MAX: usize = 65536;

    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if (Self::MIN..=Self::MAX).contains(&size) {
            Ok(Self(size))
        } else {
            Err(ConfigError::BufferSize(size))
        }
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(1024)
    }
}

impl TryFrom<usize> for BufferSize {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BufferSize> for usize {
    fn from(value: BufferSize) -> Self {
        value.0
    }
}

/// Parameters handed to the Bluetooth service by `configure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothConfig {
    pub service_uuid: ServiceUuid,
    pub device_name: String,
    pub buffer_size: BufferSize,
    pub line_delimiter: char,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            service_uuid: ServiceUuid::SERIAL_PORT,
            device_name: "Bluetooth Example Project".to_string(),
            buffer_size: BufferSize::default(),
            line_delimiter: '\n',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub bluetooth: BluetoothConfig,

    /// Force the in-process simulated backend even where a native one exists.
    #[serde(default = "default_false")]
    pub use_simulator: bool,

    #[serde(default = "default_false")]
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            bluetooth: BluetoothConfig::default(),
            use_simulator: false,
            dark_mode: false,
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("EasyBluetoothExample");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) -> anyhow::Result<()> {
        self.settings.dark_mode = dark_mode;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid: ServiceUuid = "00001101-0000-1000-8000-00805F9B34FB".parse().unwrap();
        assert_eq!(uuid, ServiceUuid::SERIAL_PORT);
        assert_eq!(uuid.to_string(), "00001101-0000-1000-8000-00805F9B34FB");

        let lower: ServiceUuid = "00001101-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(lower, uuid);
    }

    #[test]
    fn test_parse_uuid_rejects_bad_groups() {
        // First group is six digits too long.
        assert!("35111C00001101-0000-1000-8000-00805F9B34FB"
            .parse::<ServiceUuid>()
            .is_err());
        assert!("0000110100001000800000805F9B34FB".parse::<ServiceUuid>().is_err());
        assert!("0000110G-0000-1000-8000-00805F9B34FB"
            .parse::<ServiceUuid>()
            .is_err());
    }

    #[test]
    fn test_buffer_size_bounds() {
        assert!(BufferSize::new(0).is_err());
        assert_eq!(BufferSize::new(1024).unwrap().get(), 1024);
        assert_eq!(
            BufferSize::new(BufferSize::MAX + 1),
            Err(ConfigError::BufferSize(BufferSize::MAX + 1))
        );
    }

    #[test]
    fn test_settings_json_roundtrip_validates() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bluetooth, BluetoothConfig::default());

        let bad = r#"{"bluetooth":{"service_uuid":"nope","device_name":"x","buffer_size":16,"line_delimiter":"\n"}}"#;
        assert!(serde_json::from_str::<Settings>(bad).is_err());

        let empty: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.bluetooth.buffer_size.get(), 1024);
        assert!(!empty.use_simulator);
    }
}
