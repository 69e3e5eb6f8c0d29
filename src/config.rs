// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::protocol::{DEFAULT_DELIMITER, DEFAULT_PAYLOAD_WIDTH};
use crate::bluetooth::{LineCodec, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_RFCOMM_CHANNEL};

const APP_DIR: &str = "curtain-remote";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Line protocol settings.
    pub protocol: ProtocolConfig,

    /// Monitor mode settings.
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name of the bonded curtain controller.
    pub device_name: String,

    /// RFCOMM channel of the serial port service.
    pub rfcomm_channel: u8,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: "SmartCurtain".to_string(),
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Bytes per numeric payload.
    pub payload_width: usize,

    /// How long a query waits for its reply.
    pub response_timeout_ms: u64,

    /// Terminator of inbound lines. Must be a single byte.
    pub line_delimiter: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            payload_width: DEFAULT_PAYLOAD_WIDTH,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            line_delimiter: (DEFAULT_DELIMITER as char).to_string(),
        }
    }
}

impl ProtocolConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Build the line codec described by this section.
    pub fn codec(&self) -> Result<LineCodec> {
        let delimiter = match self.line_delimiter.as_bytes() {
            [byte] => *byte,
            _ => bail!(
                "line_delimiter must be a single byte, got {:?}",
                self.line_delimiter
            ),
        };
        Ok(LineCodec::new(self.payload_width, delimiter)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between light sensor polls.
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.bluetooth.device_name.trim().is_empty() {
            bail!("bluetooth.device_name must not be empty");
        }
        if self.protocol.response_timeout_ms == 0 {
            bail!("protocol.response_timeout_ms must be positive");
        }
        self.protocol.codec()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.bluetooth.device_name, "SmartCurtain");
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.protocol.payload_width, 2);
        assert_eq!(config.protocol.response_timeout(), Duration::from_millis(1000));

        let codec = config.protocol.codec().unwrap();
        assert_eq!(codec.delimiter(), b'\n');
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth]\ndevice_name = \"Bedroom\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.device_name, "Bedroom");
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.monitor.poll_interval_secs, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[protocol]\npayload_width = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[protocol]\nline_delimiter = \"\\r\\n\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.protocol.response_timeout_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.protocol.response_timeout_ms, 250);
    }
}
