//! Configuration of the probe connection and the host side tools.
//!
//! All settings have defaults matching the BluePill SWD probe firmware, so an empty
//! YAML document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Errors raised while loading a [`ProbeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read the configuration file")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the configuration")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid memory map range: start {start:#010x} is above end {end:#010x}")]
    InvalidRange { start: u32, end: u32 },
    #[error("The memory map step must be a non-zero multiple of 4, got {0:#x}")]
    InvalidStep(u32),
    #[error("The memory map needs at least one page per line")]
    NoPagesPerLine,
}

/// The complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// How to find and talk to the probe on the USB bus.
    pub usb: UsbConfig,
    /// Upper bound for the debug power-up handshake, in milliseconds.
    pub power_up_timeout_ms: u64,
    /// Settings of the memory map scan.
    pub memory_map: MemoryMapConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            usb: UsbConfig::default(),
            power_up_timeout_ms: 1000,
            memory_map: MemoryMapConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Parses a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ProbeConfig = serde_yaml::from_str(yaml)?;
        config.memory_map.validate()?;

        tracing::debug!("Loaded configuration: {:x?}", config);

        Ok(config)
    }

    /// Reads and parses a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("Loading configuration from {}", path.display());

        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// The power-up timeout as a [`Duration`].
    pub fn power_up_timeout(&self) -> Duration {
        Duration::from_millis(self.power_up_timeout_ms)
    }
}

/// USB parameters of the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub configuration: u8,
    /// Bulk OUT endpoint address.
    pub endpoint_out: u8,
    /// Bulk IN endpoint address (direction bit included).
    pub endpoint_in: u8,
    /// Timeout of a single bulk transfer, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0xDECA,
            product_id: 0x0002,
            interface: 0,
            configuration: 1,
            endpoint_out: 0x01,
            endpoint_in: 0x82,
            timeout_ms: 1000,
        }
    }
}

impl UsbConfig {
    /// The bulk transfer timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Range and rendering of [`build_memory_map`](crate::tools::build_memory_map).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryMapConfig {
    /// First probed address.
    pub start: u32,
    /// Scanning stops before this address.
    pub end: u32,
    /// Distance between two probed addresses.
    pub step: u32,
    /// Number of probed pages rendered on one line.
    pub pages_per_line: usize,
}

impl Default for MemoryMapConfig {
    fn default() -> Self {
        Self {
            start: 0x0000_0000,
            end: 0xFFFF_FFFF,
            step: 0x400,
            pages_per_line: 64,
        }
    }
}

impl MemoryMapConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }

        if self.step == 0 || self.step % 4 != 0 {
            return Err(ConfigError::InvalidStep(self.step));
        }

        if self.pages_per_line == 0 {
            return Err(ConfigError::NoPagesPerLine);
        }

        Ok(())
    }
}
