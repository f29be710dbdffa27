//! Configuration System using Figment
//!
//! Strongly-typed configuration for the acquisition engine. Configuration is
//! loaded from:
//! 1. A TOML file (`config/spectro.toml` by default)
//! 2. Environment variables (prefixed with `SPECTRO_`)
//!
//! Every field has a default, so a missing file or section still yields a
//! usable configuration.
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! SPECTRO_APPLICATION__LOG_LEVEL=debug
//! SPECTRO_ACQUISITION__INTEGRATION_TIME_MS=250
//! SPECTRO_DEVICE__DRIVER=mock
//! ```
//!
//! # Example
//!
//! ```no_run
//! use spectro_daq::config::SpectroConfig;
//!
//! fn main() -> Result<(), spectro_daq::error::DaqError> {
//!     let config = SpectroConfig::load()?;
//!     println!("Integration time: {} ms", config.acquisition.integration_time_ms);
//!     Ok(())
//! }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::AcquisitionConfig;
use crate::error::DaqError;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/spectro.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectroConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Acquisition defaults
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Spectrometer selection
    #[serde(default)]
    pub device: DeviceConfig,
    /// Export settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Acquisition defaults applied when the supervisor connects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Initial integration time in milliseconds
    #[serde(default = "default_integration_time")]
    pub integration_time_ms: u32,
    /// Default number of scans averaged in integrate mode
    #[serde(default = "default_scan_count")]
    pub scan_count: u32,
    /// Capacity of the worker → sink event channel
    ///
    /// With a capacity of 1 the worker never runs more than one emission ahead
    /// of the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Spectrometer selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Driver name registered in the device registry
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Simulated spectrometer settings
    #[serde(default)]
    pub mock: MockDeviceConfig,
}

/// Simulated spectrometer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockDeviceConfig {
    /// Number of detector pixels
    #[serde(default = "default_pixels")]
    pub pixels: usize,
    /// Wavelength of the first pixel in nm
    #[serde(default = "default_start_nm")]
    pub start_nm: f64,
    /// Wavelength of the last pixel in nm
    #[serde(default = "default_end_nm")]
    pub end_nm: f64,
    /// Sleep for the integration time on every read
    #[serde(default = "default_simulate_timing")]
    pub simulate_timing: bool,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that relative export paths are resolved against
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "spectro_daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_integration_time() -> u32 {
    100
}

fn default_scan_count() -> u32 {
    10
}

fn default_channel_capacity() -> usize {
    1
}

fn default_driver() -> String {
    "mock".to_string()
}

fn default_pixels() -> usize {
    2048
}

fn default_start_nm() -> f64 {
    339.0
}

fn default_end_nm() -> f64 {
    1025.0
}

fn default_simulate_timing() -> bool {
    true
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            integration_time_ms: default_integration_time(),
            scan_count: default_scan_count(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            mock: MockDeviceConfig::default(),
        }
    }
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            pixels: default_pixels(),
            start_nm: default_start_nm(),
            end_nm: default_end_nm(),
            simulate_timing: default_simulate_timing(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

impl AcquisitionSettings {
    /// Initial per-run configuration derived from these defaults.
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig::new(self.integration_time_ms, self.scan_count)
    }
}

impl StorageConfig {
    /// Resolves an export path against `export_dir` unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.export_dir.join(path)
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl SpectroConfig {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and environment variables
    ///
    /// Configuration is loaded in this order of precedence (highest to lowest):
    /// 1. Environment variables (`SPECTRO_` prefix)
    /// 2. The TOML file
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, DaqError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns `DaqError::Config` if the file cannot be parsed and
    /// `DaqError::Configuration` if validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, DaqError> {
        let config: Self = Figment::from(Serialized::defaults(SpectroConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SPECTRO_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Integration time, scan count and channel capacity are non-zero
    /// - Mock wavelength range is increasing and has at least one pixel
    pub fn validate(&self) -> Result<(), DaqError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.acquisition.integration_time_ms == 0 {
            return Err(DaqError::Configuration(
                "integration_time_ms must be greater than 0".to_string(),
            ));
        }

        self.acquisition.acquisition_config().validate_scan_count()?;

        if self.acquisition.channel_capacity == 0 {
            return Err(DaqError::Configuration(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.device.driver.trim().is_empty() {
            return Err(DaqError::Configuration(
                "device.driver must not be empty".to_string(),
            ));
        }

        let mock = &self.device.mock;
        if mock.pixels == 0 {
            return Err(DaqError::Configuration(
                "device.mock.pixels must be greater than 0".to_string(),
            ));
        }
        if mock.end_nm <= mock.start_nm {
            return Err(DaqError::Configuration(format!(
                "device.mock wavelength range must increase ({} .. {})",
                mock.start_nm, mock.end_nm
            )));
        }

        Ok(())
    }
}
