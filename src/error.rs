//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it gives a single place for every failure the
//! acquisition engine can report, from configuration mistakes to device faults.
//!
//! ## Error Hierarchy
//!
//! - **`DeviceNotFound`**: No compatible spectrometer could be opened. Fatal to the
//!   session; the caller surfaces it and terminates.
//! - **`Device`**: An I/O failure during a read or a configuration call. Inside a
//!   worker this aborts the current run and is delivered through the completion
//!   notification.
//! - **`AlreadyRunning`**: A start (or a one-shot read, or an integration time
//!   change) was attempted while another acquisition owns the device.
//! - **`Configuration`**: Semantic errors such as a zero scan count or an
//!   integration time outside the device range. Always raised before any hardware
//!   access.
//! - **`Config`**: Wraps `figment` errors raised while loading the configuration file.
//! - **`SinkClosed`**: The consumer dropped its end of the event channel.
//!
//! By using `#[from]`, `DaqError` can be created from the underlying error types,
//! so the `?` operator works across module boundaries.

use thiserror::Error;

use crate::core::AcquisitionMode;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure the acquisition engine can report.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// A configuration value is syntactically valid but unusable.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File-system failure (export, config file access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure while exporting a spectrum.
    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// No compatible spectrometer is connected.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The spectrometer reported a failure during a read or configuration call.
    #[error("Device error: {0}")]
    Device(String),

    /// Another acquisition currently owns the device.
    #[error("Acquisition already running: {0}")]
    AlreadyRunning(AcquisitionMode),

    /// The result sink dropped its receiver while a run was still emitting.
    #[error("Result sink closed")]
    SinkClosed,

    /// An acquisition task terminated abnormally.
    #[error("Acquisition worker panicked: {0}")]
    WorkerPanicked(String),

    /// Export was requested before any spectrum was received.
    #[error("No data: perform a measurement before saving")]
    NoData,

    /// Functionality compiled out through feature flags.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl DaqError {
    /// Returns true for errors raised by the spectrometer itself.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, DaqError::Device(_) | DaqError::DeviceNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::Device("USB transfer timed out".to_string());
        assert_eq!(err.to_string(), "Device error: USB transfer timed out");
    }

    #[test]
    fn test_already_running_names_mode() {
        let err = DaqError::AlreadyRunning(AcquisitionMode::Continuous);
        assert_eq!(err.to_string(), "Acquisition already running: continuous");
    }

    #[test]
    fn test_device_fault_classification() {
        assert!(DaqError::Device("io".into()).is_device_fault());
        assert!(DaqError::DeviceNotFound("none".into()).is_device_fault());
        assert!(!DaqError::SinkClosed.is_device_fault());
        assert!(!DaqError::Configuration("bad".into()).is_device_fault());
    }
}
