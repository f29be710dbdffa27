//! Core data types for the acquisition engine.
//!
//! This module defines the values that flow between the spectrometer, the
//! acquisition workers and the result sink.
//!
//! # Data Flow
//!
//! ```text
//! Spectrometer --[Spectrum]--> worker --mpsc::channel--> ResultSink
//! ```
//!
//! A [`Spectrum`] is created fresh on every device read and moved through the
//! channel; nothing mutates it after it has been emitted. Wavelength axes are
//! fixed per device, so they are shared between spectra through an `Arc<[f64]>`
//! instead of being copied on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::DaqError;

// =============================================================================
// Spectrum
// =============================================================================

/// One wavelength/intensity reading from the spectrometer.
///
/// # Fields
///
/// * `wavelengths` - Pixel wavelengths in nm, strictly increasing, fixed per device
/// * `intensities` - Intensities in device units, one per wavelength
/// * `timestamp` - UTC time at which the reading completed
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    wavelengths: Arc<[f64]>,
    intensities: Vec<f64>,
    timestamp: DateTime<Utc>,
}

impl Spectrum {
    /// Builds a spectrum, rejecting axes of unequal length.
    pub fn new(wavelengths: Arc<[f64]>, intensities: Vec<f64>) -> Result<Self, DaqError> {
        Self::with_timestamp(wavelengths, intensities, Utc::now())
    }

    /// Builds a spectrum with an explicit acquisition timestamp.
    pub fn with_timestamp(
        wavelengths: Arc<[f64]>,
        intensities: Vec<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DaqError> {
        if wavelengths.len() != intensities.len() {
            return Err(DaqError::Device(format!(
                "spectrum length mismatch: {} wavelengths, {} intensities",
                wavelengths.len(),
                intensities.len()
            )));
        }
        Ok(Self {
            wavelengths,
            intensities,
            timestamp,
        })
    }

    /// Wavelength axis in nm.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Shared handle to the wavelength axis.
    pub fn wavelength_axis(&self) -> Arc<[f64]> {
        Arc::clone(&self.wavelengths)
    }

    /// Intensities in device units.
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// UTC acquisition timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    /// Returns true if the spectrum holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// Iterates over `(wavelength, intensity)` pairs in wavelength order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelengths
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }
}

// =============================================================================
// Acquisition configuration and modes
// =============================================================================

/// How a measurement is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// One synchronous read, no worker involved.
    Single,
    /// Bounded run yielding the running mean of `scan_count` scans.
    Integrate,
    /// Unbounded stream of raw scans until stopped.
    Continuous,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionMode::Single => "single",
            AcquisitionMode::Integrate => "integrate",
            AcquisitionMode::Continuous => "continuous",
        };
        f.write_str(name)
    }
}

/// User settings applied to the device before a run starts.
///
/// `integration_time_ms` persists across runs; `scan_count` only matters for
/// [`AcquisitionMode::Integrate`] and is taken per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Per-scan exposure in milliseconds.
    pub integration_time_ms: u32,
    /// Number of raw scans averaged together.
    pub scan_count: u32,
}

impl AcquisitionConfig {
    /// Creates a configuration.
    pub fn new(integration_time_ms: u32, scan_count: u32) -> Self {
        Self {
            integration_time_ms,
            scan_count,
        }
    }

    /// Returns a copy with a different scan count.
    pub fn with_scan_count(self, scan_count: u32) -> Self {
        Self { scan_count, ..self }
    }

    /// Rejects a zero scan count.
    ///
    /// Integration-time bounds depend on the device and are checked by the
    /// supervisor against [`crate::hardware::Spectrometer::integration_time_range`].
    pub fn validate_scan_count(&self) -> Result<(), DaqError> {
        if self.scan_count == 0 {
            return Err(DaqError::Configuration(
                "scan_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            integration_time_ms: 100,
            scan_count: 10,
        }
    }
}

// =============================================================================
// Worker bookkeeping
// =============================================================================

/// Lifecycle of one acquisition worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Ready for the next start.
    Idle,
    /// Loop executing.
    Running,
    /// Stop flag raised, loop not yet exited.
    StopRequested,
    /// Loop exited, completion not yet delivered.
    Finished,
}

impl WorkerState {
    /// True while the worker owns the device.
    pub fn is_active(self) -> bool {
        matches!(self, WorkerState::Running | WorkerState::StopRequested)
    }
}

/// Number of scans completed in an integrate run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Scans completed so far, in `1..=total`.
    pub index: u32,
    /// Scan count requested for the run.
    pub total: u32,
}

impl ProgressEvent {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.index) / f64::from(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize) -> Arc<[f64]> {
        (0..n).map(|i| 400.0 + i as f64).collect()
    }

    #[test]
    fn test_spectrum_rejects_length_mismatch() {
        let result = Spectrum::new(axis(4), vec![1.0, 2.0]);
        assert!(matches!(result, Err(DaqError::Device(_))));
    }

    #[test]
    fn test_spectrum_points_keep_wavelength_order() {
        let spectrum = Spectrum::new(axis(3), vec![5.0, 6.0, 7.0]).unwrap();
        let points: Vec<_> = spectrum.points().collect();
        assert_eq!(points, vec![(400.0, 5.0), (401.0, 6.0), (402.0, 7.0)]);
        assert_eq!(spectrum.len(), 3);
        assert!(!spectrum.is_empty());
    }

    #[test]
    fn test_spectra_share_wavelength_axis() {
        let wavelengths = axis(8);
        let a = Spectrum::new(Arc::clone(&wavelengths), vec![0.0; 8]).unwrap();
        let b = Spectrum::new(Arc::clone(&wavelengths), vec![1.0; 8]).unwrap();
        assert!(Arc::ptr_eq(&a.wavelength_axis(), &b.wavelength_axis()));
    }

    #[test]
    fn test_zero_scan_count_rejected() {
        let config = AcquisitionConfig::new(50, 0);
        assert!(matches!(
            config.validate_scan_count(),
            Err(DaqError::Configuration(_))
        ));
        assert!(config.with_scan_count(1).validate_scan_count().is_ok());
    }

    #[test]
    fn test_worker_state_activity() {
        assert!(WorkerState::Running.is_active());
        assert!(WorkerState::StopRequested.is_active());
        assert!(!WorkerState::Idle.is_active());
        assert!(!WorkerState::Finished.is_active());
    }

    #[test]
    fn test_progress_fraction() {
        let progress = ProgressEvent { index: 2, total: 8 };
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
    }
}
