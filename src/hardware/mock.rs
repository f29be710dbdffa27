//! Mock Hardware Implementations
//!
//! Provides a simulated spectrometer for tests and for running the CLI without
//! a physical device. Timing uses `tokio::time::sleep`, never
//! `std::thread::sleep`, so the simulated exposure does not block the runtime.
//!
//! # Synthetic signal
//!
//! Each read produces a mercury-argon calibration lamp profile: a dark-count
//! baseline plus Gaussian emission lines whose height scales with the
//! integration time, saturating at the 16-bit detector limit. A small
//! deterministic ripple that depends on the read number makes consecutive
//! scans differ, so averaging is observable. [`MockSpectrometer::synthesize`]
//! reproduces any scan exactly, which lets tests compute expected means.
//!
//! # Failure injection
//!
//! - [`MockSpectrometer::fail_on_read`] makes the n-th read return `DaqError::Device`
//! - [`MockSpectrometer::disconnect_on_read`] makes the n-th read return
//!   `DaqError::DeviceNotFound`

use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::config::MockDeviceConfig;
use crate::core::Spectrum;
use crate::error::DaqError;
use crate::hardware::Spectrometer;

/// Emission lines (nm) of a Hg-Ar calibration lamp.
const LAMP_LINES: [(f64, f64); 5] = [
    (404.66, 0.35),
    (435.83, 0.80),
    (546.07, 1.00),
    (696.54, 0.25),
    (763.51, 0.45),
];

const DARK_COUNTS: f64 = 100.0;
const LINE_WIDTH_NM: f64 = 1.5;
const FULL_SCALE: f64 = 65_535.0;
/// Line height at 100 ms exposure.
const COUNTS_PER_100MS: f64 = 12_000.0;

/// Simulated spectrometer
///
/// # Example
///
/// ```rust,ignore
/// let device = MockSpectrometer::new(2048);
/// device.set_integration_time(50).await?;
/// let spectrum = device.read_spectrum().await?; // Takes ~50ms
/// assert_eq!(spectrum.len(), 2048);
/// ```
pub struct MockSpectrometer {
    wavelengths: Arc<[f64]>,
    integration_time_ms: AtomicU32,
    range: RangeInclusive<u32>,
    simulate_timing: bool,
    reads: AtomicU64,
    fail_on_read: AtomicU64,
    disconnect_on_read: AtomicU64,
}

impl MockSpectrometer {
    /// Creates a mock with `pixels` pixels spanning 339–1025 nm.
    pub fn new(pixels: usize) -> Self {
        Self::with_wavelength_range(pixels, 339.0, 1025.0)
    }

    /// Creates a mock with a linear wavelength axis from `start_nm` to `end_nm`.
    pub fn with_wavelength_range(pixels: usize, start_nm: f64, end_nm: f64) -> Self {
        let step = if pixels > 1 {
            (end_nm - start_nm) / (pixels - 1) as f64
        } else {
            0.0
        };
        let wavelengths: Arc<[f64]> = (0..pixels).map(|i| start_nm + step * i as f64).collect();

        Self {
            wavelengths,
            integration_time_ms: AtomicU32::new(100),
            range: 1..=65_000,
            simulate_timing: true,
            reads: AtomicU64::new(0),
            fail_on_read: AtomicU64::new(0),
            disconnect_on_read: AtomicU64::new(0),
        }
    }

    /// Creates a mock from its configuration block.
    pub fn from_config(config: &MockDeviceConfig) -> Self {
        let mock = Self::with_wavelength_range(config.pixels, config.start_nm, config.end_nm);
        if config.simulate_timing {
            mock
        } else {
            mock.without_timing()
        }
    }

    /// Returns reads immediately instead of sleeping for the integration time.
    pub fn without_timing(mut self) -> Self {
        self.simulate_timing = false;
        self
    }

    /// Restricts the accepted integration times.
    pub fn with_integration_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.range = range;
        self
    }

    /// Makes the `n`-th read (1-based, counted from now on) fail with a device error.
    pub fn fail_on_read(&self, n: u64) {
        let target = self.reads() + n;
        self.fail_on_read.store(target, Ordering::SeqCst);
    }

    /// Makes the `n`-th read (1-based, counted from now on) report a disconnect.
    pub fn disconnect_on_read(&self, n: u64) {
        let target = self.reads() + n;
        self.disconnect_on_read.store(target, Ordering::SeqCst);
    }

    /// Total number of read attempts, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Integration time currently applied.
    pub fn integration_time_ms(&self) -> u32 {
        self.integration_time_ms.load(Ordering::SeqCst)
    }

    /// Intensities the `read_number`-th read returns at the current integration time.
    pub fn synthesize(&self, read_number: u64) -> Vec<f64> {
        let exposure = f64::from(self.integration_time_ms()) / 100.0;
        let phase = read_number as f64 * 0.7;

        self.wavelengths
            .iter()
            .enumerate()
            .map(|(pixel, &nm)| {
                let lines: f64 = LAMP_LINES
                    .iter()
                    .map(|&(center, weight)| {
                        let x = (nm - center) / LINE_WIDTH_NM;
                        weight * (-0.5 * x * x).exp()
                    })
                    .sum();
                let ripple = (phase + pixel as f64 * 0.37).sin() * 5.0;
                (DARK_COUNTS + ripple + lines * COUNTS_PER_100MS * exposure).min(FULL_SCALE)
            })
            .collect()
    }
}

#[async_trait]
impl Spectrometer for MockSpectrometer {
    fn name(&self) -> String {
        format!("MockSpectrometer ({} px)", self.wavelengths.len())
    }

    fn integration_time_range(&self) -> RangeInclusive<u32> {
        self.range.clone()
    }

    async fn set_integration_time(&self, milliseconds: u32) -> Result<(), DaqError> {
        if !self.range.contains(&milliseconds) {
            return Err(DaqError::Device(format!(
                "integration time {} ms outside supported range {}..={} ms",
                milliseconds,
                self.range.start(),
                self.range.end()
            )));
        }
        self.integration_time_ms.store(milliseconds, Ordering::SeqCst);
        debug!(milliseconds, "MockSpectrometer: integration time set");
        Ok(())
    }

    async fn read_spectrum(&self) -> Result<Spectrum, DaqError> {
        let read_number = self.reads.fetch_add(1, Ordering::SeqCst) + 1;

        if self.simulate_timing {
            sleep(Duration::from_millis(u64::from(self.integration_time_ms()))).await;
        }

        if self.disconnect_on_read.load(Ordering::SeqCst) == read_number {
            return Err(DaqError::DeviceNotFound(
                "MockSpectrometer disconnected".to_string(),
            ));
        }
        if self.fail_on_read.load(Ordering::SeqCst) == read_number {
            return Err(DaqError::Device(format!(
                "MockSpectrometer: injected failure on read #{}",
                read_number
            )));
        }

        Spectrum::new(Arc::clone(&self.wavelengths), self.synthesize(read_number))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelength_axis_is_increasing() {
        let mock = MockSpectrometer::with_wavelength_range(5, 400.0, 800.0);
        let axis = &mock.wavelengths;
        assert_eq!(axis.first().copied(), Some(400.0));
        assert_eq!(axis.last().copied(), Some(800.0));
        assert!(axis.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_single_pixel_axis() {
        let mock = MockSpectrometer::with_wavelength_range(1, 500.0, 600.0);
        assert_eq!(&*mock.wavelengths, &[500.0]);
    }

    #[tokio::test]
    async fn test_read_matches_synthesize() {
        let mock = MockSpectrometer::new(64).without_timing();
        let spectrum = mock.read_spectrum().await.unwrap();
        assert_eq!(spectrum.intensities(), mock.synthesize(1).as_slice());
        assert_eq!(mock.reads(), 1);
    }

    #[tokio::test]
    async fn test_intensities_non_negative_and_saturated() {
        let mock = MockSpectrometer::new(2048).without_timing();
        mock.set_integration_time(60_000).await.unwrap();
        let spectrum = mock.read_spectrum().await.unwrap();
        assert!(spectrum
            .intensities()
            .iter()
            .all(|&v| (0.0..=FULL_SCALE).contains(&v)));
    }

    #[tokio::test]
    async fn test_integration_time_scales_signal() {
        let mock = MockSpectrometer::new(2048).without_timing();
        mock.set_integration_time(10).await.unwrap();
        let short = mock.synthesize(1);
        mock.set_integration_time(100).await.unwrap();
        let long = mock.synthesize(1);

        let peak = |v: &[f64]| v.iter().copied().fold(f64::MIN, f64::max);
        assert!(peak(&long) > peak(&short));
    }

    #[tokio::test]
    async fn test_integration_time_out_of_range() {
        let mock = MockSpectrometer::new(8).with_integration_range(3..=1000);
        assert!(matches!(
            mock.set_integration_time(2).await,
            Err(DaqError::Device(_))
        ));
        assert!(mock.set_integration_time(1001).await.is_err());
        assert_eq!(mock.integration_time_ms(), 100);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockSpectrometer::new(8).without_timing();
        mock.fail_on_read(2);

        assert!(mock.read_spectrum().await.is_ok());
        assert!(matches!(
            mock.read_spectrum().await,
            Err(DaqError::Device(_))
        ));
        assert!(mock.read_spectrum().await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_injection() {
        let mock = MockSpectrometer::new(8).without_timing();
        mock.disconnect_on_read(1);
        assert!(matches!(
            mock.read_spectrum().await,
            Err(DaqError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_simulated_timing() {
        let mock = MockSpectrometer::new(8);
        mock.set_integration_time(30).await.unwrap();

        let start = std::time::Instant::now();
        mock.read_spectrum().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
