//! Progressive averaging over repeated scans.
//!
//! [`AveragedSeries`] is the lazy "read N spectra with progressive averaging"
//! operation of the device port. Step `k` reads one raw scan and yields the
//! arithmetic mean of scans `1..=k`, so the first step is the raw first scan.
//!
//! The series stops early, without touching the hardware again, when either
//! the run's [`StopSignal`] is raised or [`AveragedSeries::halt`] is called.

use std::sync::Arc;
use tracing::trace;

use crate::acquisition::StopSignal;
use crate::core::Spectrum;
use crate::error::DaqError;
use crate::hardware::Spectrometer;

/// Lazy, finite sequence of running-mean spectra.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use spectro_daq::acquisition::StopSignal;
/// use spectro_daq::hardware::{AveragedSeries, MockSpectrometer};
///
/// # tokio_test::block_on(async {
/// let device = Arc::new(MockSpectrometer::new(16).without_timing());
/// let mut series = AveragedSeries::new(device, 3, StopSignal::never());
/// while let Some(step) = series.next().await {
///     assert_eq!(step.unwrap().len(), 16);
/// }
/// assert_eq!(series.taken(), 3);
/// # });
/// ```
pub struct AveragedSeries {
    device: Arc<dyn Spectrometer>,
    count: u32,
    taken: u32,
    sums: Vec<f64>,
    wavelengths: Option<Arc<[f64]>>,
    stop: StopSignal,
    halted: bool,
}

impl AveragedSeries {
    /// Prepares a series of at most `count` steps. No scan is taken until
    /// [`AveragedSeries::next`] is awaited.
    pub fn new(device: Arc<dyn Spectrometer>, count: u32, stop: StopSignal) -> Self {
        Self {
            device,
            count,
            taken: 0,
            sums: Vec::new(),
            wavelengths: None,
            stop,
            halted: false,
        }
    }

    /// Scans accumulated so far.
    pub fn taken(&self) -> u32 {
        self.taken
    }

    /// Requested number of scans.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Ends the series; later calls to `next` return `None` without reading.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// True once no further scan will be read.
    pub fn is_exhausted(&self) -> bool {
        self.halted || self.taken >= self.count || self.stop.is_requested()
    }

    /// Reads the next scan and returns the updated running mean.
    ///
    /// Returns `None` when the count is reached or the series was stopped. A
    /// device error is returned once and halts the series.
    pub async fn next(&mut self) -> Option<Result<Spectrum, DaqError>> {
        if self.is_exhausted() {
            trace!(taken = self.taken, count = self.count, "averaged series exhausted");
            return None;
        }

        let result = self.accumulate().await;
        if result.is_err() {
            self.halted = true;
        }
        Some(result)
    }

    async fn accumulate(&mut self) -> Result<Spectrum, DaqError> {
        let scan = self.device.read_spectrum().await?;

        match &self.wavelengths {
            None => {
                self.wavelengths = Some(scan.wavelength_axis());
                self.sums = scan.intensities().to_vec();
            }
            Some(_) if scan.len() != self.sums.len() => {
                return Err(DaqError::Device(format!(
                    "scan {} returned {} pixels, expected {}",
                    self.taken + 1,
                    scan.len(),
                    self.sums.len()
                )));
            }
            Some(_) => {
                for (sum, value) in self.sums.iter_mut().zip(scan.intensities()) {
                    *sum += value;
                }
            }
        }
        self.taken += 1;

        let n = f64::from(self.taken);
        let mean = self.sums.iter().map(|sum| sum / n).collect();
        let wavelengths = self
            .wavelengths
            .as_ref()
            .map_or_else(|| scan.wavelength_axis(), Arc::clone);
        Spectrum::with_timestamp(wavelengths, mean, scan.timestamp())
    }
}
