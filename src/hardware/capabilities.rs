//! Capability trait for spectrometers.
//!
//! The acquisition engine talks to hardware only through [`Spectrometer`].
//! Drivers implement the two primitive operations; progressive averaging is
//! built on top of `read_spectrum` by [`crate::hardware::AveragedSeries`].

use async_trait::async_trait;
use std::ops::RangeInclusive;

use crate::core::Spectrum;
use crate::error::DaqError;

/// Device port for a spectrometer.
///
/// Implementations must be safe to share between the foreground and one
/// acquisition task at a time; the supervisor guarantees that no two tasks
/// read concurrently.
#[async_trait]
pub trait Spectrometer: Send + Sync {
    /// Human readable model name.
    fn name(&self) -> String;

    /// Supported integration times in milliseconds.
    fn integration_time_range(&self) -> RangeInclusive<u32>;

    /// Sets the per-scan exposure.
    ///
    /// Fails with [`DaqError::Device`] if `milliseconds` is outside
    /// [`Spectrometer::integration_time_range`].
    async fn set_integration_time(&self, milliseconds: u32) -> Result<(), DaqError>;

    /// Reads one raw spectrum, blocking for roughly the integration time.
    ///
    /// Fails with [`DaqError::Device`] on I/O failure or
    /// [`DaqError::DeviceNotFound`] if the device disappeared.
    async fn read_spectrum(&self) -> Result<Spectrum, DaqError>;
}
