//! Hardware abstraction for spectrometers.
//!
//! - [`Spectrometer`]: the device port the acquisition engine consumes
//! - [`AveragedSeries`]: progressive averaging built on `read_spectrum`
//! - [`MockSpectrometer`]: simulated device with failure injection
//! - [`DeviceRegistry`]: opens the driver named in the configuration

pub mod averaging;
pub mod capabilities;
pub mod mock;
pub mod registry;

pub use averaging::AveragedSeries;
pub use capabilities::Spectrometer;
pub use mock::MockSpectrometer;
pub use registry::DeviceRegistry;
