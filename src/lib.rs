//! Core library for the spectro_daq application.
//!
//! Background acquisition of spectra from a USB spectrometer: a one-shot
//! read, an integrate mode that progressively averages a fixed number of
//! scans, and a continuous mode that streams raw scans until stopped. A
//! [`WorkerSupervisor`](acquisition::WorkerSupervisor) keeps at most one
//! acquisition on the device at a time and delivers every result, in order,
//! to a [`ResultSink`](data::ResultSink).

pub mod acquisition;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod hardware;
pub mod messages;

pub use acquisition::{ControlState, WorkerSupervisor};
pub use config::SpectroConfig;
pub use crate::core::{AcquisitionConfig, AcquisitionMode, Spectrum};
pub use data::ResultSink;
pub use error::{AppResult, DaqError};
pub use hardware::{DeviceRegistry, MockSpectrometer, Spectrometer};
pub use messages::{AcquisitionEvent, RunOutcome};
