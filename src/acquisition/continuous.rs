//! Continuous mode: raw spectra streamed until stopped.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::acquisition::{AcquisitionWorker, RunContext};
use crate::core::AcquisitionMode;
use crate::error::DaqError;
use crate::messages::RunSummary;

/// Reads and emits raw spectra until the stop signal is raised or the device
/// fails.
///
/// Every read is emitted before the stop signal is consulted, so a stopped
/// run is never empty and never discards a spectrum it already read.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuousWorker;

impl ContinuousWorker {
    /// Creates the worker.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AcquisitionWorker for ContinuousWorker {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Continuous
    }

    async fn run(&self, ctx: RunContext) -> Result<RunSummary, DaqError> {
        let RunContext {
            device,
            config,
            stop,
            events,
            emitted,
        } = ctx;
        info!(
            integration_time_ms = config.integration_time_ms,
            "Continuous run started"
        );

        loop {
            let spectrum = device.read_spectrum().await?;
            events.spectrum(spectrum).await?;
            let count = emitted.increment();
            events.wait_for_consumer().await?;
            debug!(count, "Spectrum emitted");

            if stop.is_requested() {
                break;
            }
        }

        let spectra_emitted = emitted.get();
        info!(spectra_emitted, "Continuous run stopped");
        Ok(RunSummary {
            spectra_emitted,
            stopped_early: true,
        })
    }
}
