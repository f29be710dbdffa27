//! Integrate mode: progressive averaging of a bounded number of scans.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::acquisition::{AcquisitionWorker, RunContext};
use crate::core::{AcquisitionMode, ProgressEvent};
use crate::error::DaqError;
use crate::hardware::AveragedSeries;
use crate::messages::RunSummary;

/// Averages `scan_count` scans, emitting the running mean after each one.
///
/// For every step the worker emits the spectrum, then a [`ProgressEvent`]
/// with the step index, waits until the consumer has taken both, and only
/// then checks the stop signal. A raised signal halts the averaging series
/// before it reads again.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrateWorker;

impl IntegrateWorker {
    /// Creates the worker.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AcquisitionWorker for IntegrateWorker {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Integrate
    }

    async fn run(&self, ctx: RunContext) -> Result<RunSummary, DaqError> {
        let RunContext {
            device,
            config,
            stop,
            events,
            emitted,
        } = ctx;
        config.validate_scan_count()?;

        let total = config.scan_count;
        info!(
            scans = total,
            integration_time_ms = config.integration_time_ms,
            "Integrate run started"
        );

        let mut series = AveragedSeries::new(device, total, stop.clone());

        while let Some(step) = series.next().await {
            let spectrum = step?;
            let index = series.taken();

            events.spectrum(spectrum).await?;
            emitted.increment();
            events.progress(ProgressEvent { index, total }).await?;
            events.wait_for_consumer().await?;
            debug!(index, total, "Averaged scan emitted");

            if stop.is_requested() {
                series.halt();
                break;
            }
        }

        // The series also ends silently on a stop raised before its next read.
        let stopped_early = stop.is_requested() && series.taken() < total;

        let spectra_emitted = emitted.get();
        info!(spectra_emitted, stopped_early, "Integrate run finished");
        Ok(RunSummary {
            spectra_emitted,
            stopped_early,
        })
    }
}
