//! Consumer side of the acquisition event channel.

use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{AcquisitionMode, ProgressEvent, Spectrum};
use crate::data::CsvWriter;
use crate::error::DaqError;
use crate::messages::{AcquisitionEvent, RunOutcome};

/// Receives spectra, progress and completion events, in emission order, and
/// keeps the latest of each for display and export.
///
/// The sink is the only reader of the channel. While it is not being polled
/// the channel fills up and the running worker waits.
pub struct ResultSink {
    events: mpsc::Receiver<AcquisitionEvent>,
    last_spectrum: Option<Spectrum>,
    progress: Option<ProgressEvent>,
    current_run: Option<(AcquisitionMode, Option<u32>)>,
    last_outcome: Option<RunOutcome>,
    spectra_received: u64,
}

impl ResultSink {
    /// Wraps the receiving end of an event channel.
    pub fn new(events: mpsc::Receiver<AcquisitionEvent>) -> Self {
        Self {
            events,
            last_spectrum: None,
            progress: None,
            current_run: None,
            last_outcome: None,
            spectra_received: 0,
        }
    }

    /// Waits for the next event. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<AcquisitionEvent> {
        let event = self.events.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<AcquisitionEvent> {
        let event = self.events.try_recv().ok()?;
        self.apply(&event);
        Some(event)
    }

    /// Consumes events until the current run finishes.
    pub async fn wait_finished(&mut self) -> Option<RunOutcome> {
        self.wait_finished_with(|_| {}).await
    }

    /// Like [`wait_finished`](Self::wait_finished), handing every event to
    /// `on_event` first.
    pub async fn wait_finished_with<F>(&mut self, mut on_event: F) -> Option<RunOutcome>
    where
        F: FnMut(&AcquisitionEvent),
    {
        while let Some(event) = self.recv().await {
            on_event(&event);
            if let AcquisitionEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }

    fn apply(&mut self, event: &AcquisitionEvent) {
        match event {
            AcquisitionEvent::Started { mode, scan_count } => {
                debug!(%mode, ?scan_count, "Run started");
                self.current_run = Some((*mode, *scan_count));
                self.progress = None;
            }
            AcquisitionEvent::Spectrum(spectrum) => {
                self.last_spectrum = Some(spectrum.clone());
                self.spectra_received += 1;
            }
            AcquisitionEvent::Progress(progress) => self.progress = Some(*progress),
            AcquisitionEvent::Finished(outcome) => {
                self.current_run = None;
                self.last_outcome = Some(outcome.clone());
            }
        }
    }

    /// Most recent spectrum from any mode.
    pub fn last_spectrum(&self) -> Option<&Spectrum> {
        self.last_spectrum.as_ref()
    }

    /// Latest progress of the current or last integrate run.
    pub fn progress(&self) -> Option<ProgressEvent> {
        self.progress
    }

    /// Mode and scan count of the run in progress.
    pub fn current_run(&self) -> Option<(AcquisitionMode, Option<u32>)> {
        self.current_run
    }

    /// Outcome of the last finished run.
    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last_outcome.as_ref()
    }

    /// Spectra received since the sink was created.
    pub fn spectra_received(&self) -> u64 {
        self.spectra_received
    }

    /// Writes the most recent spectrum to `path` as CSV.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), DaqError> {
        let spectrum = self.last_spectrum.as_ref().ok_or(DaqError::NoData)?;
        CsvWriter::new().save(spectrum, path.as_ref())
    }
}
