//! Message types for worker → consumer communication
//!
//! Everything a run produces travels over one bounded `mpsc` channel of
//! [`AcquisitionEvent`] values, so spectra, progress and the completion
//! notification of a run are delivered in exactly the order they were sent.
//! The channel is bounded: a worker's send waits while the consumer is behind,
//! and no event of a worker run is ever dropped. A foreground single read is
//! queued only if there is room (see [`EventSender::try_spectrum`]).

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::{AcquisitionMode, ProgressEvent, Spectrum};
use crate::error::DaqError;

/// Events delivered to the result sink
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    /// A worker run began.
    Started {
        /// Mode of the run
        mode: AcquisitionMode,
        /// Scans requested (integrate) or `None` for an unbounded run
        scan_count: Option<u32>,
    },

    /// A new spectrum (raw or running mean).
    Spectrum(Spectrum),

    /// Scans completed so far in an integrate run.
    Progress(ProgressEvent),

    /// The run ended; always the last event of a run.
    Finished(RunOutcome),
}

/// Result of one worker run, delivered once through the channel and to every
/// `on_finished` callback.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Mode of the run
    pub mode: AcquisitionMode,
    /// Spectra emitted before the run ended
    pub spectra_emitted: u32,
    /// True if the loop exited because of a stop request
    pub stopped_early: bool,
    /// Failure that ended the run, if any
    pub error: Option<Arc<DaqError>>,
}

impl RunOutcome {
    /// Successful run.
    pub fn success(mode: AcquisitionMode, summary: RunSummary) -> Self {
        Self {
            mode,
            spectra_emitted: summary.spectra_emitted,
            stopped_early: summary.stopped_early,
            error: None,
        }
    }

    /// Failed run.
    pub fn failure(mode: AcquisitionMode, spectra_emitted: u32, error: DaqError) -> Self {
        Self {
            mode,
            spectra_emitted,
            stopped_early: false,
            error: Some(Arc::new(error)),
        }
    }

    /// True if the run ended without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What a worker loop reports when it exits cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Spectra emitted
    pub spectra_emitted: u32,
    /// Loop exited because of a stop request
    pub stopped_early: bool,
}

/// Producer side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<AcquisitionEvent>,
}

impl EventSender {
    /// Wraps a channel sender.
    pub fn new(tx: mpsc::Sender<AcquisitionEvent>) -> Self {
        Self { tx }
    }

    /// Sends one event, waiting for channel capacity.
    pub async fn send(&self, event: AcquisitionEvent) -> Result<(), DaqError> {
        self.tx.send(event).await.map_err(|_| DaqError::SinkClosed)
    }

    /// Emits a spectrum.
    pub async fn spectrum(&self, spectrum: Spectrum) -> Result<(), DaqError> {
        self.send(AcquisitionEvent::Spectrum(spectrum)).await
    }

    /// Emits a progress update.
    pub async fn progress(&self, progress: ProgressEvent) -> Result<(), DaqError> {
        self.send(AcquisitionEvent::Progress(progress)).await
    }

    /// Queues a spectrum only if the channel has room.
    ///
    /// Returns `Ok(false)` when the consumer is behind and the spectrum was
    /// not queued.
    pub fn try_spectrum(&self, spectrum: Spectrum) -> Result<bool, DaqError> {
        match self.tx.try_send(AcquisitionEvent::Spectrum(spectrum)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DaqError::SinkClosed),
        }
    }

    /// Reserves one slot; the event is enqueued when the permit is used.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, AcquisitionEvent>, DaqError> {
        self.tx.reserve().await.map_err(|_| DaqError::SinkClosed)
    }

    /// Waits until the channel has room again, i.e. the consumer has caught up
    /// to within the channel capacity.
    pub async fn wait_for_consumer(&self) -> Result<(), DaqError> {
        self.reserve().await.map(drop)
    }

    /// True if the consumer dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates the bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<AcquisitionEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}
