//! Shared worker capability and per-mode lifecycle bookkeeping.
//!
//! A worker is one implementation of [`AcquisitionWorker`]; it only knows how
//! to run its loop against the device. Lifecycle (state, stop flag) lives in a
//! [`WorkerSlot`], one per mode, created once by the supervisor and reused for
//! every run of that mode.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::acquisition::{StopFlag, StopSignal};
use crate::core::{AcquisitionConfig, AcquisitionMode, WorkerState};
use crate::error::DaqError;
use crate::hardware::Spectrometer;
use crate::messages::{EventSender, RunSummary};

/// Everything a run needs, copied in at start.
pub struct RunContext {
    /// Device owned by this run until it returns
    pub device: Arc<dyn Spectrometer>,
    /// Configuration snapshot for this run
    pub config: AcquisitionConfig,
    /// Read-only view of the run's stop flag
    pub stop: StopSignal,
    /// Channel to the result sink
    pub events: EventSender,
    /// Spectra emitted by this run
    pub emitted: EmissionCounter,
}

/// Acquisition loop for one mode.
///
/// `run` returns when the loop ends naturally, observes a stop request, or a
/// device/channel error occurs. It must check the stop signal only at
/// iteration boundaries and never abort an in-flight device read.
#[async_trait]
pub trait AcquisitionWorker: Send + Sync {
    /// Mode implemented by this worker.
    fn mode(&self) -> AcquisitionMode;

    /// Runs the loop to completion.
    async fn run(&self, ctx: RunContext) -> Result<RunSummary, DaqError>;
}

/// Counts emissions so a failed run can still report how far it got.
#[derive(Debug, Clone, Default)]
pub struct EmissionCounter {
    count: Arc<AtomicU32>,
}

impl EmissionCounter {
    /// Records one emitted spectrum and returns the new total.
    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Spectra emitted so far.
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Clears the counter for a new run.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

/// One worker plus its lifecycle state.
pub struct WorkerSlot {
    worker: Arc<dyn AcquisitionWorker>,
    state: Mutex<WorkerState>,
    stop: StopFlag,
    emitted: EmissionCounter,
}

impl WorkerSlot {
    /// Wraps a worker in the `Idle` state.
    pub fn new(worker: Arc<dyn AcquisitionWorker>) -> Self {
        Self {
            worker,
            state: Mutex::new(WorkerState::Idle),
            stop: StopFlag::new(),
            emitted: EmissionCounter::default(),
        }
    }

    /// Mode of the wrapped worker.
    pub fn mode(&self) -> AcquisitionMode {
        self.worker.mode()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    /// Handle to the wrapped worker.
    pub fn worker(&self) -> Arc<dyn AcquisitionWorker> {
        Arc::clone(&self.worker)
    }

    /// Emission counter shared with the running loop.
    pub fn emitted(&self) -> &EmissionCounter {
        &self.emitted
    }

    /// Resets per-run fields and enters `Running`. Returns the run's stop signal.
    pub(crate) fn begin(&self) -> StopSignal {
        self.stop.reset();
        self.emitted.reset();
        *lock(&self.state) = WorkerState::Running;
        self.stop.signal()
    }

    /// Raises the stop flag if the worker is running.
    ///
    /// Returns `true` if this call raised the flag.
    pub(crate) fn request_stop(&self) -> bool {
        let mut state = lock(&self.state);
        if *state != WorkerState::Running {
            return false;
        }
        *state = WorkerState::StopRequested;
        self.stop.request()
    }

    /// Loop exited; completion pending.
    pub(crate) fn finish(&self) {
        *lock(&self.state) = WorkerState::Finished;
    }

    /// Completion delivered; ready for the next run.
    pub(crate) fn reset(&self) {
        *lock(&self.state) = WorkerState::Idle;
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
