//! Cooperative stop flag shared between the supervisor and one worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writer side of a stop request, owned by the supervisor.
///
/// Transitions `false → true` at most once per run and is cleared only by
/// [`StopFlag::reset`] at the start of the next run.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    requested: Arc<AtomicBool>,
}

impl StopFlag {
    /// Creates a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Returns `true` if this call performed the transition.
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    /// Clears the flag for a new run.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// Returns true once a stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Read-only view handed to the worker.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            requested: Arc::clone(&self.requested),
        }
    }
}

/// Reader side of a [`StopFlag`].
#[derive(Debug, Clone)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true once the owning flag has been raised.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
