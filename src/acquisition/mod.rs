//! Background acquisition: workers, stop signalling and supervision.
//!
//! - [`IntegrateWorker`] averages a bounded number of scans
//! - [`ContinuousWorker`] streams raw spectra until stopped
//! - [`WorkerSupervisor`] starts them one at a time and delivers their
//!   results to the [`ResultSink`](crate::data::ResultSink)

pub mod continuous;
pub mod integrate;
pub mod stop;
pub mod supervisor;
pub mod worker;

pub use continuous::ContinuousWorker;
pub use integrate::IntegrateWorker;
pub use stop::{StopFlag, StopSignal};
pub use supervisor::{ControlState, FinishedCallback, WorkerSupervisor};
pub use worker::{AcquisitionWorker, EmissionCounter, RunContext, WorkerSlot};
