//! Result delivery and export.

pub mod sink;
pub mod storage;

pub use sink::ResultSink;
pub use storage::{CsvWriter, CSV_HEADER};
