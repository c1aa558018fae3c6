//! Submission pipeline: chunking, throttling, failure reporting.

mod failures;
mod submit;
mod throttle;

pub use failures::FailureScanner;
pub use submit::{ChunkSubmitter, RunStats, RunTag};
pub use throttle::TaskThrottle;
