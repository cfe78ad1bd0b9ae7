//! Capture-processing queue
//!
//! A single-flight, FIFO, crash-tolerant worker over the capture directory:
//! discover unprocessed images, classify each in modification-time order,
//! persist one prediction per image, then chain the day's enrichment pass.
//! Progress is observable through a lock-protected snapshot at any time.

pub mod scanner;
pub mod state;
pub mod worker;

pub use scanner::{CaptureScanner, DiscoveredImage, ScanError};
pub use state::{QueueState, QueueStatus};
pub use worker::QueueWorker;
