pub mod accounting;
pub mod ack;
pub mod client;
pub mod error;
pub mod listener;
pub mod processor;
pub mod tracker;

pub use ack::{AcknowledgeInfo, AcknowledgeItem, Job};
pub use client::IngestClient;
pub use error::{IngestorError, Result};
pub use processor::{BulkOptions, BulkProcessor, run_background_processor};
pub use tracker::JobTracker;
