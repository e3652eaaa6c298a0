//! Crawl ingestion pipeline
//!
//! [`Orchestrator`] wires a crawl source, the knowledge store cache, the
//! categorizer and the mode selector together and runs pages through a
//! bounded worker pool, recording every outcome durably.

mod orchestrator;
mod pool;
mod summary;
pub mod transform;

pub use orchestrator::{Collaborators, Orchestrator};
pub use pool::run_pool;
pub use summary::{RunSummary, SKIPPED_EXISTING, SKIPPED_LOW_VALUE};
