//! Run reports
//!
//! Markdown summaries of ingestion runs and checkpoint statistics. The JSON
//! failure report is written by [`crate::state::FailureQueue::export_report`].

mod markdown;

pub use markdown::{format_checkpoint_statistics, format_markdown_summary, write_markdown_summary};
