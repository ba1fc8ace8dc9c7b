//! Storage layer for Stratloop - run reports as JSON, JSONL and Markdown files.

mod reports;
mod summary;

pub use reports::{ReportStore, SaveTally, save_as_completed};
pub use summary::render_summary;
