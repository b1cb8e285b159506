//! Output of a run: the documents on disk and the console summary.

mod generator;
mod writer;

pub use generator::{generate_run_summary, RunSummary};
pub use writer::{publish_documents, write_documents, write_last_update, WrittenDocument};
