//! Turning input files into indexed pages.
//!
//! - `source`: page extraction and input discovery
//! - `worker`: background ingestion thread with progress events

mod source;
mod worker;

use std::path::PathBuf;

use serde::Serialize;

use crate::semantic::SemanticSearchError;

pub use source::{expand_inputs, PageSource, PageText, TextPageSource};
pub use worker::{IngestEvent, IngestWorker};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a file or directory: {}", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("Ingest worker has stopped")]
    WorkerStopped,
}

/// Page counts from an ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub added: usize,
    /// Empty or already indexed pages
    pub skipped: usize,
    pub failed: usize,
}

impl IngestReport {
    /// Count the outcome of inserting one page.
    pub fn record(&mut self, result: &Result<usize, SemanticSearchError>) {
        match result {
            Ok(_) => self.added += 1,
            Err(e) if e.is_skip() => {
                log::debug!("page skipped: {e}");
                self.skipped += 1;
            }
            Err(e) => {
                log::warn!("failed to index page: {e}");
                self.failed += 1;
            }
        }
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.added += other.added;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}
