// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The collaborator contract between the orchestrator and media processors.
//!
//! A processor performs the page-content extraction and file transfers for
//! one media kind. It borrows the shared page and HTTP session, consults the
//! ledger at its own per-file granularity, and observes the run's
//! cancellation token at file boundaries. Processors never close shared
//! resources.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserPage;
use crate::error::ProcessorError;
use crate::http::HttpClient;
use crate::ledger::SharedLedger;
use crate::progress::SharedRunReporter;

/// Transfer counters accumulated per run, never persisted
#[derive(Debug, Default)]
pub struct TransferMetrics {
    files_downloaded: AtomicU64,
    files_skipped: AtomicU64,
    bytes_downloaded: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferSnapshot {
    pub files_downloaded: u64,
    pub files_skipped: u64,
    pub bytes_downloaded: u64,
}

impl TransferMetrics {
    pub fn record_file(&self, bytes: u64) {
        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

/// Resources owned by the orchestrator and lent to processors for a run
#[derive(Clone)]
pub struct SharedResources {
    pub client: Arc<dyn HttpClient>,
    pub ledger: SharedLedger,
    pub metrics: Arc<TransferMetrics>,
    pub cancel: CancellationToken,
    pub reporter: SharedRunReporter,
}

/// What kind of processor to build, and with which settings
#[derive(Debug, Clone)]
pub enum ProcessorSpec {
    Pdf {
        dest_dir: PathBuf,
        variant: u32,
    },
    Video {
        dest_dir: PathBuf,
        resolution: String,
        download_extras: bool,
        /// Skip the video enclosures themselves; fetch only supplementary
        /// materials. Used for the extras pass after a PDF run.
        extras_only: bool,
    },
}

#[async_trait]
pub trait CourseProcessor: Send + Sync {
    /// Process one course through the shared page.
    ///
    /// `Ok(true)` means the course was handled; `Ok(false)` means the
    /// processor gave up without an error worth propagating.
    async fn process_course(
        &self,
        page: &dyn BrowserPage,
        course_url: &str,
    ) -> Result<bool, ProcessorError>;
}

/// Builds processors for the orchestrator
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, spec: &ProcessorSpec, shared: &SharedResources) -> Box<dyn CourseProcessor>;
}

/// Ledger key for one downloadable unit within a course
pub fn ledger_key(course_url: &str, filename: &str) -> String {
    format!("{course_url}|{filename}")
}
