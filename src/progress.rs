use std::sync::Arc;

/// Events emitted during a download run for progress reporting
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A run has passed its health check and is starting
    RunStarted { total_courses: usize },

    /// A course is about to be processed
    CourseStarting {
        index: usize,
        total: usize,
        title: String,
        url: String,
    },

    /// A course finished successfully
    CourseCompleted { index: usize, title: String },

    /// A course failed; the run continues
    CourseFailed {
        index: usize,
        title: String,
        error: String,
    },

    /// Remaining courses were skipped after a cancellation request
    CoursesSkipped { count: usize },

    /// The extras-only supplementary pass is starting for a course
    ExtrasStarting { title: String },

    /// Fractional completion of the queue, `completed / total`
    QueueProgress { completed: usize, total: usize },

    /// A file download is starting
    FileStarting {
        name: String,
        content_length: Option<u64>,
    },

    /// Bytes landed for an in-flight file
    FileProgress {
        name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A file finished downloading
    FileCompleted { name: String, bytes_downloaded: u64 },

    /// A file was skipped because the ledger already marks it complete
    FileSkipped { name: String },

    /// A cleanup step failed; remaining steps still run
    CleanupStepFailed { step: String, error: String },

    /// Final summary for the run
    RunCompleted {
        succeeded: usize,
        failed: usize,
        skipped: usize,
        files_downloaded: u64,
        files_skipped: u64,
        bytes_downloaded: u64,
    },
}

/// Injected sink for run events.
///
/// Replaces any global logger redirection: every component that reports
/// progress receives this explicitly. Implementations must tolerate any event
/// at any time; a reporter can render progress bars, log lines, or nothing.
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// A shared reference to a run reporter
pub type SharedRunReporter = Arc<dyn RunReporter>;

/// A no-op reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl RunReporter for NoopReporter {
    fn report(&self, _event: RunEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedRunReporter {
        Arc::new(Self)
    }
}
