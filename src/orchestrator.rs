// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The download orchestrator.
//!
//! Drives one run end to end: health check, shared resource acquisition,
//! one-time authentication, the sequential per-course processing loop, the
//! final report, and best-effort cleanup that always runs. Courses share one
//! browser session and one HTTP session, so they are processed strictly in
//! queue order, never in parallel.

use std::sync::Arc;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::auth::{Authenticator, Credentials};
use crate::browser::{BrowserEngine, BrowserPage, BrowserSession, LaunchOptions};
use crate::config::{ConfigStore, CredentialStore, DownloadKind};
use crate::error::{ProcessorError, RunError};
use crate::http::{HttpClient, HttpLimits, ReqwestClient};
use crate::ledger::SharedLedger;
use crate::processor::{
    ProcessorFactory, ProcessorSpec, SharedResources, TransferMetrics, TransferSnapshot,
};
use crate::progress::{RunEvent, SharedRunReporter};
use crate::queue::{CourseEntry, CourseQueue};

/// Outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    /// Courses whose processing was started
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Courses not attempted because cancellation was requested
    pub skipped: usize,
    pub transfer: TransferSnapshot,
}

impl RunReport {
    /// True iff every attempted course succeeded. Skipped courses do not
    /// count against success.
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// One best-effort teardown step and whether it failed
#[derive(Debug, Clone)]
pub struct CleanupStep {
    pub name: &'static str,
    pub error: Option<String>,
}

/// Aggregated teardown outcome; failures are recorded, never re-raised
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    fn record<E: std::fmt::Display>(
        &mut self,
        name: &'static str,
        result: Result<(), E>,
        reporter: &SharedRunReporter,
    ) {
        let error = result.err().map(|e| e.to_string());
        if let Some(e) = &error {
            warn!("cleanup step '{name}' failed: {e}");
            reporter.report(RunEvent::CleanupStepFailed {
                step: name.to_string(),
                error: e.clone(),
            });
        }
        self.steps.push(CleanupStep { name, error });
    }
}

pub struct Orchestrator {
    config: ConfigStore,
    credentials: CredentialStore,
    queue: CourseQueue,
    ledger: SharedLedger,
    engine: Box<dyn BrowserEngine>,
    authenticator: Arc<dyn Authenticator>,
    factory: Arc<dyn ProcessorFactory>,
    cancel: CancellationToken,
    http_limits: HttpLimits,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConfigStore,
        credentials: CredentialStore,
        queue: CourseQueue,
        ledger: SharedLedger,
        engine: Box<dyn BrowserEngine>,
        authenticator: Arc<dyn Authenticator>,
        factory: Arc<dyn ProcessorFactory>,
    ) -> Self {
        Self {
            config,
            credentials,
            queue,
            ledger,
            engine,
            authenticator,
            factory,
            cancel: CancellationToken::new(),
            http_limits: HttpLimits::default(),
        }
    }

    /// Token for requesting cancellation from outside the run loop.
    ///
    /// Cancellation is cooperative: it is observed between courses and at
    /// file boundaries inside processors, never preemptively.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn request_cancel(&self) {
        warn!("cancellation requested");
        self.cancel.cancel();
    }

    /// Run the whole download flow.
    ///
    /// Fatal conditions (invalid configuration, empty queue, missing
    /// credential, browser or login failure) return `Err` and are reported
    /// before or during resource acquisition; per-course failures are
    /// isolated and counted in the returned report.
    pub async fn run(&mut self, reporter: SharedRunReporter) -> Result<RunReport, RunError> {
        // Health check: fail fast, before acquiring any external resource.
        let problems = self.config.validate(&self.credentials);
        if !problems.is_empty() {
            for problem in &problems {
                error!("invalid configuration: {problem}");
            }
            return Err(RunError::InvalidConfig(problems));
        }

        let courses = self.queue.get_all();
        if courses.is_empty() {
            warn!("no courses queued; nothing to do");
            return Err(RunError::EmptyQueue);
        }

        let email = self.config.config().email.clone();
        let password = self
            .credentials
            .get(&email)?
            .ok_or(RunError::MissingCredential {
                email: email.clone(),
            })?;
        let credentials = Credentials { email, password };

        info!("starting run: {} course(s) queued", courses.len());
        reporter.report(RunEvent::RunStarted {
            total_courses: courses.len(),
        });

        // Shared resources, acquired once and reused across every course.
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&self.http_limits)?);
        info!("shared HTTP session initialized");

        let options = LaunchOptions {
            headless: self.config.config().headless,
            ..Default::default()
        };
        let mut session = self.engine.launch(&options).await?;
        let metrics = Arc::new(TransferMetrics::default());

        let outcome = self
            .drive(
                session.as_mut(),
                client.clone(),
                &credentials,
                &courses,
                metrics,
                &reporter,
            )
            .await;

        // Cleanup always runs; each step is isolated and failures never
        // prevent the remaining steps.
        let _cleanup = cleanup(session.as_mut(), client, &reporter).await;
        info!("resources released");

        if let Ok(report) = &outcome {
            info!(
                "run finished: {} succeeded, {} failed, {} skipped ({} file(s), {} byte(s))",
                report.succeeded,
                report.failed,
                report.skipped,
                report.transfer.files_downloaded,
                report.transfer.bytes_downloaded,
            );
            reporter.report(RunEvent::RunCompleted {
                succeeded: report.succeeded,
                failed: report.failed,
                skipped: report.skipped,
                files_downloaded: report.transfer.files_downloaded,
                files_skipped: report.transfer.files_skipped,
                bytes_downloaded: report.transfer.bytes_downloaded,
            });
        }

        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        client: Arc<dyn HttpClient>,
        credentials: &Credentials,
        courses: &[CourseEntry],
        metrics: Arc<TransferMetrics>,
        reporter: &SharedRunReporter,
    ) -> Result<RunReport, RunError> {
        let page = session.new_page().await?;

        // Login once; an authentication failure is systemic, not item-specific.
        self.authenticator.login(page.as_ref(), credentials).await?;

        let shared = SharedResources {
            client,
            ledger: self.ledger.clone(),
            metrics: metrics.clone(),
            cancel: self.cancel.clone(),
            reporter: reporter.clone(),
        };

        let total = courses.len();
        let mut attempted = 0;
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for (index, course) in courses.iter().enumerate() {
            if self.cancel.is_cancelled() {
                skipped = total - index;
                warn!("cancelled; skipping {skipped} remaining course(s)");
                reporter.report(RunEvent::CoursesSkipped { count: skipped });
                break;
            }

            info!("processing course {}/{}: {}", index + 1, total, course.title);
            reporter.report(RunEvent::CourseStarting {
                index,
                total,
                title: course.title.clone(),
                url: course.url.clone(),
            });

            attempted += 1;
            match self.process_course(page.as_ref(), course, &shared).await {
                Ok(true) => {
                    succeeded += 1;
                    info!("course {}/{} done", index + 1, total);
                    reporter.report(RunEvent::CourseCompleted {
                        index,
                        title: course.title.clone(),
                    });
                }
                Ok(false) => {
                    failed += 1;
                    error!("course {}/{} failed", index + 1, total);
                    reporter.report(RunEvent::CourseFailed {
                        index,
                        title: course.title.clone(),
                        error: "processor gave up".to_string(),
                    });
                }
                Err(ProcessorError::Cancelled) => {
                    // The course was interrupted mid-flight; it counts as
                    // neither attempted nor failed.
                    attempted -= 1;
                    skipped = total - index;
                    warn!("cancelled during course {}; stopping", index + 1);
                    reporter.report(RunEvent::CoursesSkipped { count: skipped });
                    break;
                }
                Err(e) => {
                    failed += 1;
                    error!("course {}/{} failed: {e}", index + 1, total);
                    reporter.report(RunEvent::CourseFailed {
                        index,
                        title: course.title.clone(),
                        error: e.to_string(),
                    });
                }
            }

            reporter.report(RunEvent::QueueProgress {
                completed: index + 1,
                total,
            });
        }

        Ok(RunReport {
            total,
            attempted,
            succeeded,
            failed,
            skipped,
            transfer: metrics.snapshot(),
        })
    }

    async fn process_course(
        &self,
        page: &dyn BrowserPage,
        course: &CourseEntry,
        shared: &SharedResources,
    ) -> Result<bool, ProcessorError> {
        let config = self.config.config();

        let spec = match config.download_type {
            DownloadKind::Pdf => ProcessorSpec::Pdf {
                dest_dir: config.pdf_config.download_dir.clone(),
                variant: config.pdf_config.pdf_variant,
            },
            DownloadKind::Video => ProcessorSpec::Video {
                dest_dir: config.video_config.download_dir.clone(),
                resolution: config.video_config.preferred_resolution.clone(),
                download_extras: config.video_config.download_extras,
                extras_only: false,
            },
        };

        let processor = self.factory.create(&spec, shared);
        let ok = processor.process_course(page, &course.url).await?;

        // For PDF runs with the supplementary flag, fetch the video extras
        // (mind maps, summaries, slides) after the primary pass succeeds.
        if ok
            && config.download_type == DownloadKind::Pdf
            && config.pdf_config.download_video_extras_with_pdf
        {
            info!("fetching supplementary materials for {}", course.title);
            shared.reporter.report(RunEvent::ExtrasStarting {
                title: course.title.clone(),
            });

            let dest_dir = config
                .pdf_config
                .extras_download_dir
                .clone()
                .unwrap_or_else(|| config.pdf_config.download_dir.clone());
            let extras_spec = ProcessorSpec::Video {
                dest_dir,
                // No video is downloaded in extras-only mode; the resolution
                // is irrelevant.
                resolution: "360p".to_string(),
                download_extras: true,
                extras_only: true,
            };
            let extras = self.factory.create(&extras_spec, shared);
            extras.process_course(page, &course.url).await?;
        }

        Ok(ok)
    }
}

async fn cleanup(
    session: &mut dyn BrowserSession,
    client: Arc<dyn HttpClient>,
    reporter: &SharedRunReporter,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    info!("closing HTTP session");
    drop(client);
    report.record::<std::convert::Infallible>("release http session", Ok(()), reporter);

    info!("closing browser");
    report.record("close browser context", session.close().await, reporter);
    report.record("stop browser engine", session.shutdown().await, reporter);

    report
}
