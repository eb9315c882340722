// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming file transfer shared by the processors.
//!
//! Files are streamed to a `.partial` sibling and renamed into place only
//! once fully flushed, so an interrupted transfer never leaves a plausible
//! but truncated artifact. The ledger is marked by the caller, after the
//! rename.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use log::{debug, warn};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::ProcessorError;
use crate::http::HttpClient;
use crate::ledger::SharedLedger;
use crate::processor::{SharedResources, ledger_key};
use crate::progress::RunEvent;

/// One downloadable unit discovered on a course page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub url: String,
    pub filename: String,
}

/// Stream one URL to `dest`, reporting progress and returning the byte count.
pub async fn download_to_file(
    client: &dyn HttpClient,
    url: &str,
    dest: &Path,
    shared: &SharedResources,
) -> Result<u64, ProcessorError> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| ProcessorError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(ProcessorError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    shared.reporter.report(RunEvent::FileStarting {
        name: name.clone(),
        content_length: response.content_length,
    });

    let partial = partial_path(dest);
    let mut file = File::create(&partial)
        .await
        .map_err(|e| ProcessorError::FileCreateFailed {
            path: partial.clone(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ProcessorError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| ProcessorError::FileWriteFailed {
                path: partial.clone(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        shared.reporter.report(RunEvent::FileProgress {
            name: name.clone(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| ProcessorError::FileWriteFailed {
            path: partial.clone(),
            source: e,
        })?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| ProcessorError::FileWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

    shared.metrics.record_file(bytes_downloaded);
    shared.reporter.report(RunEvent::FileCompleted {
        name,
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

/// Fetch every material not already in the ledger, marking each one complete
/// only after its artifact is in place. Observes cancellation between files.
pub async fn fetch_materials(
    materials: &[Material],
    dest_dir: &Path,
    course_url: &str,
    shared: &SharedResources,
) -> Result<(), ProcessorError> {
    if materials.is_empty() {
        return Ok(());
    }

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ProcessorError::FileCreateFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

    for material in materials {
        if shared.cancel.is_cancelled() {
            warn!("cancellation observed, stopping transfers for {course_url}");
            return Err(ProcessorError::Cancelled);
        }

        let key = ledger_key(course_url, &material.filename);
        if already_done(&shared.ledger, &key) {
            debug!("already downloaded: {}", material.filename);
            shared.metrics.record_skip();
            shared.reporter.report(RunEvent::FileSkipped {
                name: material.filename.clone(),
            });
            continue;
        }

        let dest = dest_dir.join(&material.filename);
        download_to_file(shared.client.as_ref(), &material.url, &dest, shared).await?;
        shared.ledger.mark_completed(&key)?;
    }

    Ok(())
}

fn already_done(ledger: &SharedLedger, key: &str) -> bool {
    ledger.is_completed(key)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::ledger::ProgressLedger;
    use crate::processor::TransferMetrics;
    use crate::progress::NoopReporter;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    pub(crate) struct MockHttpClient {
        pub response_data: Vec<u8>,
        pub status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    fn shared(dir: &Path, client: MockHttpClient) -> SharedResources {
        SharedResources {
            client: Arc::new(client),
            ledger: SharedLedger::new(ProgressLedger::load(&dir.join("progress.json"))),
            metrics: Arc::new(TransferMetrics::default()),
            cancel: CancellationToken::new(),
            reporter: NoopReporter::shared(),
        }
    }

    #[tokio::test]
    async fn download_writes_file_and_removes_partial() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("aula-01.pdf");
        let shared = shared(
            dir.path(),
            MockHttpClient {
                response_data: b"pdf bytes".to_vec(),
                status: 200,
            },
        );

        let bytes = download_to_file(shared.client.as_ref(), "https://x/a.pdf", &dest, &shared)
            .await
            .unwrap();

        assert_eq!(bytes, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"pdf bytes");
        assert!(!dir.path().join("aula-01.pdf.partial").exists());
        assert_eq!(shared.metrics.snapshot().files_downloaded, 1);
    }

    #[tokio::test]
    async fn download_fails_on_http_error_without_artifact() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("aula-01.pdf");
        let shared = shared(
            dir.path(),
            MockHttpClient {
                response_data: b"Not Found".to_vec(),
                status: 404,
            },
        );

        let result =
            download_to_file(shared.client.as_ref(), "https://x/a.pdf", &dest, &shared).await;

        match result {
            Err(ProcessorError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn fetch_materials_skips_completed_and_marks_new() {
        let dir = tempdir().unwrap();
        let shared = shared(
            dir.path(),
            MockHttpClient {
                response_data: b"data".to_vec(),
                status: 200,
            },
        );
        let course = "https://x/cursos/c/aulas";
        shared
            .ledger
            .mark_completed(&ledger_key(course, "done.pdf"))
            .unwrap();

        let materials = vec![
            Material {
                url: "https://x/done.pdf".to_string(),
                filename: "done.pdf".to_string(),
            },
            Material {
                url: "https://x/new.pdf".to_string(),
                filename: "new.pdf".to_string(),
            },
        ];
        let dest_dir = dir.path().join("out");

        fetch_materials(&materials, &dest_dir, course, &shared)
            .await
            .unwrap();

        assert!(!dest_dir.join("done.pdf").exists());
        assert!(dest_dir.join("new.pdf").exists());
        assert!(shared.ledger.is_completed(&ledger_key(course, "new.pdf")));
        assert_eq!(shared.metrics.snapshot().files_skipped, 1);
    }

    #[tokio::test]
    async fn fetch_materials_observes_cancellation() {
        let dir = tempdir().unwrap();
        let shared = shared(
            dir.path(),
            MockHttpClient {
                response_data: b"data".to_vec(),
                status: 200,
            },
        );
        shared.cancel.cancel();

        let materials = vec![Material {
            url: "https://x/new.pdf".to_string(),
            filename: "new.pdf".to_string(),
        }];

        let result =
            fetch_materials(&materials, &dir.path().join("out"), "https://x/c", &shared).await;

        assert!(matches!(result, Err(ProcessorError::Cancelled)));
    }
}
