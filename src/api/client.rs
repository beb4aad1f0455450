use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::platform::TransferManager;
use crate::application::storage::file_uri;
use crate::domain::{DownloadError, JobId, JobRecord, JobStatus, TransferJob};
use crate::utils::unique_path;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// In-process stand-in for the platform transfer manager: jobs run on the
/// tokio runtime, land under `root`, and their ids are broadcast on
/// completion.
#[derive(Clone)]
pub struct HttpTransferManager {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    root: PathBuf,
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    next_id: AtomicU64,
    completions: mpsc::UnboundedSender<JobId>,
}

impl HttpTransferManager {
    pub fn new(root: impl Into<PathBuf>, completions: mpsc::UnboundedSender<JobId>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: Client::new(),
                root: root.into(),
                jobs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                completions,
            }),
        }
    }

    /// Streams the response body to a fresh file. Returns the path written.
    /// The file is claimed before the request goes out, so concurrent jobs
    /// for the same name never share a path.
    pub async fn download_file(&self, job: &TransferJob) -> Result<PathBuf> {
        let destination = destination_for(&self.inner.root, &job.destination_subpath)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let (path, mut file) = create_unique(&destination).await?;

        match self.write_body(job, &path, &mut file).await {
            Ok(()) => Ok(path),
            Err(e) => {
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), "Could not remove partial file: {}", remove);
                }
                Err(e)
            }
        }
    }

    async fn write_body(
        &self,
        job: &TransferJob,
        path: &Path,
        file: &mut tokio::fs::File,
    ) -> Result<()> {
        let (total_size, stream) = self.download_file_stream(job).await?;
        debug!(url = %job.url, ?total_size, path = %path.display(), "Transfer started");

        let mut stream = stream.boxed();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Returns (total_size, stream)
    async fn download_file_stream(
        &self,
        job: &TransferJob,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let mut request = self.inner.client.get(&job.url);
        if let Some(agent) = &job.user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await?.error_for_status()?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }

    fn set_record(&self, id: JobId, record: JobRecord) {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);
    }

    async fn run_job(self, id: JobId, job: TransferJob) {
        let record = match self.download_file(&job).await {
            Ok(path) => match file_uri(&path) {
                Ok(uri) => {
                    info!(%id, path = %path.display(), "Transfer finished");
                    JobRecord {
                        status: JobStatus::Successful,
                        file_uri: Some(uri),
                        mime_type: job.mime_type.clone(),
                        title: job.title.clone(),
                    }
                }
                Err(e) => {
                    warn!(%id, "Transfer finished without a usable location: {}", e);
                    failed_record(&job)
                }
            },
            Err(e) => {
                warn!(%id, url = %job.url, "Transfer failed: {}", e);
                failed_record(&job)
            }
        };

        self.set_record(id, record);
        if self.inner.completions.send(id).is_err() {
            debug!(%id, "No listener for transfer completion");
        }
    }
}

impl TransferManager for HttpTransferManager {
    fn submit(&self, job: TransferJob) -> std::result::Result<JobId, DownloadError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| DownloadError::TransferManagerUnavailable)?;
        destination_for(&self.inner.root, &job.destination_subpath)
            .map_err(|e| DownloadError::TransferFailed(e.to_string()))?;

        let id = JobId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.set_record(
            id,
            JobRecord {
                status: JobStatus::InProgress,
                file_uri: None,
                mime_type: job.mime_type.clone(),
                title: job.title.clone(),
            },
        );

        runtime.spawn(self.clone().run_job(id, job));
        Ok(id)
    }

    fn query(&self, id: JobId) -> Option<JobRecord> {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

fn failed_record(job: &TransferJob) -> JobRecord {
    JobRecord {
        status: JobStatus::Failed,
        file_uri: None,
        mime_type: job.mime_type.clone(),
        title: job.title.clone(),
    }
}

/// Joins a relative `subpath` under `root`, refusing anything that climbs out.
fn destination_for(root: &Path, subpath: &str) -> Result<PathBuf> {
    let relative = Path::new(subpath);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)));
    if subpath.is_empty() || escapes {
        return Err(ApiError::InvalidDestination(subpath.to_string()));
    }
    Ok(root.join(relative))
}

/// Creates the first free `base(N).ext` variant of `destination`. Losing a
/// race to another job just moves on to the next candidate.
async fn create_unique(destination: &Path) -> Result<(PathBuf, tokio::fs::File)> {
    loop {
        let path = unique_path(destination);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: String) -> TransferJob {
        TransferJob {
            url,
            mime_type: Some("text/csv".to_string()),
            user_agent: Some("TestAgent/1.0".to_string()),
            title: "report.csv".to_string(),
            destination_subpath: "DBGID-XLXS/report.csv".to_string(),
        }
    }

    #[test]
    fn test_destination_rejects_escape() {
        let root = Path::new("/downloads");
        assert!(destination_for(root, "../etc/passwd").is_err());
        assert!(destination_for(root, "/abs/path").is_err());
        assert!(destination_for(root, "").is_err());
        assert_eq!(
            destination_for(root, "DBGID-XLXS/a.csv").unwrap(),
            PathBuf::from("/downloads/DBGID-XLXS/a.csv")
        );
    }

    #[test]
    fn test_submit_without_runtime_is_unavailable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new("/tmp", tx);
        let err = manager
            .submit(job("http://127.0.0.1:9/x".to_string()))
            .unwrap_err();
        assert_eq!(err, DownloadError::TransferManagerUnavailable);
    }

    #[tokio::test]
    async fn test_successful_job_is_broadcast() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/report.csv")
            .match_header("user-agent", "TestAgent/1.0")
            .with_status(200)
            .with_body("a,b\n1,2\n")
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new(root.path(), tx);

        let id = manager
            .submit(job(format!("{}/report.csv", server.url())))
            .unwrap();
        assert_eq!(rx.recv().await, Some(id));
        mock.assert_async().await;

        let record = manager.query(id).unwrap();
        assert_eq!(record.status, JobStatus::Successful);
        assert_eq!(record.title, "report.csv");
        let saved = root.path().join("DBGID-XLXS/report.csv");
        assert_eq!(std::fs::read(&saved).unwrap(), b"a,b\n1,2\n");
        assert!(record.file_uri.unwrap().ends_with("DBGID-XLXS/report.csv"));
    }

    #[tokio::test]
    async fn test_existing_file_gets_numbered_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/report.csv")
            .with_body("new")
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("DBGID-XLXS")).unwrap();
        std::fs::write(root.path().join("DBGID-XLXS/report.csv"), b"old").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new(root.path(), tx);
        let id = manager
            .submit(job(format!("{}/report.csv", server.url())))
            .unwrap();
        rx.recv().await;

        assert_eq!(manager.query(id).unwrap().status, JobStatus::Successful);
        assert_eq!(
            std::fs::read(root.path().join("DBGID-XLXS/report(1).csv")).unwrap(),
            b"new"
        );
    }

    #[tokio::test]
    async fn test_claimed_name_is_skipped_before_any_write() {
        let root = tempfile::tempdir().unwrap();
        let destination = root.path().join("r.csv");

        let (first, _a) = create_unique(&destination).await.unwrap();
        let (second, _b) = create_unique(&destination).await.unwrap();

        assert_eq!(first, destination);
        assert_eq!(second, root.path().join("r(1).csv"));
    }

    #[tokio::test]
    async fn test_overlapping_jobs_get_distinct_files() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/r.csv")
            .with_body("body")
            .expect(2)
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new(root.path(), tx);

        let url = format!("{}/r.csv", server.url());
        let first = manager.submit(job(url.clone())).unwrap();
        let second = manager.submit(job(url)).unwrap();
        rx.recv().await;
        rx.recv().await;

        let a = manager.query(first).unwrap();
        let b = manager.query(second).unwrap();
        assert_eq!(a.status, JobStatus::Successful);
        assert_eq!(b.status, JobStatus::Successful);
        assert_ne!(a.file_uri, b.file_uri);

        let dir = root.path().join("DBGID-XLXS");
        assert_eq!(std::fs::read(dir.join("report.csv")).unwrap(), b"body");
        assert_eq!(std::fs::read(dir.join("report(1).csv")).unwrap(), b"body");
    }

    #[tokio::test]
    async fn test_http_error_marks_job_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.csv")
            .with_status(404)
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new(root.path(), tx);
        let id = manager
            .submit(job(format!("{}/missing.csv", server.url())))
            .unwrap();

        assert_eq!(rx.recv().await, Some(id));
        let record = manager.query(id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.file_uri, None);
        assert!(!root.path().join("DBGID-XLXS/report.csv").exists());
    }

    #[test]
    fn test_unknown_job_query() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let manager = HttpTransferManager::new("/tmp", tx);
        assert_eq!(manager.query(JobId(42)), None);
    }
}
