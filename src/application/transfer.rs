use std::sync::Arc;
use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::{debug, info, warn};

use super::download_coordinator::{CoordinatorEvent, CoordinatorHandle};
use super::filename::ensure_file_name;
use super::pending::PendingSlot;
use super::storage::{file_uri, DownloadStore};
use crate::api::bridge::PageBridge;
use crate::api::platform::{RenderingSurface, TransferManager};
use crate::domain::{
    DownloadError, DownloadRequest, JobId, JobStatus, PendingPolicy, TransferJob, TransferOutcome,
};
use crate::utils::non_empty;

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Standard alphabet, padding optional. Whitespace is stripped before decoding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A blob retrieval the page has been asked to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTicket {
    pub id: u64,
    pub request: DownloadRequest,
    pub file_name: String,
}

/// Moves bytes to storage: through the transfer manager for network URLs,
/// through the page bridge for `blob:` references.
pub struct TransferFetcher {
    transfers: Option<Arc<dyn TransferManager>>,
    surface: Arc<dyn RenderingSurface>,
    bridge: PageBridge,
    store: DownloadStore,
    subdir: String,
    tracked_job: Option<JobId>,
    awaiting: PendingSlot<BlobTicket>,
    next_ticket: u64,
    timeout: Option<Duration>,
    events: CoordinatorHandle,
}

pub struct FetcherSettings {
    pub bridge: PageBridge,
    pub store: DownloadStore,
    pub subdir: String,
    pub policy: PendingPolicy,
    pub timeout: Option<Duration>,
}

impl TransferFetcher {
    pub fn new(
        settings: FetcherSettings,
        transfers: Option<Arc<dyn TransferManager>>,
        surface: Arc<dyn RenderingSurface>,
        events: CoordinatorHandle,
    ) -> Self {
        Self {
            transfers,
            surface,
            bridge: settings.bridge,
            store: settings.store,
            subdir: settings.subdir,
            tracked_job: None,
            awaiting: PendingSlot::new(settings.policy),
            next_ticket: 1,
            timeout: settings.timeout,
            events,
        }
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    pub fn bridge(&self) -> &PageBridge {
        &self.bridge
    }

    pub fn tracked_job(&self) -> Option<JobId> {
        self.tracked_job
    }

    pub fn awaiting(&self) -> Option<&BlobTicket> {
        self.awaiting.peek()
    }

    /// Hands a network download to the transfer manager and tracks its id.
    pub fn enqueue_direct(
        &mut self,
        request: &DownloadRequest,
        file_name: &str,
    ) -> Result<JobId, DownloadError> {
        let manager = self
            .transfers
            .as_ref()
            .ok_or(DownloadError::TransferManagerUnavailable)?;

        let job = TransferJob {
            url: request.url.clone(),
            mime_type: request.mime_type.clone(),
            user_agent: request.user_agent.clone(),
            title: file_name.to_string(),
            destination_subpath: format!("{}/{}", self.subdir, file_name),
        };
        let id = manager.submit(job)?;

        if let Some(previous) = self.tracked_job.replace(id) {
            debug!(%previous, "No longer tracking earlier job");
        }
        info!(%id, url = %request.url, file_name, "Transfer enqueued");
        Ok(id)
    }

    /// Completion broadcast from the transfer manager. Ids other than the
    /// tracked one are ignored.
    pub fn on_transfer_complete(&mut self, id: JobId) -> Option<TransferOutcome> {
        if self.tracked_job != Some(id) {
            debug!(%id, "Ignoring completion for untracked job");
            return None;
        }
        let manager = self.transfers.as_ref()?;

        let Some(record) = manager.query(id) else {
            self.tracked_job = None;
            return Some(TransferOutcome::Failure(DownloadError::TransferFailed(
                format!("job {} vanished", id),
            )));
        };

        let outcome = match record.status {
            JobStatus::InProgress => return None,
            JobStatus::Successful => match record.file_uri {
                Some(file_uri) => TransferOutcome::Success {
                    file_uri,
                    mime_type: record.mime_type,
                    display_name: record.title,
                },
                None => TransferOutcome::Failure(DownloadError::TransferFailed(format!(
                    "{} finished without a file location",
                    record.title
                ))),
            },
            JobStatus::Failed => {
                TransferOutcome::Failure(DownloadError::TransferFailed(record.title))
            }
        };

        self.tracked_job = None;
        Some(outcome)
    }

    /// Asks the page to read the blob and send it back through the bridge.
    pub fn begin_blob_retrieval(&mut self, request: DownloadRequest, file_name: String) {
        let id = self.next_ticket;
        self.next_ticket += 1;

        let ticket = BlobTicket {
            id,
            request,
            file_name,
        };
        let script = self.bridge.retrieval_script(
            &ticket.request.url,
            &ticket.file_name,
            ticket.request.mime_type.as_deref(),
        );

        if let Some(dropped) = self.awaiting.offer(ticket) {
            warn!(ticket = dropped.id, file_name = %dropped.file_name, "Blob retrieval dropped");
            if dropped.id == id {
                return;
            }
        }

        debug!(ticket = id, "Running blob retrieval in page");
        self.surface.evaluate_script(&script);

        if let Some(timeout) = self.timeout {
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                events.send(CoordinatorEvent::BridgeTimeout(id));
            });
        }
    }

    /// Bytes delivered by the page. The retrieval script echoes the name it
    /// was given, so an answer whose name does not match the outstanding
    /// ticket belongs to a retrieval that was dropped and is ignored.
    ///
    /// Saving runs off the coordinator; its outcome comes back as
    /// [`CoordinatorEvent::BlobSaved`]. Returns an outcome only when the
    /// payload fails before any work starts.
    pub fn accept_base64(
        &mut self,
        base64_data: String,
        page_file_name: Option<&str>,
        page_mime_type: Option<&str>,
    ) -> Option<TransferOutcome> {
        let Some(ticket) = self.take_ticket_named(page_file_name) else {
            warn!(?page_file_name, "Ignoring blob data nobody asked for");
            return None;
        };

        if base64_data.trim().is_empty() {
            return Some(TransferOutcome::Failure(DownloadError::DecodeFailure(
                "empty payload".to_string(),
            )));
        }

        let mime_type = ticket
            .request
            .mime_type
            .clone()
            .or_else(|| page_mime_type.and_then(non_empty))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        let file_name = ensure_file_name(Some(&ticket.file_name), Some(&mime_type));

        let store = self.store.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = save_base64(&store, &base64_data, &file_name, &mime_type).await;
            events.send(CoordinatorEvent::BlobSaved(outcome));
        });
        None
    }

    /// Page-side failure. A report naming a file only ends the matching
    /// ticket; an unnamed one ends whatever is outstanding.
    pub fn on_bridge_error(
        &mut self,
        message: &str,
        page_file_name: Option<&str>,
    ) -> Option<TransferOutcome> {
        let ticket = match page_file_name {
            Some(_) => self.take_ticket_named(page_file_name),
            None => self.awaiting.take(),
        };
        let Some(ticket) = ticket else {
            warn!(reason = message, ?page_file_name, "Bridge error with no matching retrieval");
            return None;
        };
        warn!(ticket = ticket.id, reason = message, "Page failed to read blob");
        Some(TransferOutcome::Failure(DownloadError::BridgeReportedError(
            message.to_string(),
        )))
    }

    fn take_ticket_named(&mut self, page_file_name: Option<&str>) -> Option<BlobTicket> {
        let name = page_file_name?;
        self.awaiting.take_if(|ticket| ticket.file_name == name)
    }

    pub fn on_bridge_timeout(&mut self, ticket: u64) -> Option<TransferOutcome> {
        let expired = self.awaiting.take_if(|t| t.id == ticket)?;
        warn!(ticket = expired.id, file_name = %expired.file_name, "Blob retrieval timed out");
        Some(TransferOutcome::Failure(DownloadError::Timeout))
    }
}

/// Decodes `base64_data` and writes it to a fresh file in `store`.
pub async fn save_base64(
    store: &DownloadStore,
    base64_data: &str,
    file_name: &str,
    mime_type: &str,
) -> TransferOutcome {
    match try_save_base64(store, base64_data, file_name, mime_type).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(file_name, "Blob save failed: {}", e);
            TransferOutcome::Failure(e)
        }
    }
}

async fn try_save_base64(
    store: &DownloadStore,
    base64_data: &str,
    file_name: &str,
    mime_type: &str,
) -> Result<TransferOutcome, DownloadError> {
    let compact: String = base64_data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let data = LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| DownloadError::DecodeFailure(e.to_string()))?;

    let file = store.reserve(file_name, mime_type).await?;
    store.write(&file, &data).await?;

    Ok(TransferOutcome::Success {
        file_uri: file_uri(&file.final_path)?,
        mime_type: Some(file.mime_type),
        display_name: file.display_name,
    })
}
