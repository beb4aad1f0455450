use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::filename::resolve_request;
use super::notifier::CompletionNotifier;
use super::pending::PendingSlot;
use super::permission_gate::{GateDecision, GateResolution, PermissionGate};
use super::storage::DownloadStore;
use super::transfer::{FetcherSettings, TransferFetcher};
use crate::api::bridge::{BridgeCall, PageBridge};
use crate::api::platform::{
    FileOpener, RenderingSurface, StoragePermission, TransferManager, UserInterface,
};
use crate::domain::{
    DownloadError, DownloadRequest, FileChooserRequest, JobId, Notice, OpenAction, PendingOperation,
    ShellConfig, SourceKind, TransferOutcome,
};
use crate::utils::is_blob_url;

/// Everything that reaches the coordinating context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Navigation to a `blob:` reference that was intercepted.
    BlobNavigation {
        url: String,
    },
    DownloadRequested {
        url: String,
        user_agent: Option<String>,
        content_disposition: Option<String>,
        mime_type: Option<String>,
    },
    PageFinished {
        url: String,
    },
    Bridge(BridgeCall),
    PermissionResult {
        granted: bool,
    },
    /// Broadcast from the transfer manager.
    TransferComplete(JobId),
    BlobSaved(TransferOutcome),
    BridgeTimeout(u64),
    FileChooserRequested(FileChooserRequest),
    FilesChosen {
        request_id: u64,
        files: Option<Vec<String>>,
    },
    OpenFile(OpenAction),
    ClearSavedFiles,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the coordinator has stopped.
    pub fn send(&self, event: CoordinatorEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct Collaborators {
    pub surface: Arc<dyn RenderingSurface>,
    pub permission: Arc<dyn StoragePermission>,
    pub transfers: Option<Arc<dyn TransferManager>>,
    pub ui: Arc<dyn UserInterface>,
    pub opener: Arc<dyn FileOpener>,
}

/// Owns all download state. Runs on one task and handles events strictly
/// in arrival order.
pub struct DownloadCoordinator {
    surface: Arc<dyn RenderingSurface>,
    permission: Arc<dyn StoragePermission>,
    ui: Arc<dyn UserInterface>,
    gate: PermissionGate<PendingOperation>,
    fetcher: TransferFetcher,
    notifier: CompletionNotifier,
    chooser: PendingSlot<u64>,
}

impl DownloadCoordinator {
    pub fn new(
        config: &ShellConfig,
        collaborators: Collaborators,
        events: CoordinatorHandle,
    ) -> Self {
        let settings = FetcherSettings {
            bridge: PageBridge::new(config.bridge_object.clone()),
            store: DownloadStore::new(config.download_dir()),
            subdir: config.download_subdir.clone(),
            policy: config.pending_policy,
            timeout: config.bridge_timeout(),
        };

        Self {
            fetcher: TransferFetcher::new(
                settings,
                collaborators.transfers,
                collaborators.surface.clone(),
                events,
            ),
            notifier: CompletionNotifier::new(
                collaborators.ui.clone(),
                collaborators.opener,
                config.notification_channel.clone(),
            ),
            surface: collaborators.surface,
            permission: collaborators.permission,
            ui: collaborators.ui,
            gate: PermissionGate::new(config.pending_policy),
            chooser: PendingSlot::new(config.pending_policy),
        }
    }

    /// Whether the surface must cancel a navigation and hand it over.
    pub fn should_intercept(url: &str) -> bool {
        is_blob_url(url)
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        info!("Download coordinator started");
        while let Some(event) = events.recv().await {
            if event == CoordinatorEvent::Shutdown {
                break;
            }
            self.handle(event).await;
        }
        info!("Download coordinator stopped");
    }

    pub async fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::BlobNavigation { url } => {
                self.request_blob_download(&url, None, None).await;
            }
            CoordinatorEvent::DownloadRequested {
                url,
                user_agent,
                content_disposition,
                mime_type,
            } => {
                self.on_download_requested(
                    &url,
                    user_agent.as_deref(),
                    content_disposition.as_deref(),
                    mime_type.as_deref(),
                )
                .await;
            }
            CoordinatorEvent::PageFinished { url } => {
                debug!(%url, "Installing page bridge");
                let script = self.fetcher.bridge().install_script();
                self.surface.evaluate_script(&script);
            }
            CoordinatorEvent::Bridge(call) => self.on_bridge_call(call).await,
            CoordinatorEvent::PermissionResult { granted } => {
                self.on_permission_result(granted).await;
            }
            CoordinatorEvent::TransferComplete(id) => {
                if let Some(outcome) = self.fetcher.on_transfer_complete(id) {
                    self.notifier.report(outcome);
                }
            }
            CoordinatorEvent::BlobSaved(outcome) => self.notifier.report(outcome),
            CoordinatorEvent::BridgeTimeout(ticket) => {
                if let Some(outcome) = self.fetcher.on_bridge_timeout(ticket) {
                    self.notifier.report(outcome);
                }
            }
            CoordinatorEvent::FileChooserRequested(request) => self.on_file_chooser(request),
            CoordinatorEvent::FilesChosen { request_id, files } => {
                match self.chooser.take_if(|id| *id == request_id) {
                    Some(id) => self.surface.complete_file_chooser(id, files),
                    None => debug!(request_id, "Stale file chooser answer"),
                }
            }
            CoordinatorEvent::OpenFile(action) => self.notifier.open(&action),
            CoordinatorEvent::ClearSavedFiles => {
                self.gate_request(PendingOperation::ClearSavedFiles).await;
            }
            CoordinatorEvent::Shutdown => {}
        }
    }

    async fn on_download_requested(
        &mut self,
        url: &str,
        user_agent: Option<&str>,
        content_disposition: Option<&str>,
        mime_type: Option<&str>,
    ) {
        if url.trim().is_empty() {
            debug!("Ignoring download with no URL");
            return;
        }

        let request = DownloadRequest::from_intent(url, user_agent, content_disposition, mime_type);
        if request.source_kind == SourceKind::Blob {
            self.request_blob_download(url, content_disposition, mime_type)
                .await;
            return;
        }

        let file_name = resolve_request(&request);
        info!(%url, %file_name, kind = ?request.source_kind, "Download intercepted");
        self.gate_request(PendingOperation::EnqueueDirect { request, file_name })
            .await;
    }

    async fn request_blob_download(
        &mut self,
        url: &str,
        name_hint: Option<&str>,
        mime_type: Option<&str>,
    ) {
        if url.trim().is_empty() {
            debug!("Ignoring blob download with no URL");
            return;
        }

        let request = DownloadRequest::blob(url, name_hint, mime_type);
        let file_name = resolve_request(&request);
        info!(%url, %file_name, "Blob download intercepted");
        self.gate_request(PendingOperation::SaveBlob { request, file_name })
            .await;
    }

    async fn on_bridge_call(&mut self, call: BridgeCall) {
        if let Err(e) = call.validate() {
            warn!("{}", e);
            return;
        }

        match call {
            BridgeCall::RequestBlobDownload {
                blob_url,
                file_name,
                mime_type,
            } => {
                self.request_blob_download(&blob_url, file_name.as_deref(), mime_type.as_deref())
                    .await;
            }
            BridgeCall::SaveBase64 {
                base64_data,
                file_name,
                mime_type,
            } => {
                if let Some(outcome) =
                    self.fetcher
                        .accept_base64(base64_data, file_name.as_deref(), mime_type.as_deref())
                {
                    self.notifier.report(outcome);
                }
            }
            BridgeCall::ReportError { message, file_name } => {
                if let Some(outcome) = self.fetcher.on_bridge_error(&message, file_name.as_deref())
                {
                    self.notifier.report(outcome);
                }
            }
        }
    }

    async fn gate_request(&mut self, op: PendingOperation) {
        match self.gate.request(op, self.permission.as_ref()) {
            GateDecision::Proceed(op) => self.execute(op).await,
            GateDecision::Deferred { dropped } => {
                if let Some(dropped) = dropped {
                    warn!(kind = dropped.kind(), "Request dropped while awaiting permission");
                }
            }
        }
    }

    async fn on_permission_result(&mut self, granted: bool) {
        match self.gate.on_permission_result(granted) {
            GateResolution::Resume(Some(op)) => {
                info!(kind = op.kind(), "Permission granted, resuming");
                self.execute(op).await;
            }
            GateResolution::Resume(None) => {}
            GateResolution::Denied(op) => {
                if let Some(op) = op {
                    info!(kind = op.kind(), "Permission denied, discarding");
                }
                self.notifier
                    .report(TransferOutcome::Failure(DownloadError::PermissionDenied));
            }
            GateResolution::Stale => {}
        }
    }

    async fn execute(&mut self, op: PendingOperation) {
        match op {
            PendingOperation::EnqueueDirect { request, file_name } => {
                match self.fetcher.enqueue_direct(&request, &file_name) {
                    Ok(_) => self.notifier.notice(Notice::DownloadEnqueued),
                    Err(e) => self.notifier.report(TransferOutcome::Failure(e)),
                }
            }
            PendingOperation::SaveBlob { request, file_name } => {
                self.fetcher.begin_blob_retrieval(request, file_name);
            }
            PendingOperation::ClearSavedFiles => {
                let notice = match self.fetcher.store().clear().await {
                    Ok(0) => Notice::ClearEmpty,
                    Ok(count) => Notice::ClearDone(count),
                    Err(e) => {
                        warn!("Clearing saved files failed: {}", e);
                        Notice::DownloadFailed
                    }
                };
                self.notifier.notice(notice);
            }
        }
    }

    fn on_file_chooser(&mut self, request: FileChooserRequest) {
        let request_id = request.request_id;
        if let Some(dropped) = self.chooser.offer(request_id) {
            self.surface.complete_file_chooser(dropped, None);
            if dropped == request_id {
                return;
            }
        }

        if let Err(e) = self.ui.choose_files(request) {
            warn!(request_id, "File chooser unavailable: {}", e);
            self.chooser.take();
            self.ui.show_notice(Notice::FileChooserMissing);
            self.surface.complete_file_chooser(request_id, None);
        }
    }
}
