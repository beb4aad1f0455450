//! Stdio host: reads surface events as JSON lines from stdin, answers with
//! host commands on stdout, and drives one download coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::api::client::HttpTransferManager;
use crate::api::models::{HostCommand, SurfaceEvent};
use crate::api::platform::{RenderingSurface, StoragePermission, TransferManager};
use crate::application::download_coordinator::{
    Collaborators, CoordinatorEvent, CoordinatorHandle, DownloadCoordinator,
};
use crate::domain::{FileChooserRequest, OpenAction, ShellConfig};
use crate::ui::{DesktopUi, SystemOpener};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The rendering surface as seen from this process: everything it is told
/// goes out as a command line.
pub struct StdioSurface {
    commands: UnboundedSender<HostCommand>,
    permission: AtomicBool,
}

impl StdioSurface {
    pub fn new(commands: UnboundedSender<HostCommand>, permission_granted: bool) -> Self {
        Self {
            commands,
            permission: AtomicBool::new(permission_granted),
        }
    }

    pub fn emit(&self, command: HostCommand) {
        if self.commands.send(command).is_err() {
            debug!("Host output closed, dropping command");
        }
    }

    fn set_granted(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }
}

impl RenderingSurface for StdioSurface {
    fn evaluate_script(&self, script: &str) {
        self.emit(HostCommand::EvaluateScript {
            script: script.to_string(),
        });
    }

    fn complete_file_chooser(&self, request_id: u64, files: Option<Vec<String>>) {
        self.emit(HostCommand::FileChooserResult { request_id, files });
    }
}

impl StoragePermission for StdioSurface {
    fn is_granted(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request(&self) {
        self.emit(HostCommand::RequestPermission);
    }
}

/// Turns one inbound event into coordinator work. Navigation decisions are
/// answered right away.
pub fn route(event: SurfaceEvent, surface: &StdioSurface) -> Option<CoordinatorEvent> {
    match event {
        SurfaceEvent::NavigationRequested { url } => {
            let intercept = DownloadCoordinator::should_intercept(&url);
            surface.emit(HostCommand::NavigationDecision {
                url: url.clone(),
                intercept,
            });
            intercept.then_some(CoordinatorEvent::BlobNavigation { url })
        }
        SurfaceEvent::DownloadRequested {
            url,
            user_agent,
            content_disposition,
            mime_type,
            content_length,
        } => {
            debug!(%url, ?content_length, "Download requested");
            Some(CoordinatorEvent::DownloadRequested {
                url,
                user_agent,
                content_disposition,
                mime_type,
            })
        }
        SurfaceEvent::PageFinished { url } => Some(CoordinatorEvent::PageFinished { url }),
        SurfaceEvent::Bridge { call } => Some(CoordinatorEvent::Bridge(call)),
        SurfaceEvent::PermissionResult { granted } => {
            surface.set_granted(granted);
            Some(CoordinatorEvent::PermissionResult { granted })
        }
        SurfaceEvent::FileChooserRequested {
            request_id,
            accept_types,
            multiple,
        } => Some(CoordinatorEvent::FileChooserRequested(FileChooserRequest {
            request_id,
            accept_types,
            multiple,
        })),
        SurfaceEvent::NotificationAction {
            file_uri,
            mime_type,
        } => Some(CoordinatorEvent::OpenFile(OpenAction {
            file_uri,
            mime_type,
        })),
        SurfaceEvent::ClearSavedFiles => Some(CoordinatorEvent::ClearSavedFiles),
    }
}

async fn write_commands(mut commands: UnboundedReceiver<HostCommand>) -> Result<(), HostError> {
    let mut stdout = tokio::io::stdout();
    while let Some(command) = commands.recv().await {
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

pub async fn run(config: ShellConfig) -> Result<(), HostError> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_commands(command_rx));

    let (handle, events) = CoordinatorHandle::channel();
    let surface = Arc::new(StdioSurface::new(
        command_tx.clone(),
        config.assume_storage_permission,
    ));

    let (completions_tx, mut completions_rx) = mpsc::unbounded_channel();
    let transfers = HttpTransferManager::new(config.downloads_root(), completions_tx);
    let forward = handle.clone();
    tokio::spawn(async move {
        while let Some(id) = completions_rx.recv().await {
            if !forward.send(CoordinatorEvent::TransferComplete(id)) {
                break;
            }
        }
    });

    let transfers: Arc<dyn TransferManager> = Arc::new(transfers);
    let coordinator = DownloadCoordinator::new(
        &config,
        Collaborators {
            surface: surface.clone(),
            permission: surface.clone(),
            transfers: Some(transfers),
            ui: Arc::new(DesktopUi::new(command_tx, handle.clone())),
            opener: Arc::new(SystemOpener),
        },
        handle.clone(),
    );
    let coordinator = tokio::spawn(coordinator.run(events));

    info!(dir = %config.download_dir().display(), "Host ready");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SurfaceEvent>(&line) {
            Ok(event) => {
                if let Some(event) = route(event, &surface) {
                    handle.send(event);
                }
            }
            Err(e) => warn!("Ignoring malformed event: {}", e),
        }
    }

    info!("Input closed, shutting down");
    handle.send(CoordinatorEvent::Shutdown);
    if let Err(e) = coordinator.await {
        warn!("Coordinator task failed: {}", e);
    }
    drop(surface);

    match writer.await {
        Ok(result) => result,
        Err(e) => {
            warn!("Writer task failed: {}", e);
            Ok(())
        }
    }
}
