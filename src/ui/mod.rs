//! Desktop side of the user interface: native dialogs through `rfd`,
//! notices and notifications as host commands, and the system file opener.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::api::models::HostCommand;
use crate::api::platform::{FileOpener, UserInterface};
use crate::application::download_coordinator::{CoordinatorEvent, CoordinatorHandle};
use crate::domain::{DownloadError, DownloadNotification, FileChooserRequest, Notice, OpenAction};

pub const OPEN_BUTTON: &str = "Open";
const CANCEL_BUTTON: &str = "Cancel";
const ANY_MIME: &str = "*/*";

pub struct DesktopUi {
    commands: UnboundedSender<HostCommand>,
    events: CoordinatorHandle,
}

impl DesktopUi {
    pub fn new(commands: UnboundedSender<HostCommand>, events: CoordinatorHandle) -> Self {
        Self { commands, events }
    }

    fn emit(&self, command: HostCommand) {
        if self.commands.send(command).is_err() {
            debug!("Host output closed, dropping command");
        }
    }
}

impl UserInterface for DesktopUi {
    fn show_notice(&self, notice: Notice) {
        info!(%notice, "Notice");
        self.emit(HostCommand::Notice {
            text: notice.to_string(),
        });
    }

    fn offer_open(&self, display_name: &str, action: OpenAction) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No runtime for the open dialog");
            return;
        };

        let description = format!("Saved {}", display_name);
        let events = self.events.clone();
        runtime.spawn(async move {
            let answer = AsyncMessageDialog::new()
                .set_level(MessageLevel::Info)
                .set_title(crate::application::notifier::COMPLETE_TITLE)
                .set_description(description)
                .set_buttons(MessageButtons::OkCancelCustom(
                    OPEN_BUTTON.to_string(),
                    CANCEL_BUTTON.to_string(),
                ))
                .show()
                .await;

            if is_open_answer(&answer) {
                events.send(CoordinatorEvent::OpenFile(action));
            }
        });
    }

    fn post_notification(&self, notification: DownloadNotification) {
        self.emit(HostCommand::ShowNotification {
            id: notification.id,
            channel: notification.channel,
            title: notification.title,
            text: notification.text,
            file_uri: notification.action.file_uri,
            mime_type: notification.action.mime_type,
        });
    }

    fn choose_files(&self, request: FileChooserRequest) -> Result<(), DownloadError> {
        let runtime = Handle::try_current().map_err(|_| DownloadError::FileChooserUnavailable)?;

        let extensions = accept_extensions(&request.accept_types);
        let events = self.events.clone();
        runtime.spawn(async move {
            let mut dialog = AsyncFileDialog::new().set_title("Choose file");
            if !extensions.is_empty() {
                dialog = dialog.add_filter("Accepted files", &extensions);
            }

            let files = if request.multiple {
                dialog.pick_files().await.map(|handles| {
                    handles
                        .iter()
                        .map(|h| h.path().display().to_string())
                        .collect::<Vec<_>>()
                })
            } else {
                dialog
                    .pick_file()
                    .await
                    .map(|h| vec![h.path().display().to_string()])
            };

            debug!(request_id = request.request_id, ?files, "File chooser closed");
            events.send(CoordinatorEvent::FilesChosen {
                request_id: request.request_id,
                files,
            });
        });
        Ok(())
    }
}

fn is_open_answer(answer: &MessageDialogResult) -> bool {
    match answer {
        MessageDialogResult::Ok | MessageDialogResult::Yes => true,
        MessageDialogResult::Custom(label) => label == OPEN_BUTTON,
        _ => false,
    }
}

/// File extensions for a page's accept list. Entries are either `.ext`
/// or MIME types; `*/*` and unknown types add nothing.
pub fn accept_extensions(accept_types: &[String]) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for accept in accept_types.iter().flat_map(|a| a.split(',')) {
        let accept = accept.trim().to_ascii_lowercase();
        if let Some(ext) = accept.strip_prefix('.') {
            if !ext.is_empty() {
                extensions.push(ext.to_string());
            }
        } else if !accept.is_empty() && accept != ANY_MIME {
            if let Some(known) = mime_guess::get_mime_extensions_str(&accept) {
                extensions.extend(known.iter().map(|e| e.to_string()));
            }
        }
    }
    extensions.sort();
    extensions.dedup();
    extensions
}

/// Opens saved files with whatever the desktop has registered.
#[derive(Debug, Default, Clone)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(path: &std::path::Path) -> Command {
        if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(path);
            command
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(path);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(path);
            command
        }
    }
}

impl FileOpener for SystemOpener {
    fn open(&self, action: &OpenAction) -> Result<(), DownloadError> {
        let path = path_from_uri(&action.file_uri).ok_or(DownloadError::NoActivityToHandleOpen)?;
        if !path.exists() {
            return Err(DownloadError::NoActivityToHandleOpen);
        }

        let mime_type = action.mime_type.as_deref().unwrap_or(ANY_MIME);
        info!(path = %path.display(), mime_type, "Opening file");
        Self::command(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| {
                warn!("No opener available: {}", e);
                DownloadError::NoActivityToHandleOpen
            })
    }
}

fn path_from_uri(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri).ok()?.to_file_path().ok()
}
