use std::sync::Arc;

use tracing::{info, warn};

use crate::api::platform::{FileOpener, UserInterface};
use crate::domain::{DownloadError, DownloadNotification, Notice, OpenAction, TransferOutcome};
use crate::utils::notification_id;

pub const COMPLETE_TITLE: &str = "Download complete";

/// Tells the user how a transfer ended. Takes each outcome by value, so an
/// outcome is reported at most once.
pub struct CompletionNotifier {
    ui: Arc<dyn UserInterface>,
    opener: Arc<dyn FileOpener>,
    channel: String,
}

impl CompletionNotifier {
    pub fn new(
        ui: Arc<dyn UserInterface>,
        opener: Arc<dyn FileOpener>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            ui,
            opener,
            channel: channel.into(),
        }
    }

    pub fn report(&self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Success {
                file_uri,
                mime_type,
                display_name,
            } => {
                info!(%file_uri, %display_name, "Download complete");
                let action = OpenAction {
                    file_uri,
                    mime_type,
                };
                self.ui.offer_open(&display_name, action.clone());
                self.ui.post_notification(DownloadNotification {
                    id: notification_id(),
                    channel: self.channel.clone(),
                    title: COMPLETE_TITLE.to_string(),
                    text: display_name,
                    action,
                });
            }
            TransferOutcome::Failure(err) => {
                warn!("Download failed: {}", err);
                let notice = match err {
                    DownloadError::PermissionDenied => Notice::PermissionDenied,
                    _ => Notice::DownloadFailed,
                };
                self.ui.show_notice(notice);
            }
        }
    }

    pub fn notice(&self, notice: Notice) {
        self.ui.show_notice(notice);
    }

    /// Opens a saved file from the dialog or the notification.
    pub fn open(&self, action: &OpenAction) {
        if let Err(e) = self.opener.open(action) {
            warn!(file_uri = %action.file_uri, "Open failed: {}", e);
            self.ui.show_notice(Notice::OpenFileMissing);
        }
    }
}
