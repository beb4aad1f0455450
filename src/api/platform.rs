//! Seams to the host platform. Everything the download core does not own
//! (the browser engine, the transfer manager, permission prompts, dialogs and
//! notifications) is reached through these traits.

use crate::domain::{
    DownloadError, DownloadNotification, FileChooserRequest, JobId, JobRecord, Notice, OpenAction,
    TransferJob,
};

/// The embedded browser engine hosting the page.
pub trait RenderingSurface: Send + Sync {
    /// Runs script in the current page. Fire and forget.
    fn evaluate_script(&self, script: &str);

    /// Answers a page's file chooser request. `None` means nothing was picked.
    fn complete_file_chooser(&self, request_id: u64, files: Option<Vec<String>>);
}

/// Out-of-process download service. Completion is broadcast separately.
pub trait TransferManager: Send + Sync {
    fn submit(&self, job: TransferJob) -> Result<JobId, DownloadError>;

    fn query(&self, id: JobId) -> Option<JobRecord>;
}

pub trait StoragePermission: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Shows the platform prompt. The answer arrives later as a single
    /// granted/denied signal.
    fn request(&self);
}

pub trait UserInterface: Send + Sync {
    fn show_notice(&self, notice: Notice);

    /// Confirmation dialog with an "open" button. Choosing it comes back as
    /// an open request to the coordinator.
    fn offer_open(&self, display_name: &str, action: OpenAction);

    fn post_notification(&self, notification: DownloadNotification);

    /// Presents a file picker. The selection comes back to the coordinator.
    fn choose_files(&self, request: FileChooserRequest) -> Result<(), DownloadError>;
}

pub trait FileOpener: Send + Sync {
    fn open(&self, action: &OpenAction) -> Result<(), DownloadError>;
}
