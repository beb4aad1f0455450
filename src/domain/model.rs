use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::DownloadError;
use crate::utils::{is_blob_url, non_empty};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    DirectUrl,
    DispositionUrl,
    Blob,
}

/// One intercepted download. Built once and consumed by a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_kind: SourceKind,
    pub url: String,
    pub suggested_name: Option<String>,
    pub mime_type: Option<String>,
    pub disposition: Option<String>,
    pub user_agent: Option<String>,
}

impl DownloadRequest {
    /// Request raised by the rendering surface's download listener.
    pub fn from_intent(
        url: &str,
        user_agent: Option<&str>,
        disposition: Option<&str>,
        mime_type: Option<&str>,
    ) -> Self {
        let disposition = disposition.and_then(non_empty);
        let source_kind = if is_blob_url(url) {
            SourceKind::Blob
        } else if disposition.is_some() {
            SourceKind::DispositionUrl
        } else {
            SourceKind::DirectUrl
        };

        Self {
            source_kind,
            url: url.to_string(),
            suggested_name: None,
            mime_type: mime_type.and_then(non_empty),
            disposition,
            user_agent: user_agent.and_then(non_empty),
        }
    }

    /// Request for an in-page blob, with the anchor's hints.
    pub fn blob(url: &str, name_hint: Option<&str>, mime_type: Option<&str>) -> Self {
        Self {
            source_kind: SourceKind::Blob,
            url: url.to_string(),
            suggested_name: name_hint.and_then(non_empty),
            mime_type: mime_type.and_then(non_empty),
            disposition: None,
            user_agent: None,
        }
    }

    /// Hint handed to the filename resolver. Direct downloads only trust a
    /// disposition that actually names a file.
    pub fn name_hint(&self) -> Option<&str> {
        match self.source_kind {
            SourceKind::Blob => self
                .suggested_name
                .as_deref()
                .or(self.disposition.as_deref()),
            SourceKind::DirectUrl | SourceKind::DispositionUrl => self
                .disposition
                .as_deref()
                .filter(|d| crate::application::filename::has_filename_marker(d)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub final_path: PathBuf,
    pub display_name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success {
        file_uri: String,
        mime_type: Option<String>,
        display_name: String,
    },
    Failure(DownloadError),
}

/// Work blocked on storage permission, captured with everything needed to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperation {
    EnqueueDirect {
        request: DownloadRequest,
        file_name: String,
    },
    SaveBlob {
        request: DownloadRequest,
        file_name: String,
    },
    ClearSavedFiles,
}

impl PendingOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingOperation::EnqueueDirect { .. } => "enqueue-direct",
            PendingOperation::SaveBlob { .. } => "save-blob",
            PendingOperation::ClearSavedFiles => "clear-saved-files",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Submission to the system transfer manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub url: String,
    pub mime_type: Option<String>,
    pub user_agent: Option<String>,
    pub title: String,
    pub destination_subpath: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Successful,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub status: JobStatus,
    pub file_uri: Option<String>,
    pub mime_type: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAction {
    pub file_uri: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadNotification {
    pub id: u32,
    pub channel: String,
    pub title: String,
    pub text: String,
    pub action: OpenAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChooserRequest {
    pub request_id: u64,
    pub accept_types: Vec<String>,
    pub multiple: bool,
}

/// Short transient messages shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DownloadEnqueued,
    DownloadFailed,
    PermissionDenied,
    OpenFileMissing,
    FileChooserMissing,
    ClearDone(usize),
    ClearEmpty,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::DownloadEnqueued => write!(f, "Download started"),
            Notice::DownloadFailed => write!(f, "Download failed"),
            Notice::PermissionDenied => write!(f, "Storage permission is required to save files"),
            Notice::OpenFileMissing => write!(f, "No application can open this file"),
            Notice::FileChooserMissing => write!(f, "No file chooser available"),
            Notice::ClearDone(count) => write!(f, "Deleted {} files", count),
            Notice::ClearEmpty => write!(f, "No saved files"),
        }
    }
}
