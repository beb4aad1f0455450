pub mod config;
pub mod error;
pub mod model;

pub use config::{PendingPolicy, ShellConfig};
pub use error::{ConfigError, DownloadError};
pub use model::{
    DownloadNotification, DownloadRequest, FileChooserRequest, JobId, JobRecord, JobStatus,
    Notice, OpenAction, PendingOperation, ResolvedFile, SourceKind, TransferJob, TransferOutcome,
};
