use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Storage permission denied")]
    PermissionDenied,

    #[error("Transfer manager unavailable")]
    TransferManagerUnavailable,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Invalid base64 payload: {0}")]
    DecodeFailure(String),

    #[error("Write error: {0}")]
    WriteFailure(String),

    #[error("Page reported an error: {0}")]
    BridgeReportedError(String),

    #[error("Rejected bridge call: {0}")]
    BridgeProtocol(String),

    #[error("Page did not deliver the blob in time")]
    Timeout,

    #[error("No application can open this file")]
    NoActivityToHandleOpen,

    #[error("No file chooser available")]
    FileChooserUnavailable,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
