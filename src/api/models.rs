use serde::{Deserialize, Serialize};

use super::bridge::BridgeCall;

/// Line from the rendering surface to the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    NavigationRequested {
        url: String,
    },
    DownloadRequested {
        url: String,
        #[serde(default)]
        user_agent: Option<String>,
        #[serde(default)]
        content_disposition: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        content_length: Option<i64>,
    },
    PageFinished {
        url: String,
    },
    Bridge {
        call: BridgeCall,
    },
    PermissionResult {
        granted: bool,
    },
    FileChooserRequested {
        request_id: u64,
        #[serde(default)]
        accept_types: Vec<String>,
        #[serde(default)]
        multiple: bool,
    },
    NotificationAction {
        file_uri: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
    ClearSavedFiles,
}

/// Line from the host to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    EvaluateScript {
        script: String,
    },
    NavigationDecision {
        url: String,
        intercept: bool,
    },
    RequestPermission,
    FileChooserResult {
        request_id: u64,
        files: Option<Vec<String>>,
    },
    ShowNotification {
        id: u32,
        channel: String,
        title: String,
        text: String,
        file_uri: String,
        mime_type: Option<String>,
    },
    Notice {
        text: String,
    },
}
