pub mod bridge;
pub mod client;
pub mod models;
pub mod platform;

pub use bridge::{BridgeCall, PageBridge};
pub use client::{ApiError, HttpTransferManager};
pub use models::{HostCommand, SurfaceEvent};
pub use platform::{FileOpener, RenderingSurface, StoragePermission, TransferManager, UserInterface};
