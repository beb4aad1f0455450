pub mod download_coordinator;
pub mod filename;
pub mod notifier;
pub mod pending;
pub mod permission_gate;
pub mod storage;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use download_coordinator::{
    Collaborators, CoordinatorEvent, CoordinatorHandle, DownloadCoordinator,
};
pub use notifier::CompletionNotifier;
pub use permission_gate::PermissionGate;
pub use transfer::TransferFetcher;
