use tracing::{debug, warn};

use super::pending::PendingSlot;
use crate::api::platform::StoragePermission;
use crate::domain::{PendingOperation, PendingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingPermission,
}

#[derive(Debug, PartialEq, Eq)]
pub enum GateDecision<T> {
    /// Permission already held; run it now.
    Proceed(T),
    /// Parked until the prompt is answered. `dropped` lost the single slot.
    Deferred { dropped: Option<T> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum GateResolution<T> {
    Resume(Option<T>),
    Denied(Option<T>),
    /// No prompt was outstanding.
    Stale,
}

/// Suspends one operation until storage permission is answered.
#[derive(Debug)]
pub struct PermissionGate<T = PendingOperation> {
    slot: PendingSlot<T>,
    state: GateState,
}

impl<T> PermissionGate<T> {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            slot: PendingSlot::new(policy),
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn pending(&self) -> Option<&T> {
        self.slot.peek()
    }

    pub fn request(&mut self, op: T, permission: &dyn StoragePermission) -> GateDecision<T> {
        if permission.is_granted() {
            return GateDecision::Proceed(op);
        }

        let dropped = self.slot.offer(op);
        if dropped.is_some() {
            warn!("Pending storage request displaced by the single-slot policy");
        }

        if self.state == GateState::Idle {
            debug!("Storage permission missing, prompting");
            self.state = GateState::AwaitingPermission;
            permission.request();
        }

        GateDecision::Deferred { dropped }
    }

    pub fn on_permission_result(&mut self, granted: bool) -> GateResolution<T> {
        if self.state != GateState::AwaitingPermission {
            debug!(granted, "Permission result with no prompt outstanding");
            return GateResolution::Stale;
        }

        self.state = GateState::Idle;
        let op = self.slot.take();
        if granted {
            GateResolution::Resume(op)
        } else {
            GateResolution::Denied(op)
        }
    }
}
