use crate::domain::PendingPolicy;

/// Holds at most one waiting continuation.
#[derive(Debug)]
pub struct PendingSlot<T> {
    value: Option<T>,
    policy: PendingPolicy,
}

impl<T> PendingSlot<T> {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            value: None,
            policy,
        }
    }

    /// Stores `value`, returning whichever value lost under the policy.
    pub fn offer(&mut self, value: T) -> Option<T> {
        match (self.policy, self.value.is_some()) {
            (PendingPolicy::KeepFirst, true) => Some(value),
            _ => self.value.replace(value),
        }
    }

    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Takes the value only if it matches.
    pub fn take_if(&mut self, predicate: impl FnOnce(&T) -> bool) -> Option<T> {
        if self.value.as_ref().is_some_and(predicate) {
            self.value.take()
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.value.is_some()
    }
}
