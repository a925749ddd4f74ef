use std::collections::HashSet;
use std::sync::Mutex;

/// Per-idempotency-key submission leases.
///
/// Exactly one in-flight vendor call per key at a time; the lease is held for
/// the duration of the `Submitting` state and released on every exit path via
/// the guard's `Drop`.
pub struct SubmissionLeases {
    held: Mutex<HashSet<String>>,
}

impl SubmissionLeases {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Try to acquire the lease for `key`. Returns `None` if another
    /// submission already holds it.
    pub fn acquire(&self, key: &str) -> Option<LeaseGuard<'_>> {
        let mut held = self.held.lock().expect("lease lock poisoned");
        if held.insert(key.to_string()) {
            Some(LeaseGuard {
                leases: self,
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    /// Whether a submission currently holds the lease for `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().expect("lease lock poisoned").contains(key)
    }

    fn release(&self, key: &str) {
        let mut held = self.held.lock().expect("lease lock poisoned");
        held.remove(key);
    }
}

impl Default for SubmissionLeases {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LeaseGuard<'a> {
    leases: &'a SubmissionLeases,
    key: String,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.leases.release(&self.key);
    }
}
