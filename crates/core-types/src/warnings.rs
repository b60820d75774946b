use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

const MAX_PENDING: usize = 64;
const MAX_REMEMBERED: usize = 512;

/// Deduplicated one-shot operational warnings.
///
/// Components push messages as they hit non-fatal trouble; tool responses drain the queue into
/// their `warnings` field. A message is delivered at most once per process.
#[derive(Clone, Default)]
pub struct Warnings {
    inner: Arc<Mutex<WarningsInner>>,
}

#[derive(Default)]
struct WarningsInner {
    pending: VecDeque<String>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a warning. Returns `false` when the message was already delivered or queued.
    pub fn push(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut guard = self.inner.lock();
        if guard.seen.contains(&message) {
            return false;
        }
        if guard.seen_order.len() >= MAX_REMEMBERED {
            if let Some(oldest) = guard.seen_order.pop_front() {
                guard.seen.remove(&oldest);
            }
        }
        guard.seen.insert(message.clone());
        guard.seen_order.push_back(message.clone());
        if guard.pending.len() >= MAX_PENDING {
            guard.pending.pop_front();
        }
        guard.pending.push_back(message);
        true
    }

    pub fn drain(&self) -> Vec<String> {
        self.inner.lock().pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_delivered_once() {
        let warnings = Warnings::new();
        assert!(warnings.push("rotation failed"));
        assert!(!warnings.push("rotation failed"));
        assert_eq!(warnings.drain(), vec!["rotation failed".to_string()]);
        assert!(!warnings.push("rotation failed"));
        assert!(warnings.drain().is_empty());
    }

    #[test]
    fn clones_share_queue() {
        let warnings = Warnings::new();
        let other = warnings.clone();
        other.push("state dir fallback");
        assert_eq!(warnings.len(), 1);
    }
}
